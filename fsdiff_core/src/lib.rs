pub mod archive;
pub mod diff;
pub mod equality;
pub mod explain;
pub mod hash;
pub mod loader;
pub mod operation;
pub mod precompute;
pub mod store;
pub mod tree;

pub use diff::{diff, diff_streaming};
pub use equality::CompareOptions;
pub use explain::{collect_paths, explain, print};
pub use loader::{load_from, load_from_with_cancel, LoadOptions, TreeObserver};
pub use operation::{Operand, Operation, Reason, ReasonKind, Value, Witness};
pub use precompute::ensure_tree_checksums;
pub use store::{compose, MultiStore, SidecarStore, XattrStore};
pub use tree::{Entry, EntryKind, EnsureOptions, File, FileOptions, Folder, Symlink};
