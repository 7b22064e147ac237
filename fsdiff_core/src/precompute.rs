//! Eager checksum population ahead of a diff, so checksum-based strategies
//! hit warm caches.

use std::sync::atomic::{AtomicBool, Ordering};

use fsdiff_common::{FsdiffError, Result};

use crate::tree::{EnsureOptions, Entry, Folder};

/// Ensures every file in the tree, then the folder itself, carries a
/// checksum per `opts`. Cancellation is checked at directory boundaries.
pub fn ensure_tree_checksums(
    folder: &mut Folder,
    opts: &EnsureOptions<'_>,
    cancel: Option<&AtomicBool>,
) -> Result<()> {
    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return Err(FsdiffError::Cancelled);
    }
    for name in folder.sorted_names() {
        match folder.try_get_mut(&name) {
            Some(Entry::File(file)) => {
                file.ensure_checksum(opts);
            }
            Some(Entry::Folder(sub)) => {
                ensure_tree_checksums(sub, opts, cancel)?;
            }
            _ => {}
        }
    }
    folder.ensure_checksum(opts);
    Ok(())
}
