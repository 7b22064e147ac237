//! In-memory tree model: files, folders, symlinks.
//!
//! Entries form a tagged sum dispatched on [`EntryKind`]; a folder owns its
//! children exclusively and cloning is a deep copy. Hardlinks are
//! unrepresentable; loaders that encounter one fail.

mod file;
mod folder;
mod link;

pub use file::{File, FileOptions};
pub use folder::{folder_checksum, Folder};
pub use link::Symlink;

use std::fmt;
use std::path::Path;

use fsdiff_common::{ChecksumStore, Result};

use crate::operation::Operation;

pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_FOLDER_MODE: u32 = 0o755;
pub const SYMLINK_MODE: u32 = 0o777;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    Symlink,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
            EntryKind::Symlink => "symlink",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digest together with the label of the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: String,
    pub digest: Vec<u8>,
}

/// Controls checksum materialization during `ensure_checksum` and the
/// precompute pass.
#[derive(Default)]
pub struct EnsureOptions<'a> {
    pub algorithm: String,
    pub compute_if_missing: bool,
    pub stream_from_disk: bool,
    pub persist: bool,
    pub store: Option<&'a dyn ChecksumStore>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    File(File),
    Folder(Folder),
    Symlink(Symlink),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File(_) => EntryKind::File,
            Entry::Folder(_) => EntryKind::Folder,
            Entry::Symlink(_) => EntryKind::Symlink,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Entry::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Entry::Folder(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn as_symlink(&self) -> Option<&Symlink> {
        match self {
            Entry::Symlink(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut File> {
        match self {
            Entry::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_folder_mut(&mut self) -> Option<&mut Folder> {
        match self {
            Entry::Folder(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn create_operation(&self, relative_path: &str) -> Operation {
        match self {
            Entry::File(file) => file.create_operation(relative_path),
            Entry::Folder(folder) => folder.create_operation(relative_path),
            Entry::Symlink(link) => link.create_operation(relative_path),
        }
    }

    pub fn remove_operation(&self, relative_path: &str) -> Operation {
        match self {
            Entry::File(file) => file.remove_operation(relative_path),
            Entry::Folder(folder) => folder.remove_operation(relative_path),
            Entry::Symlink(link) => link.remove_operation(relative_path),
        }
    }

    pub fn write_to(&self, location: &Path) -> Result<()> {
        match self {
            Entry::File(file) => file.write_to(location),
            Entry::Folder(folder) => folder.write_to(location),
            Entry::Symlink(link) => link.write_to(location),
        }
    }
}
