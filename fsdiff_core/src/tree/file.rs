use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fsdiff_common::Result;

use super::{Checksum, EnsureOptions, DEFAULT_FILE_MODE};
use crate::hash;
use crate::operation::Operation;

/// A regular file. Content may be absent when the tree was loaded with
/// `skip_content_read`; the source path then allows streaming later.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    content: Option<Vec<u8>>,
    mode: u32,
    mtime: Option<SystemTime>,
    size: u64,
    source_path: Option<PathBuf>,
    checksum: Option<Checksum>,
}

#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    pub content: Option<Vec<u8>>,
    pub mode: Option<u32>,
    pub mtime: Option<SystemTime>,
    pub size: Option<u64>,
}

impl File {
    pub fn new(options: FileOptions) -> Self {
        let size = options
            .size
            .unwrap_or_else(|| options.content.as_ref().map_or(0, |c| c.len() as u64));
        File {
            content: options.content,
            mode: options.mode.unwrap_or(DEFAULT_FILE_MODE),
            mtime: options.mtime,
            size,
            source_path: None,
            checksum: None,
        }
    }

    pub fn from_str(content: &str) -> Self {
        File::new(FileOptions {
            content: Some(content.as_bytes().to_vec()),
            ..FileOptions::default()
        })
    }

    pub fn content(&self) -> &[u8] {
        self.content.as_deref().unwrap_or(&[])
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Replacing content invalidates any stored checksum.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.size = content.len() as u64;
        self.content = Some(content);
        self.checksum = None;
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn set_source_path(&mut self, path: &Path) {
        self.source_path = Some(path.to_path_buf());
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    pub fn set_checksum(&mut self, algorithm: &str, digest: Vec<u8>) {
        self.checksum = Some(Checksum {
            algorithm: algorithm.to_string(),
            digest,
        });
    }

    pub fn clear_checksum(&mut self) {
        self.checksum = None;
    }

    /// Returns the file's digest, computing and recording it when allowed.
    ///
    /// A stored digest is returned as-is and opportunistically persisted.
    /// Otherwise the configured store is consulted, then the digest is
    /// computed (streaming from the source path when permitted), recorded on
    /// the entry, and persisted when requested.
    pub fn ensure_checksum(&mut self, opts: &EnsureOptions<'_>) -> Option<Checksum> {
        if let Some(checksum) = &self.checksum {
            if opts.persist {
                if let (Some(store), Some(path)) = (opts.store, &self.source_path) {
                    store.save(path, &checksum.digest);
                }
            }
            return Some(checksum.clone());
        }

        if opts.algorithm.is_empty() {
            return None;
        }

        if let (Some(store), Some(path)) = (opts.store, &self.source_path) {
            if let Some(digest) = store.load(path) {
                self.set_checksum(&opts.algorithm, digest);
                return self.checksum.clone();
            }
        }

        if !opts.compute_if_missing {
            return None;
        }

        let source = if opts.stream_from_disk {
            self.source_path.as_deref()
        } else {
            None
        };
        let digest = hash::compute_from_path_or_bytes(&opts.algorithm, source, self.content())?;
        if opts.persist {
            if let (Some(store), Some(path)) = (opts.store, &self.source_path) {
                store.save(path, &digest);
            }
        }
        self.set_checksum(&opts.algorithm, digest);
        self.checksum.clone()
    }

    pub fn create_operation(&self, relative_path: &str) -> Operation {
        Operation::create_file(relative_path)
    }

    pub fn remove_operation(&self, relative_path: &str) -> Operation {
        Operation::remove_file(relative_path)
    }

    pub fn write_to(&self, location: &Path) -> Result<()> {
        use std::io::Write;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.mode);
        }
        let mut file = options.open(location)?;
        file.write_all(self.content())?;
        Ok(())
    }
}

impl Default for File {
    fn default() -> Self {
        File::new(FileOptions::default())
    }
}
