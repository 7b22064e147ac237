//! Populates a tree from a directory on disk.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use fsdiff_common::{normalize, ChecksumStore, FsdiffError, Result};

use crate::hash;
use crate::store::XattrStore;
use crate::tree::{folder_checksum, FileOptions, Folder};

/// Out-of-band progress observer. Callbacks are invoked synchronously from
/// the walker and must be cheap and non-blocking.
pub trait TreeObserver: Send + Sync {
    fn on_file_done(&self, _path: &str) {}
    fn on_directory_visit(&self, _path: &str) {}
}

/// Controls how filesystem metadata such as cached checksums is loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Attempt to read a stored digest from this extended attribute key
    /// (e.g. "user.sha256"). Empty disables.
    pub xattr_key: String,
    /// Label recorded with loaded or computed digests, e.g. "sha256".
    pub algorithm: String,
    /// Compute a digest when the attribute is absent.
    pub compute_if_missing: bool,
    /// Write computed digests back to the attribute.
    pub write_if_computed: bool,
    /// Do not read file bytes; keep only the source path for streaming.
    pub skip_content_read: bool,
    /// Compute a folder-level checksum after the traversal when missing.
    pub compute_folder_checksum_if_missing: bool,
    /// Write a computed folder checksum back to the attribute.
    pub write_folder_checksum_if_computed: bool,
}

/// Reads the directory at `path` into a [`Folder`].
pub fn load_from(path: &Path, opts: &LoadOptions) -> Result<Folder> {
    load_from_with_cancel(path, opts, None, None)
}

/// [`load_from`] with cancellation (checked at directory boundaries; a set
/// flag aborts with `Cancelled` and no partial result) and progress
/// reporting.
pub fn load_from_with_cancel(
    path: &Path,
    opts: &LoadOptions,
    cancel: Option<&AtomicBool>,
    observer: Option<&dyn TreeObserver>,
) -> Result<Folder> {
    let mut folder = Folder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        folder.set_mode(metadata.permissions().mode() & 0o7777);
    }
    let xattr_store = if opts.xattr_key.is_empty() {
        None
    } else {
        Some(XattrStore::new(&opts.xattr_key))
    };
    read_into(
        &mut folder,
        path,
        "",
        opts,
        xattr_store.as_ref(),
        cancel,
        observer,
    )?;
    Ok(folder)
}

#[allow(clippy::too_many_arguments)]
fn read_into(
    folder: &mut Folder,
    path: &Path,
    prefix: &str,
    opts: &LoadOptions,
    xattr_store: Option<&XattrStore>,
    cancel: Option<&AtomicBool>,
    observer: Option<&dyn TreeObserver>,
) -> Result<()> {
    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return Err(FsdiffError::Cancelled);
    }
    if let Some(observer) = observer {
        observer.on_directory_visit(if prefix.is_empty() { "." } else { prefix });
    }
    folder.set_source_path(path);

    for dirent in fs::read_dir(path)? {
        let dirent = dirent?;
        let name = dirent.file_name().to_string_lossy().into_owned();
        let full = path.join(dirent.file_name());
        let file_type = dirent.file_type()?;

        if file_type.is_dir() {
            let sub = folder.folder(&name);
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                sub.set_mode(dirent.metadata()?.permissions().mode() & 0o7777);
            }
            read_into(
                sub,
                &full,
                &normalize(prefix, &name),
                opts,
                xattr_store,
                cancel,
                observer,
            )?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&full)?;
            folder.symlink(&name, &target.to_string_lossy());
        } else if file_type.is_file() {
            let metadata = dirent.metadata()?;
            let content = if opts.skip_content_read {
                None
            } else {
                Some(fs::read(&full)?)
            };
            let file = folder.file_with(
                &name,
                FileOptions {
                    content,
                    mode: Some(file_mode(&metadata)),
                    mtime: metadata.modified().ok(),
                    size: Some(metadata.len()),
                },
            );
            file.set_source_path(&full);

            if let Some(store) = xattr_store {
                if let Some(digest) = store.load(&full) {
                    file.set_checksum(&opts.algorithm, digest);
                } else if opts.compute_if_missing && !opts.algorithm.is_empty() {
                    let digest = hash::compute_from_path_or_bytes(
                        &opts.algorithm,
                        Some(&full),
                        file.content(),
                    );
                    if let Some(digest) = digest {
                        if opts.write_if_computed {
                            store.save(&full, &digest);
                        }
                        file.set_checksum(&opts.algorithm, digest);
                    }
                }
            }
            if let Some(observer) = observer {
                observer.on_file_done(&normalize(prefix, &name));
            }
        } else {
            return Err(FsdiffError::UnsupportedEntry {
                path: full.display().to_string(),
                detail: "not a directory, regular file, or symlink".to_string(),
            });
        }
    }

    if opts.compute_folder_checksum_if_missing
        && !opts.algorithm.is_empty()
        && folder.checksum().is_none()
    {
        if let Some(digest) = folder_checksum(folder, &opts.algorithm) {
            if opts.write_folder_checksum_if_computed {
                if let Some(store) = xattr_store {
                    store.save(path, &digest);
                }
            }
            folder.set_checksum(&opts.algorithm, digest);
        }
    }

    debug!("loaded {} entries from {}", folder.len(), path.display());
    Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    crate::tree::DEFAULT_FILE_MODE
}
