//! Checksum store implementations: extended attributes, sidecar files, and
//! ordered composition.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

pub use fsdiff_common::ChecksumStore;

/// Stores digests in a single extended attribute per file.
///
/// Missing attributes and unsupported platforms read as cache misses;
/// writes are best effort.
pub struct XattrStore {
    pub key: String,
}

impl XattrStore {
    pub fn new(key: &str) -> Self {
        XattrStore {
            key: key.to_string(),
        }
    }
}

impl ChecksumStore for XattrStore {
    fn load(&self, path: &Path) -> Option<Vec<u8>> {
        match xattr::get(path, &self.key) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(err) => {
                debug!("xattr read failed for {}: {}", path.display(), err);
                None
            }
        }
    }

    fn save(&self, path: &Path, digest: &[u8]) {
        if let Err(err) = xattr::set(path, &self.key, digest) {
            debug!("xattr write failed for {}: {}", path.display(), err);
        }
    }
}

/// Mirrors digests into `<base_dir>/<rel>.<algorithm>` sidecar files, where
/// `rel` is the stored path relative to `root`.
pub struct SidecarStore {
    pub base_dir: PathBuf,
    pub root: PathBuf,
    pub algorithm: String,
}

impl SidecarStore {
    pub fn new(base_dir: &Path, root: &Path, algorithm: &str) -> Self {
        SidecarStore {
            base_dir: base_dir.to_path_buf(),
            root: root.to_path_buf(),
            algorithm: algorithm.to_string(),
        }
    }

    fn cache_path(&self, path: &Path) -> Option<PathBuf> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut name = OsString::from(self.base_dir.join(rel));
        name.push(".");
        name.push(&self.algorithm);
        Some(PathBuf::from(name))
    }
}

impl ChecksumStore for SidecarStore {
    fn load(&self, path: &Path) -> Option<Vec<u8>> {
        let cache = self.cache_path(path)?;
        let text = fs::read_to_string(&cache).ok()?;
        hex::decode(text.trim()).ok()
    }

    fn save(&self, path: &Path, digest: &[u8]) {
        let Some(cache) = self.cache_path(path) else {
            return;
        };
        if let Some(parent) = cache.parent() {
            if let Err(err) = create_dirs(parent) {
                debug!("sidecar mkdir failed for {}: {}", parent.display(), err);
                return;
            }
        }
        // Write through a temp file so a concurrent reader never sees a
        // partial digest.
        let mut tmp = cache.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(err) = write_file_0644(&tmp, hex::encode(digest).as_bytes())
            .and_then(|_| fs::rename(&tmp, &cache))
        {
            debug!("sidecar write failed for {}: {}", cache.display(), err);
            let _ = fs::remove_file(&tmp);
        }
    }
}

#[cfg(unix)]
fn create_dirs(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
}

#[cfg(not(unix))]
fn create_dirs(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn write_file_0644(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_file_0644(path: &Path, data: &[u8]) -> std::io::Result<()> {
    fs::write(path, data)
}

/// Ordered composition: first hit wins on load, save fans out to all.
pub struct MultiStore {
    pub stores: Vec<Arc<dyn ChecksumStore>>,
}

impl ChecksumStore for MultiStore {
    fn load(&self, path: &Path) -> Option<Vec<u8>> {
        self.stores.iter().find_map(|store| store.load(path))
    }

    fn save(&self, path: &Path, digest: &[u8]) {
        for store in &self.stores {
            store.save(path, digest);
        }
    }
}

/// Collapses zero, one, or many stores into a single handle.
pub fn compose(mut stores: Vec<Arc<dyn ChecksumStore>>) -> Option<Arc<dyn ChecksumStore>> {
    match stores.len() {
        0 => None,
        1 => stores.pop(),
        _ => Some(Arc::new(MultiStore { stores })),
    }
}
