use std::fmt;
use std::sync::Arc;

use crate::store::ChecksumStore;

/// How file content is compared once the metadata prechecks pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareStrategy {
    /// Structure and metadata only; content is never examined.
    StructureOnly,
    /// Byte-for-byte comparison, streaming from disk when possible.
    Bytes,
    /// Compare digests when both sides have compatible ones, else bytes.
    ChecksumPrefer,
    /// Compute missing digests, then compare digests only.
    ChecksumEnsure,
    /// Digests are mandatory; a missing or mismatched one is a difference.
    ChecksumRequire,
}

/// Comparison configuration shared by the diff engine and the CLI.
#[derive(Clone)]
pub struct Config {
    pub case_sensitive: bool,
    pub compare_mode: bool,
    pub compare_size: bool,
    pub compare_mtime: bool,
    pub strategy: CompareStrategy,
    pub exclude_globs: Vec<String>,

    /// Digest label used by the checksum strategies, e.g. "sha256".
    pub algorithm: String,
    /// Optional digest cache consulted and populated during comparison.
    pub store: Option<Arc<dyn ChecksumStore>>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("case_sensitive", &self.case_sensitive)
            .field("compare_mode", &self.compare_mode)
            .field("compare_size", &self.compare_size)
            .field("compare_mtime", &self.compare_mtime)
            .field("strategy", &self.strategy)
            .field("exclude_globs", &self.exclude_globs)
            .field("algorithm", &self.algorithm)
            .field("store", &self.store.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Config {
    /// Structure and permission modes only. Content never read.
    pub fn fast() -> Self {
        Config {
            case_sensitive: true,
            compare_mode: true,
            compare_size: false,
            compare_mtime: false,
            strategy: CompareStrategy::StructureOnly,
            exclude_globs: Vec::new(),
            algorithm: String::new(),
            store: None,
        }
    }

    /// Structure, mode, size, mtime and full byte comparison.
    pub fn accurate() -> Self {
        Config {
            compare_size: true,
            compare_mtime: true,
            strategy: CompareStrategy::Bytes,
            ..Config::fast()
        }
    }

    /// [`Config::accurate`] with the mtime check masked out.
    pub fn accurate_no_mtime() -> Self {
        Config {
            compare_mtime: false,
            ..Config::accurate()
        }
    }

    /// Prefer cached digests, fall back to bytes when unavailable.
    pub fn checksums(algorithm: &str, store: Option<Arc<dyn ChecksumStore>>) -> Self {
        Config {
            strategy: CompareStrategy::ChecksumPrefer,
            algorithm: algorithm.to_string(),
            store,
            ..Config::fast()
        }
    }

    /// Compute digests on demand, then compare digests only.
    pub fn checksums_ensure(algorithm: &str, store: Option<Arc<dyn ChecksumStore>>) -> Self {
        Config {
            strategy: CompareStrategy::ChecksumEnsure,
            ..Config::checksums(algorithm, store)
        }
    }

    /// Digests are required; absence or label mismatch reads as a change.
    pub fn checksums_strict(algorithm: &str, store: Option<Arc<dyn ChecksumStore>>) -> Self {
        Config {
            strategy: CompareStrategy::ChecksumRequire,
            ..Config::checksums(algorithm, store)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::accurate()
    }
}
