//! The pluggable file-equality decision: metadata prechecks followed by a
//! strategy-specific content decision, producing a typed reason on change.

use std::fs;
use std::io::Read;
use std::path::Path;

use fsdiff_common::{ChecksumStore, CompareStrategy, Config};

use crate::hash::{self, CHUNK_SIZE};
use crate::operation::{ContentSummary, Reason, ReasonKind, Witness};
use crate::tree::File;

/// Contents at or below this size are inlined into ContentChanged reasons.
pub const INLINE_CONTENT_MAX: u64 = 1024;

const DIGEST_PREFIX_BYTES: usize = 8;

/// Options consumed by [`decide_file`], derived mechanically from [`Config`].
pub struct CompareOptions<'a> {
    pub compare_mode: bool,
    pub compare_size: bool,
    pub compare_mtime: bool,
    pub strategy: CompareStrategy,
    pub algorithm: String,
    pub compute_if_missing: bool,
    pub prefer_streaming: bool,
    pub store: Option<&'a dyn ChecksumStore>,
}

impl<'a> CompareOptions<'a> {
    pub fn from_config(config: &'a Config) -> Self {
        CompareOptions {
            compare_mode: config.compare_mode,
            compare_size: config.compare_size,
            compare_mtime: config.compare_mtime,
            strategy: config.strategy,
            algorithm: config.algorithm.clone(),
            // Ensure mode computes on demand; the other checksum modes rely
            // on loaded or precomputed digests.
            compute_if_missing: config.strategy == CompareStrategy::ChecksumEnsure,
            prefer_streaming: true,
            store: config.store.as_deref(),
        }
    }
}

/// Decides whether two files are equal. `None` means equal; otherwise the
/// reason witnesses the first difference found. This function never fails:
/// comparisons that cannot be performed soundly surface as a `Because`
/// change.
pub fn decide_file(a: &File, b: &File, opts: &CompareOptions<'_>) -> Option<Reason> {
    if opts.compare_mode && a.mode() != b.mode() {
        return Some(Reason::new(
            ReasonKind::ModeChanged,
            Witness::Mode(a.mode()),
            Witness::Mode(b.mode()),
        ));
    }
    if opts.compare_size && a.size() != b.size() {
        return Some(Reason::new(
            ReasonKind::SizeChanged,
            Witness::Int(a.size() as i64),
            Witness::Int(b.size() as i64),
        ));
    }
    if opts.compare_mtime && a.mtime() != b.mtime() {
        return Some(Reason::new(
            ReasonKind::MTimeChanged,
            a.mtime().map_or(Witness::None, Witness::Time),
            b.mtime().map_or(Witness::None, Witness::Time),
        ));
    }

    match opts.strategy {
        CompareStrategy::StructureOnly => None,
        CompareStrategy::Bytes => decide_bytes(a, b, opts),
        CompareStrategy::ChecksumPrefer => decide_checksum_prefer(a, b, opts),
        CompareStrategy::ChecksumEnsure => decide_checksum_required(a, b, opts, true),
        CompareStrategy::ChecksumRequire => {
            decide_checksum_required(a, b, opts, opts.compute_if_missing)
        }
    }
}

fn decide_bytes(a: &File, b: &File, opts: &CompareOptions<'_>) -> Option<Reason> {
    if opts.prefer_streaming {
        if let (Some(path_a), Some(path_b)) = (a.source_path(), b.source_path()) {
            if let Some(equal) = stream_equal(path_a, path_b) {
                return if equal {
                    None
                } else {
                    Some(content_changed_reason(a, b))
                };
            }
        }
    }
    if a.content() == b.content() {
        None
    } else {
        Some(content_changed_reason(a, b))
    }
}

fn decide_checksum_prefer(a: &File, b: &File, opts: &CompareOptions<'_>) -> Option<Reason> {
    let digest_a = available_digest(a, opts, opts.compute_if_missing);
    let digest_b = available_digest(b, opts, opts.compute_if_missing);
    if let (Some((da, la)), Some((db, lb))) = (&digest_a, &digest_b) {
        let compatible = la == lb && (opts.algorithm.is_empty() || *la == opts.algorithm);
        if compatible {
            return if da == db {
                None
            } else {
                Some(digest_mismatch_reason(a, b, da, db, la))
            };
        }
    }
    decide_bytes(a, b, opts)
}

fn decide_checksum_required(
    a: &File,
    b: &File,
    opts: &CompareOptions<'_>,
    compute: bool,
) -> Option<Reason> {
    let digest_a = available_digest(a, opts, compute);
    let digest_b = available_digest(b, opts, compute);
    match (digest_a, digest_b) {
        (Some((da, la)), Some((db, lb))) => {
            let mismatched =
                la != lb || (!opts.algorithm.is_empty() && la != opts.algorithm);
            if mismatched {
                Some(Reason::because(Witness::Text(la), Witness::Text(lb)))
            } else if da == db {
                None
            } else {
                Some(digest_mismatch_reason(a, b, &da, &db, &la))
            }
        }
        _ => Some(Reason::because(
            Witness::Text("missing checksum".to_string()),
            Witness::Text("missing checksum".to_string()),
        )),
    }
}

/// Best-available digest without mutating the entry: stored checksum, then
/// the configured store, then (when allowed) a fresh computation that is
/// persisted back through the store.
fn available_digest(
    file: &File,
    opts: &CompareOptions<'_>,
    compute: bool,
) -> Option<(Vec<u8>, String)> {
    if let Some(checksum) = file.checksum() {
        return Some((checksum.digest.clone(), checksum.algorithm.clone()));
    }
    if opts.algorithm.is_empty() {
        return None;
    }
    if let (Some(store), Some(path)) = (opts.store, file.source_path()) {
        if let Some(digest) = store.load(path) {
            return Some((digest, opts.algorithm.clone()));
        }
    }
    if !compute {
        return None;
    }
    let source = if opts.prefer_streaming {
        file.source_path()
    } else {
        None
    };
    let digest = hash::compute_from_path_or_bytes(&opts.algorithm, source, file.content())?;
    if let (Some(store), Some(path)) = (opts.store, file.source_path()) {
        store.save(path, &digest);
    }
    Some((digest, opts.algorithm.clone()))
}

/// ContentChanged reason: raw bytes when both sides are small and present,
/// a summary otherwise.
fn content_changed_reason(a: &File, b: &File) -> Reason {
    if a.size() <= INLINE_CONTENT_MAX
        && b.size() <= INLINE_CONTENT_MAX
        && a.has_content()
        && b.has_content()
    {
        return Reason::new(
            ReasonKind::ContentChanged,
            Witness::Bytes(a.content().to_vec()),
            Witness::Bytes(b.content().to_vec()),
        );
    }
    Reason::new(
        ReasonKind::ContentChanged,
        Witness::Summary(ContentSummary {
            size: a.size(),
            ..ContentSummary::default()
        }),
        Witness::Summary(ContentSummary {
            size: b.size(),
            ..ContentSummary::default()
        }),
    )
}

fn digest_mismatch_reason(a: &File, b: &File, da: &[u8], db: &[u8], label: &str) -> Reason {
    let summary = |file: &File, digest: &[u8]| {
        Witness::Summary(ContentSummary {
            size: file.size(),
            digest_prefix: Some(hex::encode(
                &digest[..digest.len().min(DIGEST_PREFIX_BYTES)],
            )),
            algorithm: Some(label.to_string()),
        })
    };
    Reason::new(ReasonKind::ContentChanged, summary(a, da), summary(b, db))
}

/// Lock-step streamed comparison. `None` means streaming was not possible
/// (open or read failure) and the caller should fall back to memory.
fn stream_equal(path_a: &Path, path_b: &Path) -> Option<bool> {
    let mut file_a = fs::File::open(path_a).ok()?;
    let mut file_b = fs::File::open(path_b).ok()?;
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];
    loop {
        let n_a = fill(&mut file_a, &mut buf_a)?;
        let n_b = fill(&mut file_b, &mut buf_b)?;
        if n_a != n_b {
            return Some(false);
        }
        if n_a == 0 {
            return Some(true);
        }
        if buf_a[..n_a] != buf_b[..n_b] {
            return Some(false);
        }
    }
}

fn fill(file: &mut fs::File, buf: &mut [u8]) -> Option<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return None,
        }
    }
    Some(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileOptions;
    use std::io::Write;

    fn opts_with_strategy(strategy: CompareStrategy) -> CompareOptions<'static> {
        CompareOptions {
            compare_mode: true,
            compare_size: false,
            compare_mtime: false,
            strategy,
            algorithm: String::new(),
            compute_if_missing: false,
            prefer_streaming: true,
            store: None,
        }
    }

    #[test]
    fn structure_only_ignores_content() {
        let a = File::from_str("hello");
        let b = File::from_str("world");
        let opts = opts_with_strategy(CompareStrategy::StructureOnly);
        assert!(decide_file(&a, &b, &opts).is_none());
    }

    #[test]
    fn bytes_detects_content_and_inlines_small_payloads() {
        let a = File::from_str("hello");
        let b = File::from_str("world");
        let opts = opts_with_strategy(CompareStrategy::Bytes);
        let reason = decide_file(&a, &b, &opts).unwrap();
        assert_eq!(reason.kind, ReasonKind::ContentChanged);
        assert_eq!(reason.before, Witness::Bytes(b"hello".to_vec()));
        assert_eq!(reason.after, Witness::Bytes(b"world".to_vec()));
    }

    #[test]
    fn large_content_is_summarized() {
        let big_a = vec![b'a'; 2000];
        let big_b = vec![b'b'; 2000];
        let a = File::new(FileOptions {
            content: Some(big_a),
            ..FileOptions::default()
        });
        let b = File::new(FileOptions {
            content: Some(big_b),
            ..FileOptions::default()
        });
        let opts = opts_with_strategy(CompareStrategy::Bytes);
        let reason = decide_file(&a, &b, &opts).unwrap();
        match reason.before {
            Witness::Summary(summary) => assert_eq!(summary.size, 2000),
            other => panic!("expected summary, got {:?}", other),
        }
    }

    #[test]
    fn size_precheck_short_circuits() {
        let a = File::from_str("abc");
        let b = File::from_str("abcd");
        let mut opts = opts_with_strategy(CompareStrategy::Bytes);
        opts.compare_size = true;
        let reason = decide_file(&a, &b, &opts).unwrap();
        assert_eq!(reason.kind, ReasonKind::SizeChanged);
        assert_eq!(reason.before, Witness::Int(3));
        assert_eq!(reason.after, Witness::Int(4));
    }

    #[test]
    fn prefer_without_algorithm_falls_back_to_bytes() {
        let a = File::from_str("aaaaaaaaaa");
        let b = File::from_str("bbbbbbbbbb");
        let opts = opts_with_strategy(CompareStrategy::ChecksumPrefer);
        let reason = decide_file(&a, &b, &opts).unwrap();
        assert_eq!(reason.kind, ReasonKind::ContentChanged);
    }

    #[test]
    fn require_without_digests_is_because_even_when_equal() {
        let a = File::from_str("hello");
        let b = File::from_str("hello");
        let mut opts = opts_with_strategy(CompareStrategy::ChecksumRequire);
        opts.algorithm = "sha256".to_string();
        let reason = decide_file(&a, &b, &opts).unwrap();
        assert_eq!(reason.kind, ReasonKind::Because);
        assert_eq!(
            reason.before,
            Witness::Text("missing checksum".to_string())
        );
    }

    #[test]
    fn require_with_mismatched_labels_is_because() {
        let mut a = File::from_str("hello");
        let mut b = File::from_str("hello");
        a.set_checksum("sha1", vec![1]);
        b.set_checksum("sha256", vec![1]);
        let mut opts = opts_with_strategy(CompareStrategy::ChecksumRequire);
        opts.algorithm = "sha256".to_string();
        let reason = decide_file(&a, &b, &opts).unwrap();
        assert_eq!(reason.kind, ReasonKind::Because);
        assert_eq!(reason.before, Witness::Text("sha1".to_string()));
        assert_eq!(reason.after, Witness::Text("sha256".to_string()));
    }

    #[test]
    fn ensure_computes_digests_and_compares() {
        let a = File::from_str("same content");
        let b = File::from_str("same content");
        let mut opts = opts_with_strategy(CompareStrategy::ChecksumEnsure);
        opts.algorithm = "sha256".to_string();
        assert!(decide_file(&a, &b, &opts).is_none());

        let c = File::from_str("other content");
        let reason = decide_file(&a, &c, &opts).unwrap();
        assert_eq!(reason.kind, ReasonKind::ContentChanged);
        match reason.before {
            Witness::Summary(summary) => {
                assert_eq!(summary.algorithm.as_deref(), Some("sha256"));
                assert!(summary.digest_prefix.is_some());
            }
            other => panic!("expected summary, got {:?}", other),
        }
    }

    #[test]
    fn stream_compare_agrees_with_memory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path_a = dir.path().join("a.bin");
        let path_b = dir.path().join("b.bin");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
        std::fs::File::create(&path_a)
            .unwrap()
            .write_all(&payload)
            .unwrap();
        std::fs::File::create(&path_b)
            .unwrap()
            .write_all(&payload)
            .unwrap();
        assert_eq!(stream_equal(&path_a, &path_b), Some(true));

        let mut tweaked = payload.clone();
        tweaked[150_000] ^= 0xff;
        std::fs::File::create(&path_b)
            .unwrap()
            .write_all(&tweaked)
            .unwrap();
        assert_eq!(stream_equal(&path_a, &path_b), Some(false));

        // different lengths
        std::fs::File::create(&path_b)
            .unwrap()
            .write_all(&payload[..100])
            .unwrap();
        assert_eq!(stream_equal(&path_a, &path_b), Some(false));
    }

    #[test]
    fn stream_compare_unopenable_is_none() {
        assert!(stream_equal(Path::new("/no/a"), Path::new("/no/b")).is_none());
    }
}
