//! Digest computation dispatched by algorithm label.
//!
//! Algorithms are string labels, not trait objects; two files hashed under
//! different labels are simply incompatible. An unknown label yields `None`
//! and callers treat the digest as unavailable.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};

/// Read granularity for streamed hashing and comparison.
pub const CHUNK_SIZE: usize = 64 * 1024;

enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: &str) -> Option<Self> {
        match algorithm {
            "sha1" => Some(Hasher::Sha1(Sha1::new())),
            "sha256" => Some(Hasher::Sha256(Sha256::new())),
            "sha512" => Some(Hasher::Sha512(Sha512::new())),
            "blake3" => Some(Hasher::Blake3(Box::new(blake3::Hasher::new()))),
            _ => None,
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Sha1(h) => h.finalize().to_vec(),
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
            Hasher::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }
}

/// Digest of in-memory bytes; `None` for an unknown algorithm label.
pub fn compute(algorithm: &str, data: &[u8]) -> Option<Vec<u8>> {
    let mut hasher = Hasher::new(algorithm)?;
    hasher.update(data);
    Some(hasher.finalize())
}

/// Digest of a file, streamed in [`CHUNK_SIZE`] chunks when the path opens,
/// falling back to the in-memory bytes otherwise.
pub fn compute_from_path_or_bytes(
    algorithm: &str,
    path: Option<&Path>,
    data: &[u8],
) -> Option<Vec<u8>> {
    let mut hasher = Hasher::new(algorithm)?;
    if let Some(path) = path {
        if let Ok(mut file) = File::open(path) {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                match file.read(&mut buf) {
                    Ok(0) => return Some(hasher.finalize()),
                    Ok(n) => hasher.update(&buf[..n]),
                    // Mid-stream failure leaves the state poisoned; start
                    // over from the in-memory bytes.
                    Err(_) => {
                        hasher = Hasher::new(algorithm)?;
                        break;
                    }
                }
            }
        }
    }
    hasher.update(data);
    Some(hasher.finalize())
}
