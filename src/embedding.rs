//! Deterministic fallback vectorizer and vector utilities.
//!
//! The store does not call a learned embedding model. Instead each chunk
//! (and each query) is fingerprinted by a deterministic content hash:
//! the MD5 digest of the UTF-8 bytes, mapped byte-by-byte into a
//! 16-dimensional float vector. Identical text always produces an
//! identical vector; different text produces a different vector up to the
//! hash's collision rate. Retrieval quality is therefore a content-hash
//! proxy, not semantic similarity — that trade-off is intentional and the
//! scheme is part of the wire contract.
//!
//! # Wire contract (`md5-bytes-v1`)
//!
//! - digest: MD5 over the raw UTF-8 bytes of the input (128 bits)
//! - mapping: each digest byte `v` becomes `(v - 127.5) / 127.5`,
//!   yielding a value in `[-1, 1]`
//! - length: exactly [`EMBED_DIMS`] values; shorter digests would pad
//!   with `0.0`, longer ones truncate
//!
//! Any cooperating process must use the identical scheme to get
//! comparable distances. Changing it is a breaking format change that
//! requires a full re-ingest of every tenant.
//!
//! Also provides the storage codec and ranking metric:
//! - [`vec_to_blob`] — encode a vector as little-endian bytes for SQLite
//! - [`blob_to_vec`] — decode a BLOB back into a vector
//! - [`cosine_distance`] — the collection's native distance metric

use md5::{Digest, Md5};

/// Fixed fallback-vector dimensionality.
pub const EMBED_DIMS: usize = 16;

/// Version tag of the hash→vector scheme. Stored alongside nothing — it
/// exists so two processes can assert they agree before comparing
/// distances.
pub const EMBED_SCHEME: &str = "md5-bytes-v1";

/// Embed text as a 16-dimensional content fingerprint.
///
/// Pure function: no I/O, no randomness, bit-for-bit reproducible across
/// processes for the same input bytes.
pub fn embed(text: &str) -> Vec<f32> {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut vector: Vec<f32> = digest
        .iter()
        .take(EMBED_DIMS)
        .map(|&v| (v as f32 - 127.5) / 127.5)
        .collect();

    // MD5 yields exactly 16 bytes; the pad only matters if the scheme is
    // ever re-based on a shorter digest.
    vector.resize(EMBED_DIMS, 0.0);
    vector
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values from
/// the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance between two vectors: `1 − cosine similarity`.
///
/// Ascending distance means more similar. Returns `1.0` (maximally
/// distant) for empty or mismatched-length vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 1.0;
    }

    1.0 - dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_dims_and_range() {
        let v = embed("fn main() { println!(\"hi\"); }");
        assert_eq!(v.len(), EMBED_DIMS);
        for x in &v {
            assert!((-1.0..=1.0).contains(x), "value out of range: {}", x);
        }
    }

    #[test]
    fn test_embed_deterministic() {
        let a = embed("some chunk of code");
        let b = embed("some chunk of code");
        assert_eq!(a, b);
    }

    #[test]
    fn test_embed_distinct_inputs() {
        assert_ne!(embed("alpha"), embed("beta"));
        assert_ne!(embed(""), embed(" "));
    }

    #[test]
    fn test_embed_known_digest() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e; first byte 0xd4.
        let v = embed("");
        assert!((v[0] - (0xd4 as f32 - 127.5) / 127.5).abs() < 1e-6);
        assert!((v[15] - (0x7e as f32 - 127.5) / 127.5).abs() < 1e-6);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = embed("roundtrip me");
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), EMBED_DIMS * 4);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let v = embed("same text");
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_distance_orders_by_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.1];
        let c = vec![-1.0, 0.0];
        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[test]
    fn test_distance_degenerate_inputs() {
        assert_eq!(cosine_distance(&[], &[]), 1.0);
        assert_eq!(cosine_distance(&[1.0, 2.0], &[1.0]), 1.0);
    }
}
