//! MinHash fingerprinting and banded-Jaccard similarity (spec.md §4.2).
//!
//! `K` hash functions each map every feature to an integer; the
//! fingerprint is the concatenation of the `K` per-function minima. Two
//! fingerprints computed over feature sets with Jaccard similarity `J`
//! agree, in expectation, on a `J` fraction of their `K` words — this is
//! the standard unbiased MinHash estimator (Broder 1997).

use super::features::Feature;
use crate::error::MonitorError;

/// Five 31-bit primes, one per `i mod 5` hash-function family
/// (spec.md §4.2).
const PRIMES: [u64; 5] = [2_147_483_647, 2_147_483_629, 2_147_483_587, 2_147_483_579, 2_147_483_563];

pub const DEFAULT_K: usize = 128;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// `h_i(x) = MD5(x ‖ i)[0..8] mod P_{i mod 5}` (spec.md §4.2).
fn hash_fn(feature: &str, i: usize) -> u64 {
    let mut buf = Vec::with_capacity(feature.len() + 8);
    buf.extend_from_slice(feature.as_bytes());
    buf.extend_from_slice(&(i as u64).to_le_bytes());
    let digest = md5::compute(&buf);
    let first8 = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as u64;
    first8 % PRIMES[i % PRIMES.len()]
}

/// Compute the `K`-word MinHash signature over a feature set and render it
/// as `8*K` hex characters. Never panics on an empty feature set: a
/// sentinel feature keeps the per-function minimum well defined, so
/// `fingerprint` always has the contractual length (spec.md §4.2,
/// "empty inputs yield a valid fingerprint of the correct length").
pub fn fingerprint(features: &[Feature], k: usize) -> String {
    let sentinel = "∅:empty-feature-set".to_string();
    let owned: Vec<&str>;
    let texts: &[&str] = if features.is_empty() {
        owned = vec![sentinel.as_str()];
        &owned
    } else {
        owned = features.iter().map(|f| f.text.as_str()).collect();
        &owned
    };

    let mut out = String::with_capacity(8 * k);
    for i in 0..k {
        let min = texts
            .iter()
            .map(|t| hash_fn(t, i))
            .min()
            .unwrap_or(0);
        out.push_str(&format!("{:08x}", (min & 0xffff_ffff) as u32));
    }
    out
}

/// `isValidHash(f)` — `|f| == 8*K` and every character is hex
/// (spec.md §4.2).
pub fn is_valid_hash(f: &str, k: usize) -> bool {
    f.len() == 8 * k && f.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn validate_hash(f: &str, k: usize) -> Result<(), MonitorError> {
    if is_valid_hash(f, k) {
        Ok(())
    } else {
        Err(MonitorError::InvalidFingerprint {
            expected_len: 8 * k,
            actual: f.to_string(),
        })
    }
}

/// Banded-Jaccard similarity: fraction of equal 8-char words between two
/// same-length fingerprints (spec.md §4.2, "Similarity"). Returns `0.0`
/// for mismatched lengths rather than panicking — callers should treat
/// that as "not similar" (it only happens if `K` configuration drifts
/// between signatures, which should never occur within one deployment).
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let words_a = a.as_bytes().chunks(8);
    let words_b = b.as_bytes().chunks(8);
    let total = words_a.len();
    let matches = words_a.zip(words_b).filter(|(x, y)| x == y).count();
    matches as f64 / total as f64
}

pub fn should_aggregate(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}
