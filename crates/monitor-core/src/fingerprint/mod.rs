//! MinHash fingerprinting of error events (spec.md §4.2).

pub mod features;
pub mod minhash;

pub use features::{FeatureExtractionConfig, FingerprintInput};
pub use minhash::{
    fingerprint, is_valid_hash, should_aggregate, similarity, validate_hash, DEFAULT_K,
    DEFAULT_SIMILARITY_THRESHOLD,
};

/// Full pipeline: extract features, then MinHash them, using
/// `DEFAULT_K` words.
pub fn compute_fingerprint(input: &FingerprintInput<'_>, feature_config: &FeatureExtractionConfig) -> String {
    let features = features::extract_features(input, feature_config);
    minhash::fingerprint(&features, DEFAULT_K)
}

/// Split a fingerprint into `bands` equal-width chunks of MinHash words,
/// used to build an LSH index: two fingerprints that are truly similar
/// are overwhelmingly likely to share at least one identical band, so
/// candidates can be pruned to "shares a band" before the full O(K)
/// comparison (spec.md §4.7, "may apply LSH banding ... to prune
/// candidates").
pub fn lsh_bands(fp: &str, k: usize, bands: usize) -> Vec<String> {
    assert!(k % bands == 0, "k must be evenly divisible by bands");
    let rows_per_band = k / bands;
    let chunk_chars = rows_per_band * 8;
    fp.as_bytes()
        .chunks(chunk_chars)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}
