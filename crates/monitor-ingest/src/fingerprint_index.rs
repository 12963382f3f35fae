//! Per-project LSH-banded fingerprint index (spec.md §4.7, step 2:
//! "the aggregation worker may apply LSH banding over the project's live
//! fingerprints to prune similarity-scan candidates before the full
//! O(K) comparison"). Kept in memory, rebuilt from `ErrorAggregation` rows
//! lazily; losing it on restart only costs one full project scan, never
//! correctness (spec.md §7).

use dashmap::DashMap;
use monitor_core::fingerprint::{lsh_bands, similarity, DEFAULT_K};
use std::collections::HashSet;

const BANDS: usize = 16;

/// Maps each project to its band buckets: `band_text -> set of fingerprints`
/// sharing that band.
#[derive(Default)]
pub struct FingerprintIndex {
    projects: DashMap<String, DashMap<String, HashSet<String>>>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: &str, fingerprint: &str) {
        let buckets = self
            .projects
            .entry(project_id.to_string())
            .or_insert_with(DashMap::new);
        for band in lsh_bands(fingerprint, DEFAULT_K, BANDS) {
            buckets
                .entry(band)
                .or_insert_with(HashSet::new)
                .insert(fingerprint.to_string());
        }
    }

    pub fn remove(&self, project_id: &str, fingerprint: &str) {
        if let Some(buckets) = self.projects.get(project_id) {
            for band in lsh_bands(fingerprint, DEFAULT_K, BANDS) {
                if let Some(mut members) = buckets.get_mut(&band) {
                    members.remove(fingerprint);
                }
            }
        }
    }

    /// Candidates sharing at least one band with `fingerprint`, excluding
    /// itself. A full project scan only needs to compare `fingerprint`
    /// against these, not every live aggregation.
    pub fn candidates(&self, project_id: &str, fingerprint: &str) -> HashSet<String> {
        let mut out = HashSet::new();
        if let Some(buckets) = self.projects.get(project_id) {
            for band in lsh_bands(fingerprint, DEFAULT_K, BANDS) {
                if let Some(members) = buckets.get(&band) {
                    out.extend(members.iter().cloned());
                }
            }
        }
        out.remove(fingerprint);
        out
    }

    /// Best similarity match above `threshold`, or `None`.
    pub fn best_match(&self, project_id: &str, fingerprint: &str, threshold: f64) -> Option<(String, f64)> {
        self.candidates(project_id, fingerprint)
            .into_iter()
            .map(|candidate| {
                let score = similarity(fingerprint, &candidate);
                (candidate, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::fingerprint::{
        compute_fingerprint, FeatureExtractionConfig, FingerprintInput,
    };
    use monitor_core::model::ErrorType;

    fn fp(message: &str) -> String {
        let input = FingerprintInput {
            error_type: Some(ErrorType::JsError),
            message,
            stack: None,
            filename: None,
        };
        compute_fingerprint(&input, &FeatureExtractionConfig::default())
    }

    #[test]
    fn near_duplicate_messages_surface_as_candidates() {
        let index = FingerprintIndex::new();
        let a = fp("Cannot read property foo of undefined at line 42");
        index.insert("proj-1", &a);

        let b = fp("Cannot read property foo of undefined at line 99");
        let matched = index.best_match("proj-1", &b, 0.5);
        assert!(matched.is_some());
    }

    #[test]
    fn unrelated_messages_do_not_match() {
        let index = FingerprintIndex::new();
        let a = fp("Cannot read property foo of undefined");
        index.insert("proj-1", &a);

        let b = fp("Network request failed with status 500");
        let matched = index.best_match("proj-1", &b, 0.8);
        assert!(matched.is_none());
    }

    #[test]
    fn removed_fingerprint_no_longer_surfaces() {
        let index = FingerprintIndex::new();
        let a = fp("boom");
        index.insert("proj-1", &a);
        index.remove("proj-1", &a);
        assert!(index.candidates("proj-1", &a).is_empty());
    }
}
