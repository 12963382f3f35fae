//! Shared configuration primitives, following the teacher's
//! `workflow-engine-core::config` env-var-first pattern: a plain struct
//! with `from_env()`/`validate()`.

use serde::{Deserialize, Serialize};

/// Tunables for the MinHash fingerprinting + similarity pipeline
/// (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub k: usize,
    pub max_stack_depth: usize,
    pub max_features: usize,
    pub similarity_threshold: f64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            k: crate::fingerprint::DEFAULT_K,
            max_stack_depth: 10,
            max_features: 50,
            similarity_threshold: crate::fingerprint::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl FingerprintConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("MONITOR_FINGERPRINT_K") {
            if let Ok(parsed) = v.parse() {
                cfg.k = parsed;
            }
        }
        if let Ok(v) = std::env::var("MONITOR_SIMILARITY_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                cfg.similarity_threshold = parsed;
            }
        }
        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.k == 0 {
            return Err("fingerprint K must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err("similarity_threshold must be in [0, 1]".to_string());
        }
        Ok(())
    }
}
