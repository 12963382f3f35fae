use monitor_core::fingerprint::{
    compute_fingerprint, is_valid_hash, should_aggregate, similarity, FeatureExtractionConfig,
    FingerprintInput, DEFAULT_K,
};
use monitor_core::model::ErrorType;
use proptest::prelude::*;

fn cfg() -> FeatureExtractionConfig {
    FeatureExtractionConfig::default()
}

#[test]
fn fingerprint_is_deterministic() {
    let input = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Cannot read property 'name' of undefined",
        stack: Some("at foo (/app/src/a.js:10:5)\nat bar (/app/src/b.js:20:9)"),
        filename: Some("/app/src/a.js"),
    };
    let f1 = compute_fingerprint(&input, &cfg());
    let f2 = compute_fingerprint(&input, &cfg());
    assert_eq!(f1, f2);
    assert_eq!(f1.len(), 8 * DEFAULT_K);
    assert!(is_valid_hash(&f1, DEFAULT_K));
}

#[test]
fn empty_input_yields_valid_fingerprint() {
    let input = FingerprintInput {
        error_type: None,
        message: "",
        stack: None,
        filename: None,
    };
    let f = compute_fingerprint(&input, &cfg());
    assert_eq!(f.len(), 8 * DEFAULT_K);
    assert!(is_valid_hash(&f, DEFAULT_K));
}

#[test]
fn similarity_is_reflexive_and_symmetric() {
    let input = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Cannot read property 'name' of undefined",
        stack: Some("at foo (/app/src/a.js:10:5)"),
        filename: Some("/app/src/a.js"),
    };
    let other = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Cannot read property 'email' of undefined",
        stack: Some("at foo (/app/src/a.js:99:1)"),
        filename: Some("/app/src/a.js"),
    };
    let f1 = compute_fingerprint(&input, &cfg());
    let f2 = compute_fingerprint(&other, &cfg());

    assert_eq!(similarity(&f1, &f1), 1.0);
    assert!((similarity(&f1, &f2) - similarity(&f2, &f1)).abs() < f64::EPSILON);
    assert!((0.0..=1.0).contains(&similarity(&f1, &f2)));
}

// S1 — Fingerprint clustering (spec.md §8).
#[test]
fn s1_similar_type_errors_cluster() {
    let a = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Cannot read property 'name' of undefined",
        stack: Some("at Component.render (/app/src/widget.js:42:13)\nat renderTree (/app/src/widget.js:10:2)"),
        filename: Some("/app/src/widget.js"),
    };
    let b = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Cannot read property 'email' of undefined",
        stack: Some("at Component.render (/app/src/widget.js:55:13)\nat renderTree (/app/src/widget.js:10:2)"),
        filename: Some("/app/src/widget.js"),
    };
    let fa = compute_fingerprint(&a, &cfg());
    let fb = compute_fingerprint(&b, &cfg());
    let sim = similarity(&fa, &fb);
    assert!(sim > 0.5, "expected similarity > 0.5, got {sim}");
    assert!(should_aggregate(&fa, &fb, 0.5));
}

// S2 — Fingerprint separation (spec.md §8).
#[test]
fn s2_unrelated_errors_separate() {
    let a = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Cannot read property 'name' of undefined",
        stack: Some("at Component.render (/app/src/widget.js:42:13)"),
        filename: Some("/app/src/widget.js"),
    };
    let b = FingerprintInput {
        error_type: Some(ErrorType::JsError),
        message: "Unexpected token '}'",
        stack: Some("at Module._compile (/app/src/config.js:1:1)"),
        filename: Some("/app/src/config.js"),
    };
    let fa = compute_fingerprint(&a, &cfg());
    let fb = compute_fingerprint(&b, &cfg());
    let sim = similarity(&fa, &fb);
    assert!(sim < 0.5, "expected similarity < 0.5, got {sim}");
    assert!(!should_aggregate(&fa, &fb, 0.5));
}

proptest! {
    #[test]
    fn prop_fingerprint_deterministic(msg in "[a-zA-Z0-9 ._/:-]{0,80}") {
        let input = FingerprintInput { error_type: Some(ErrorType::JsError), message: &msg, stack: None, filename: None };
        let f1 = compute_fingerprint(&input, &cfg());
        let f2 = compute_fingerprint(&input, &cfg());
        prop_assert_eq!(f1.len(), 8 * DEFAULT_K);
        prop_assert_eq!(f1, f2);
    }

    #[test]
    fn prop_similarity_bounds(a in "[a-zA-Z0-9 ._/:-]{0,80}", b in "[a-zA-Z0-9 ._/:-]{0,80}") {
        let ia = FingerprintInput { error_type: Some(ErrorType::JsError), message: &a, stack: None, filename: None };
        let ib = FingerprintInput { error_type: Some(ErrorType::JsError), message: &b, stack: None, filename: None };
        let fa = compute_fingerprint(&ia, &cfg());
        let fb = compute_fingerprint(&ib, &cfg());
        let sim_ab = similarity(&fa, &fb);
        let sim_ba = similarity(&fb, &fa);
        prop_assert!((0.0..=1.0).contains(&sim_ab));
        prop_assert!((sim_ab - sim_ba).abs() < f64::EPSILON);
    }
}
