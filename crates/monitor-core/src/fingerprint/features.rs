//! Feature extraction for MinHash fingerprinting (spec.md §4.2).

use crate::model::ErrorType;
use once_cell::sync::Lazy;
use regex::Regex;

/// A single weighted feature category, used to apportion the
/// `maxFeatures` budget (spec.md §4.2, weights
/// `{message:0.4, stack:0.4, file:0.15, type:0.05}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureCategory {
    Type,
    Message,
    Stack,
    File,
}

impl FeatureCategory {
    pub fn weight(self) -> f64 {
        match self {
            FeatureCategory::Message => 0.4,
            FeatureCategory::Stack => 0.4,
            FeatureCategory::File => 0.15,
            FeatureCategory::Type => 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub category: FeatureCategory,
    pub text: String,
}

pub struct FeatureExtractionConfig {
    pub max_stack_depth: usize,
    pub max_features: usize,
}

impl Default for FeatureExtractionConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 10,
            max_features: 50,
        }
    }
}

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static OS_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[A-Za-z]:\\|/)[\w./\\-]+").unwrap());
static ISO_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?").unwrap()
});
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").unwrap());
static LINE_COL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+:\d+").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static FUNC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"at\s+([A-Za-z_$][\w$.]*)\s*\(").unwrap());

/// Clean a raw error message into normalized tokens (spec.md §4.2, point
/// 2). Order matters: timestamps/UUIDs before bare numbers so a UUID
/// doesn't get partially eaten by the number substitution.
pub fn clean_message_tokens(message: &str) -> Vec<String> {
    let mut s = message.to_lowercase();
    s = ISO_TIMESTAMP_RE.replace_all(&s, "TIMESTAMP").into_owned();
    s = UUID_RE.replace_all(&s, "UUID").into_owned();
    s = URL_RE.replace_all(&s, "URL").into_owned();
    s = OS_PATH_RE.replace_all(&s, "PATH").into_owned();
    s = NUMBER_RE.replace_all(&s, "NUM").into_owned();

    NON_WORD_RE
        .split(&s)
        .filter(|tok| tok.len() > 2)
        .map(|tok| tok.to_string())
        .collect()
}

/// Normalize one stack frame line (spec.md §4.2, point 3): strip URL/path
/// prefixes, collapse `:<line>:<col>` to `:LINE:COL`, collapse whitespace.
pub fn normalize_stack_line(line: &str) -> String {
    let mut s = URL_RE.replace_all(line, "").into_owned();
    s = OS_PATH_RE.replace_all(&s, "").into_owned();
    s = LINE_COL_RE.replace_all(&s, ":LINE:COL").into_owned();
    s = WHITESPACE_RE.replace_all(&s, " ").trim().to_string();
    s
}

pub fn extract_function_name(line: &str) -> Option<String> {
    FUNC_NAME_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn file_basename(path: &str) -> Option<String> {
    path.rsplit(['/', '\\']).next().map(|s| s.to_string())
}

pub fn file_parent_dir(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches(['/', '\\']);
    let parts: Vec<&str> = trimmed.split(['/', '\\']).collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2].to_string().into()
    } else {
        None
    }
}

pub struct FingerprintInput<'a> {
    pub error_type: Option<ErrorType>,
    pub message: &'a str,
    pub stack: Option<&'a str>,
    pub filename: Option<&'a str>,
}

fn error_type_tag(t: ErrorType) -> &'static str {
    match t {
        ErrorType::JsError => "jsError",
        ErrorType::PromiseError => "promiseError",
        ErrorType::ResourceError => "resourceError",
        ErrorType::HttpError => "httpError",
        ErrorType::CustomError => "customError",
        ErrorType::FrameworkError => "frameworkError",
    }
}

/// Extract, tag, and budget-cap the feature set for one error
/// (spec.md §4.2). Deterministic: identical input always yields an
/// identical, identically-ordered feature list (required for fingerprint
/// determinism, spec.md §8 property 1).
pub fn extract_features(input: &FingerprintInput<'_>, config: &FeatureExtractionConfig) -> Vec<Feature> {
    let mut type_features = Vec::new();
    if let Some(t) = input.error_type {
        type_features.push(Feature {
            category: FeatureCategory::Type,
            text: format!("type:{}", error_type_tag(t)),
        });
    }

    let message_features: Vec<Feature> = clean_message_tokens(input.message)
        .into_iter()
        .map(|tok| Feature {
            category: FeatureCategory::Message,
            text: format!("msg:{}", tok),
        })
        .collect();

    let mut stack_features = Vec::new();
    if let Some(stack) = input.stack {
        for line in stack.lines().take(config.max_stack_depth) {
            let normalized = normalize_stack_line(line);
            if !normalized.is_empty() {
                stack_features.push(Feature {
                    category: FeatureCategory::Stack,
                    text: format!("stack:{}", normalized),
                });
            }
            if let Some(func) = extract_function_name(line) {
                stack_features.push(Feature {
                    category: FeatureCategory::Stack,
                    text: format!("func:{}", func),
                });
            }
        }
    }

    let mut file_features = Vec::new();
    if let Some(filename) = input.filename {
        if let Some(base) = file_basename(filename) {
            file_features.push(Feature {
                category: FeatureCategory::File,
                text: format!("file:{}", base),
            });
        }
        if let Some(dir) = file_parent_dir(filename) {
            file_features.push(Feature {
                category: FeatureCategory::File,
                text: format!("dir:{}", dir),
            });
        }
    }

    apply_budget(
        config.max_features,
        [
            (FeatureCategory::Type, type_features),
            (FeatureCategory::Message, message_features),
            (FeatureCategory::Stack, stack_features),
            (FeatureCategory::File, file_features),
        ],
    )
}

/// Apportion `max_features` across categories by weight, truncating each
/// category's contribution to `floor(weight * max_features)` (at least 1
/// slot if the category produced anything), preserving extraction order.
fn apply_budget(
    max_features: usize,
    categories: [(FeatureCategory, Vec<Feature>); 4],
) -> Vec<Feature> {
    let mut out = Vec::with_capacity(max_features);
    for (category, features) in categories {
        if features.is_empty() {
            continue;
        }
        let budget = ((category.weight() * max_features as f64).floor() as usize).max(1);
        out.extend(features.into_iter().take(budget));
    }
    out.truncate(max_features);
    out
}
