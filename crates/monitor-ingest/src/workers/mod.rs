//! The five (six with AI diagnosis) pipeline workers (spec.md §4.6-§4.9,
//! §5): one module per stage, composed by `monitor_ingest::Pipeline`.

pub mod aggregation;
pub mod ai_diagnosis;
pub mod alert;
pub mod error_processing;
pub mod notification;
pub mod sourcemap;
