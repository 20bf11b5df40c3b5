pub mod aggregate;
pub mod recognizer;
pub mod types;

pub use aggregate::{aggregate_by_label, LabelTable, SpanRow};
pub use recognizer::{run_extraction, EntityRecognizer};
pub use types::{DocumentExtraction, EntitySpan, RecordedExtraction};

// Module-level constants
pub const TARGET_EXTRACT: &str = "extract";
