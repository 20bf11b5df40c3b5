use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing decision derived from a record's quantile bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Accepted,
    Diverted,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Accepted => write!(f, "ACCEPTED"),
            Route::Diverted => write!(f, "DIVERTED"),
        }
    }
}

/// One narrative document as it moves through the triage stages.
///
/// Identity is the `id` column of the source file. Stages derive fields in
/// order: normalization fills `normalized_text` and `length`, the edge-case
/// detector fills the flags, and the quantile router fills `quantile_bucket`
/// and `route`. Rows are only ever removed by deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeRecord {
    pub id: String,
    pub raw_text: Option<String>,
    pub normalized_text: String,
    pub length: usize,
    pub quantile_bucket: Option<u32>,
    pub route: Option<Route>,
    pub is_short: bool,
    pub is_dirty: bool,
    pub is_same_source_prefix: bool,
    pub is_same_source_suffix: bool,
    pub is_same_source: bool,
    pub edge_case_count: u8,
}

impl NarrativeRecord {
    pub fn from_normalized(id: String, raw_text: Option<String>, normalized_text: String) -> Self {
        let length = normalized_text.chars().count();
        NarrativeRecord {
            id,
            raw_text,
            normalized_text,
            length,
            quantile_bucket: None,
            route: None,
            is_short: false,
            is_dirty: false,
            is_same_source_prefix: false,
            is_same_source_suffix: false,
            is_same_source: false,
            edge_case_count: 0,
        }
    }

    /// A record is an edge case if any of the three detectors flagged it.
    pub fn is_edge_case(&self) -> bool {
        self.edge_case_count > 0
    }

    /// Ordinal bucket label, e.g. `Q3`.
    pub fn bucket_label(&self) -> Option<String> {
        self.quantile_bucket.map(|bucket| format!("Q{}", bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let record =
            NarrativeRecord::from_normalized("1".to_string(), None, "émigré café".to_string());
        assert_eq!(record.length, 11);
    }

    #[test]
    fn test_route_display() {
        assert_eq!(Route::Accepted.to_string(), "ACCEPTED");
        assert_eq!(Route::Diverted.to_string(), "DIVERTED");
    }

    #[test]
    fn test_bucket_label() {
        let mut record = NarrativeRecord::from_normalized("1".to_string(), None, "x".to_string());
        assert_eq!(record.bucket_label(), None);
        record.quantile_bucket = Some(3);
        assert_eq!(record.bucket_label(), Some("Q3".to_string()));
    }
}
