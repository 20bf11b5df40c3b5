use lazy_static::lazy_static;
use regex::Regex;

use crate::io::SourceRow;
use crate::record::NarrativeRecord;

/// Substituted for a missing narrative so every record carries a non-null
/// string and the extractor never sees a hole.
pub const MISSING_PLACEHOLDER: &str = "0";

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(r" {3,}").unwrap();
}

/// Canonicalize one raw narrative field: lowercase, collapse every run of
/// three or more spaces to a single space, trim. Exactly this rule — runs of
/// two spaces survive, and no other whitespace is touched.
pub fn normalize_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    SPACE_RUN.replace_all(&lowered, " ").trim().to_string()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizeReport {
    pub total: usize,
    pub missing: usize,
}

/// Turn raw source rows into narrative records. Missing narratives become
/// the `"0"` placeholder and are counted; nothing here can fail.
pub fn normalize_rows(rows: Vec<SourceRow>) -> (Vec<NarrativeRecord>, NormalizeReport) {
    let mut report = NormalizeReport {
        total: rows.len(),
        missing: 0,
    };

    let records = rows
        .into_iter()
        .map(|row| {
            let normalized = match row.narrative.as_deref() {
                Some(text) => normalize_text(text),
                None => {
                    report.missing += 1;
                    MISSING_PLACEHOLDER.to_string()
                }
            };
            NarrativeRecord::from_normalized(row.id, row.narrative, normalized)
        })
        .collect();

    (records, report)
}
