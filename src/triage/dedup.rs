use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::info;

use crate::record::NarrativeRecord;
use crate::TARGET_TRIAGE;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DedupReport {
    pub exact_removed: usize,
    pub narrative_removed: usize,
}

/// Digest over every field used for whole-row comparison: the id and the
/// raw narrative. A missing narrative hashes differently from an empty one.
fn row_digest(record: &NarrativeRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.id.as_bytes());
    hasher.update([0x1f]);
    match &record.raw_text {
        Some(text) => {
            hasher.update([1]);
            hasher.update(text.as_bytes());
        }
        None => {
            hasher.update([0]);
        }
    }
    format!("{:x}", hasher.finalize())
}

fn narrative_digest(record: &NarrativeRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.normalized_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Remove duplicate rows in two sequential passes, keeping the first
/// occurrence in original row order both times: whole-row duplicates first,
/// then narrative-only duplicates over the output of the first pass.
pub fn dedup_records(records: Vec<NarrativeRecord>) -> (Vec<NarrativeRecord>, DedupReport) {
    let mut report = DedupReport::default();

    let mut seen_rows = HashSet::new();
    let mut unique_rows = Vec::with_capacity(records.len());
    for record in records {
        if seen_rows.insert(row_digest(&record)) {
            unique_rows.push(record);
        } else {
            report.exact_removed += 1;
        }
    }

    let mut seen_narratives = HashSet::new();
    let mut unique_narratives = Vec::with_capacity(unique_rows.len());
    for record in unique_rows {
        if seen_narratives.insert(narrative_digest(&record)) {
            unique_narratives.push(record);
        } else {
            report.narrative_removed += 1;
        }
    }

    info!(
        target: TARGET_TRIAGE,
        "dropped {} true duplicates and {} narrative duplicates, {} unique narratives remaining",
        report.exact_removed,
        report.narrative_removed,
        unique_narratives.len()
    );

    (unique_narratives, report)
}
