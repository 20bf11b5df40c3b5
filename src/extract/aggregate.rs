use serde::Serialize;
use tracing::warn;

use super::types::RecordedExtraction;
use super::TARGET_EXTRACT;

/// One row of a per-label entity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanRow {
    pub document_id: String,
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
}

/// Every span carrying one label, across the corpus. Sparse by design: a
/// document with no matching span contributes no row, never a padded one.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    pub label: String,
    pub rows: Vec<SpanRow>,
}

/// Reshape per-document span lists into one table per entity label. Row
/// order is document order, then span discovery order within a document;
/// nothing is re-sorted. Spans with labels outside the recognizer
/// vocabulary land in no table and are only counted.
pub fn aggregate_by_label(extraction: &RecordedExtraction) -> Vec<LabelTable> {
    let mut tables: Vec<LabelTable> = extraction
        .labels
        .iter()
        .map(|label| LabelTable {
            label: label.clone(),
            rows: Vec::new(),
        })
        .collect();

    let mut unknown = 0usize;
    for document in &extraction.documents {
        for span in &document.spans {
            match tables.iter_mut().find(|table| table.label == span.label) {
                Some(table) => table.rows.push(SpanRow {
                    document_id: document.document_id.clone(),
                    start_char: span.start_char,
                    end_char: span.end_char,
                    text: span.text.clone(),
                }),
                None => unknown += 1,
            }
        }
    }

    if unknown > 0 {
        warn!(
            target: TARGET_EXTRACT,
            "{} spans carried labels outside the recognizer vocabulary", unknown
        );
    }

    tables
}
