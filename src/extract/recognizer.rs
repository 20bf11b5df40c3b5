use anyhow::{Context, Result};
use tracing::info;

use super::types::{DocumentExtraction, RecordedExtraction};
use super::TARGET_EXTRACT;
use crate::record::NarrativeRecord;

// Re-export for implementers of the trait.
pub use super::types::EntitySpan;

/// The external entity-recognition collaborator. Opaque and possibly slow;
/// the pipeline only contracts on this shape and never holds ambient model
/// state.
pub trait EntityRecognizer {
    /// The fixed, enumerable label vocabulary this recognizer produces.
    fn labels(&self) -> Vec<String>;

    /// Extract zero or more labeled spans from one normalized document.
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>>;
}

/// Run the recognizer over a record set, in order, zipping every span list
/// back to its document id. A recognizer failure is fatal to this stage
/// only — triage partitions already written stay valid.
pub fn run_extraction(
    recognizer: &dyn EntityRecognizer,
    records: &[NarrativeRecord],
) -> Result<RecordedExtraction> {
    let mut documents = Vec::with_capacity(records.len());
    for record in records {
        let spans = recognizer
            .recognize(&record.normalized_text)
            .with_context(|| format!("entity recognition failed for document {}", record.id))?;
        documents.push(DocumentExtraction {
            document_id: record.id.clone(),
            spans,
        });
    }

    let recorded = RecordedExtraction {
        labels: recognizer.labels(),
        documents,
    };
    info!(
        target: TARGET_EXTRACT,
        "extracted {} spans from {} documents",
        recorded.total_spans(),
        recorded.documents.len()
    );
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    /// Flags every occurrence of the word "bank" as an ORG span.
    struct KeywordRecognizer;

    impl EntityRecognizer for KeywordRecognizer {
        fn labels(&self) -> Vec<String> {
            vec!["ORG".to_string()]
        }

        fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>> {
            if text.contains("explode") {
                bail!("model unavailable");
            }
            Ok(text
                .match_indices("bank")
                .map(|(start, word)| EntitySpan::new("ORG", start, start + word.len(), word))
                .collect())
        }
    }

    fn record(id: &str, text: &str) -> NarrativeRecord {
        NarrativeRecord::from_normalized(id.to_string(), Some(text.to_string()), text.to_string())
    }

    #[test]
    fn test_spans_zip_back_to_document_ids() {
        let records = vec![
            record("a", "the bank closed my account"),
            record("b", "nothing to see here"),
            record("c", "bank after bank refused"),
        ];
        let recorded = run_extraction(&KeywordRecognizer, &records).unwrap();
        assert_eq!(recorded.labels, vec!["ORG"]);
        assert_eq!(recorded.documents.len(), 3);
        assert_eq!(recorded.documents[0].document_id, "a");
        assert_eq!(recorded.documents[0].spans.len(), 1);
        assert!(recorded.documents[1].spans.is_empty());
        assert_eq!(recorded.documents[2].spans.len(), 2);
        assert_eq!(recorded.total_spans(), 3);
    }

    #[test]
    fn test_recognizer_failure_is_fatal_to_extraction() {
        let records = vec![record("a", "fine"), record("b", "explode now")];
        let err = run_extraction(&KeywordRecognizer, &records).unwrap_err();
        assert!(err.to_string().contains("document b"));
    }

    #[test]
    fn test_span_offsets_count_from_document_start() {
        let records = vec![record("a", "my bank branch")];
        let recorded = run_extraction(&KeywordRecognizer, &records).unwrap();
        let span = &recorded.documents[0].spans[0];
        assert_eq!(span.start_char, 3);
        assert_eq!(span.end_char, 7);
        assert_eq!(span.text, "bank");
    }
}
