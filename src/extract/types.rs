use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single labeled entity occurrence within a document, with character
/// offsets into the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub label: String,
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
}

impl EntitySpan {
    pub fn new(label: &str, start_char: usize, end_char: usize, text: &str) -> Self {
        EntitySpan {
            label: label.to_string(),
            start_char,
            end_char,
            text: text.to_string(),
        }
    }
}

/// All spans produced for one document. `document_id` is the stable key
/// that re-associates recognizer output with its narrative, whatever order
/// the recognizer processed documents in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtraction {
    pub document_id: String,
    pub spans: Vec<EntitySpan>,
}

/// Recognizer output for a whole corpus: the label vocabulary the model
/// exposes plus per-document span lists. Serializable so an out-of-process
/// recognizer run can be aggregated later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedExtraction {
    pub labels: Vec<String>,
    pub documents: Vec<DocumentExtraction>,
}

impl RecordedExtraction {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read extraction file {}", path.display()))?;
        let recorded: RecordedExtraction = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse extraction file {}", path.display()))?;
        Ok(recorded)
    }

    pub fn total_spans(&self) -> usize {
        self.documents.iter().map(|d| d.spans.len()).sum()
    }
}
