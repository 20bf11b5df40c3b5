use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::record::NarrativeRecord;
use crate::TARGET_TRIAGE;

/// Character count below which a narrative is flagged SHORT.
pub const DEFAULT_SHORT_THRESHOLD: usize = 100;

/// Width of the salutation/signature comparison window.
pub const SOURCE_WINDOW: usize = 60;

/// Default marker for the recurring boilerplate artifact: one or more
/// literal asterisks. Corpus-specific and fragile; override it in the
/// config rather than trusting it on a new corpus.
pub const DEFAULT_FORM_MARKER: &str = r"\*+";

lazy_static! {
    // Tag-like substrings, tolerant of quoted attribute values.
    static ref HTML_TAG: Regex =
        Regex::new(r#"<(?:"[^"]*"['"]*|'[^']*'['"]*|[^'">])+>"#).unwrap();
}

const IMG_MARKER: &str = "<img alt=";

/// Flags documents likely to defeat the downstream extractor. The three
/// sub-detectors are independent and advisory: they annotate rows for audit
/// and never override the quantile routing decision.
pub struct EdgeCaseDetector {
    short_threshold: usize,
    form_marker: Option<Regex>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EdgeCaseReport {
    pub short: usize,
    pub dirty: usize,
    pub html_rows: usize,
    pub img_rows: usize,
    pub form_rows: usize,
    pub same_source_prefix: usize,
    pub same_source_suffix: usize,
    pub same_source: usize,
    pub total_edge_cases: usize,
}

impl Default for EdgeCaseDetector {
    fn default() -> Self {
        EdgeCaseDetector {
            short_threshold: DEFAULT_SHORT_THRESHOLD,
            form_marker: Regex::new(DEFAULT_FORM_MARKER).ok(),
        }
    }
}

impl EdgeCaseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_short_threshold(mut self, threshold: usize) -> Self {
        self.short_threshold = threshold;
        self
    }

    /// Override the boilerplate marker pattern. An invalid pattern disables
    /// that sub-scan with a warning rather than failing the batch.
    pub fn with_form_marker(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => self.form_marker = Some(regex),
            Err(err) => {
                warn!(
                    target: TARGET_TRIAGE,
                    "invalid form marker pattern `{}`, disabling that scan: {}", pattern, err
                );
                self.form_marker = None;
            }
        }
        self
    }

    /// Annotate every record with the SHORT / DIRTY / SAME_SRC flags and the
    /// composite edge-case count.
    pub fn detect(&self, records: Vec<NarrativeRecord>) -> (Vec<NarrativeRecord>, EdgeCaseReport) {
        let mut report = EdgeCaseReport::default();
        let mut seen_prefixes = HashSet::new();
        let mut seen_suffixes = HashSet::new();

        let mut records = records;
        for record in &mut records {
            record.is_short = record.length < self.short_threshold;

            let html = HTML_TAG.is_match(&record.normalized_text);
            let img = record.normalized_text.contains(IMG_MARKER);
            let form = self
                .form_marker
                .as_ref()
                .map_or(false, |regex| regex.is_match(&record.normalized_text));
            record.is_dirty = html || img || form;

            // First occurrence is never flagged; every repeat is.
            record.is_same_source_prefix =
                !seen_prefixes.insert(leading_window(&record.normalized_text));
            record.is_same_source_suffix =
                !seen_suffixes.insert(trailing_window(&record.normalized_text));
            record.is_same_source = record.is_same_source_prefix || record.is_same_source_suffix;

            record.edge_case_count =
                record.is_short as u8 + record.is_dirty as u8 + record.is_same_source as u8;

            report.short += record.is_short as usize;
            report.dirty += record.is_dirty as usize;
            report.html_rows += html as usize;
            report.img_rows += img as usize;
            report.form_rows += form as usize;
            report.same_source_prefix += record.is_same_source_prefix as usize;
            report.same_source_suffix += record.is_same_source_suffix as usize;
            report.same_source += record.is_same_source as usize;
            report.total_edge_cases += record.edge_case_count as usize;
        }

        info!(
            target: TARGET_TRIAGE,
            "{} total edge cases detected ({} short, {} dirty, {} repeat-source)",
            report.total_edge_cases,
            report.short,
            report.dirty,
            report.same_source
        );

        (records, report)
    }
}

fn leading_window(text: &str) -> String {
    text.chars().take(SOURCE_WINDOW).collect()
}

fn trailing_window(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars[chars.len().saturating_sub(SOURCE_WINDOW)..]
        .iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NarrativeRecord;

    fn record(id: &str, normalized: &str) -> NarrativeRecord {
        NarrativeRecord::from_normalized(
            id.to_string(),
            Some(normalized.to_string()),
            normalized.to_string(),
        )
    }

    #[test]
    fn test_short_flag_is_strict_inequality() {
        let below = record("1", &"a".repeat(99));
        let at = record("2", &"b".repeat(100));
        let (records, report) = EdgeCaseDetector::new().detect(vec![below, at]);
        assert!(records[0].is_short);
        assert!(!records[1].is_short);
        assert_eq!(report.short, 1);
    }

    #[test]
    fn test_short_example_narratives() {
        let records = vec![
            record("1", "hi"),
            record("2", &"a".repeat(500)),
        ];
        let (records, _) = EdgeCaseDetector::new().detect(records);
        assert!(records[0].is_short);
        assert!(!records[1].is_short);
    }

    #[test]
    fn test_html_tags_mark_dirty() {
        let records = vec![
            record("1", "plain text with no markup at all"),
            record("2", r#"see <div class="note">this</div> fragment"#),
            record("3", "the total was < 40 dollars"),
        ];
        let (records, report) = EdgeCaseDetector::new().detect(records);
        assert!(!records[0].is_dirty);
        assert!(records[1].is_dirty);
        assert!(!records[2].is_dirty);
        assert_eq!(report.html_rows, 1);
    }

    #[test]
    fn test_img_marker_marks_dirty() {
        let records = vec![record("1", r#"broken upload <img alt="scan of receipt""#)];
        let (records, report) = EdgeCaseDetector::new().detect(records);
        assert!(records[0].is_dirty);
        assert_eq!(report.img_rows, 1);
        assert_eq!(report.dirty, 1);
    }

    #[test]
    fn test_form_marker_marks_dirty_and_is_configurable() {
        let starred = vec![record("1", "name: *** redacted ***")];
        let (records, report) = EdgeCaseDetector::new().detect(starred);
        assert!(records[0].is_dirty);
        assert_eq!(report.form_rows, 1);

        // A stricter marker stops flagging single asterisk runs of one.
        let single = vec![record("1", "rated 5* by the caller")];
        let detector = EdgeCaseDetector::new().with_form_marker(r"\*{2,}");
        let (records, report) = detector.detect(single);
        assert!(!records[0].is_dirty);
        assert_eq!(report.form_rows, 0);
    }

    #[test]
    fn test_invalid_form_marker_fails_open() {
        let detector = EdgeCaseDetector::new().with_form_marker(r"\*(unclosed");
        let records = vec![record("1", "*** stars everywhere ***")];
        let (records, report) = detector.detect(records);
        assert!(!records[0].is_dirty);
        assert_eq!(report.form_rows, 0);
    }

    #[test]
    fn test_repeat_source_prefix_flags_only_repeats() {
        let salutation = "dear support team, i am writing to you about my case because";
        let first = format!("{} of a billing problem", salutation);
        let second = format!("{} of a login problem", salutation);
        let records = vec![
            record("1", &first),
            record("2", &second),
            record("3", "a completely unrelated narrative"),
        ];
        let (records, report) = EdgeCaseDetector::new().detect(records);
        assert!(!records[0].is_same_source_prefix);
        assert!(records[1].is_same_source_prefix);
        assert!(!records[2].is_same_source_prefix);
        assert!(records[1].is_same_source);
        assert_eq!(report.same_source_prefix, 1);
    }

    #[test]
    fn test_repeat_source_suffix_flags_only_repeats() {
        let signature = "regards, jane doe, acme complaints department, new york ny";
        let first = format!("first complaint body. {}", signature);
        let second = format!("second complaint body, different text. {}", signature);
        let records = vec![record("1", &first), record("2", &second)];
        let (records, report) = EdgeCaseDetector::new().detect(records);
        assert!(!records[0].is_same_source_suffix);
        assert!(records[1].is_same_source_suffix);
        assert_eq!(report.same_source_suffix, 1);
        assert_eq!(report.same_source, 1);
    }

    #[test]
    fn test_short_texts_compare_whole_string_windows() {
        // Both shorter than the window: identical strings still repeat.
        let records = vec![record("1", "hello"), record("2", "hello")];
        let (records, _) = EdgeCaseDetector::new().detect(records);
        assert!(records[1].is_same_source_prefix);
        assert!(records[1].is_same_source_suffix);
        assert!(records[1].is_same_source);
    }

    #[test]
    fn test_edge_case_count_is_exact_sum() {
        let shared = "dear sir or madam, this is the exact same boilerplate text here";
        let records = vec![
            record("1", shared),
            // Short, dirty and repeat-source all at once.
            record("2", shared),
        ];
        let detector = EdgeCaseDetector::new().with_form_marker(r"boilerplate");
        let (records, report) = detector.detect(records);
        assert_eq!(records[1].edge_case_count, 3);
        assert!(records[1].edge_case_count <= 3);
        // First record is short and dirty but not a repeat.
        assert_eq!(records[0].edge_case_count, 2);
        assert_eq!(report.total_edge_cases, 5);
    }

    #[test]
    fn test_flags_never_alter_routing_fields() {
        let records = vec![record("1", "hi")];
        let (records, _) = EdgeCaseDetector::new().detect(records);
        assert_eq!(records[0].quantile_bucket, None);
        assert_eq!(records[0].route, None);
    }
}
