pub mod dedup;
pub mod edge_cases;
pub mod normalize;
pub mod quantile;

pub use dedup::{dedup_records, DedupReport};
pub use edge_cases::{EdgeCaseDetector, EdgeCaseReport};
pub use normalize::{normalize_rows, normalize_text, NormalizeReport};
pub use quantile::{QuantileRouter, RoutingReport};

use anyhow::Result;
use serde_json::json;
use std::time::Instant;
use tracing::info;

use crate::config::{PipelineConfig, TriageParams};
use crate::io::{self, PartitionPaths, SourceRow};
use crate::record::NarrativeRecord;
use crate::session::Session;
use crate::TARGET_TRIAGE;

/// Everything the triage stages produced for one run.
pub struct TriageOutcome {
    pub records: Vec<NarrativeRecord>,
    pub normalize: NormalizeReport,
    pub dedup: DedupReport,
    pub edge_cases: EdgeCaseReport,
    pub routing: RoutingReport,
}

/// Run the triage stages over an in-memory corpus without touching disk.
/// Each stage consumes the previous stage's output and returns a new record
/// set; nothing is shared across stage boundaries.
pub fn run_stages(params: &TriageParams, rows: Vec<SourceRow>) -> TriageOutcome {
    let (records, normalize) = normalize_rows(rows);
    info!(
        target: TARGET_TRIAGE,
        "{} missing values replaced with `0`", normalize.missing
    );

    let (records, dedup) = dedup_records(records);

    let detector = EdgeCaseDetector::new()
        .with_short_threshold(params.short_threshold)
        .with_form_marker(&params.form_marker);
    let (records, edge_cases) = detector.detect(records);

    let router = QuantileRouter::new(params.quantiles);
    let (records, routing) = router.route(records);

    TriageOutcome {
        records,
        normalize,
        dedup,
        edge_cases,
        routing,
    }
}

/// Full triage: stages, partition persistence and session-log entries.
pub fn run_triage(
    config: &PipelineConfig,
    session: &mut Session,
    rows: Vec<SourceRow>,
) -> Result<(TriageOutcome, PartitionPaths)> {
    let started = Instant::now();

    session.log.append("IdColumn", &config.data.id_column);
    session.log.append("NarrativeColumn", &config.data.narrative_column);
    session.log.append("NumberOfRecords", rows.len());

    let outcome = run_stages(&config.triage, rows);

    session.log.append("NullValues", outcome.normalize.missing);
    session.log.append("TrueDuplicates", outcome.dedup.exact_removed);
    session
        .log
        .append("NarrativeDuplicates", outcome.dedup.narrative_removed);
    session.log.append("UniqueNarratives", outcome.records.len());

    let distribution: Vec<_> = outcome
        .routing
        .distribution
        .iter()
        .map(|(bucket, rows)| json!({"bucket": bucket, "rows": rows}))
        .collect();
    session.log.append("QuantileDistribution", distribution);
    session.log.append("AcceptedRows", outcome.routing.accepted);
    session.log.append("DivertedRows", outcome.routing.diverted);
    if outcome.routing.degenerate {
        session.log.append("DegenerateQuantiles", true);
    }

    session.log.append(
        "EdgeCasesByType",
        json!({
            "SHORT": outcome.edge_cases.short,
            "HTML": outcome.edge_cases.html_rows,
            "IMG": outcome.edge_cases.img_rows,
            "FORM": outcome.edge_cases.form_rows,
            "SAME_SRC": outcome.edge_cases.same_source,
        }),
    );
    session
        .log
        .append("TotalEdgeCases", outcome.edge_cases.total_edge_cases);

    let partitions = io::write_partitions(
        &session.transformed_dir(),
        &outcome.records,
        &outcome.routing,
    )?;
    session
        .log
        .append("AcceptedPath", partitions.accepted.display().to_string());
    session
        .log
        .append("DivertedPath", partitions.diverted.display().to_string());
    session
        .log
        .append("TriageSeconds", started.elapsed().as_secs_f64());

    Ok((outcome, partitions))
}
