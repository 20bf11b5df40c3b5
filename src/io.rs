use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::DataParams;
use crate::extract::LabelTable;
use crate::record::{NarrativeRecord, Route};
use crate::triage::quantile::RoutingReport;
use crate::TARGET_TRIAGE;

/// One row of the source table before any stage has touched it. An empty
/// narrative field reads as `None` and is treated as a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub id: String,
    pub narrative: Option<String>,
}

/// Columns written to every partition file, in order.
const PARTITION_HEADER: [&str; 12] = [
    "id",
    "narrative",
    "normalized_text",
    "length",
    "quantile",
    "route",
    "is_short",
    "is_dirty",
    "is_same_source_prefix",
    "is_same_source_suffix",
    "is_same_source",
    "edge_case_count",
];

/// Read the corpus from a CSV source. Both configured columns must exist;
/// a missing column is fatal before any stage runs.
pub fn read_corpus(
    path: &Path,
    columns: &DataParams,
    limit: Option<usize>,
) -> Result<Vec<SourceRow>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .clone();
    let id_index = match headers.iter().position(|h| h == columns.id_column) {
        Some(index) => index,
        None => bail!(
            "input {} is missing required id column `{}`",
            path.display(),
            columns.id_column
        ),
    };
    let narrative_index = match headers.iter().position(|h| h == columns.narrative_column) {
        Some(index) => index,
        None => bail!(
            "input {} is missing required narrative column `{}`",
            path.display(),
            columns.narrative_column
        ),
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record =
            result.with_context(|| format!("failed to parse a row of {}", path.display()))?;
        let id = record.get(id_index).unwrap_or("").trim().to_string();
        let narrative = record
            .get(narrative_index)
            .filter(|field| !field.is_empty())
            .map(str::to_string);
        rows.push(SourceRow { id, narrative });
        if let Some(limit) = limit {
            if rows.len() >= limit {
                break;
            }
        }
    }

    info!(target: TARGET_TRIAGE, "{} total rows read from {}", rows.len(), path.display());
    Ok(rows)
}

/// Paths of the three partition files a triage run produces.
#[derive(Debug, Clone)]
pub struct PartitionPaths {
    pub accepted: PathBuf,
    pub diverted: PathBuf,
    pub complete: PathBuf,
}

/// Persist the routed record set: the accepted subset, the diverted subset
/// and the complete annotated table, each under the transformed directory.
pub fn write_partitions(
    transformed_dir: &Path,
    records: &[NarrativeRecord],
    routing: &RoutingReport,
) -> Result<PartitionPaths> {
    let accepted_dir = transformed_dir.join("accepted");
    let diverted_dir = transformed_dir.join("diverted");
    fs::create_dir_all(&accepted_dir)
        .with_context(|| format!("failed to create {}", accepted_dir.display()))?;
    fs::create_dir_all(&diverted_dir)
        .with_context(|| format!("failed to create {}", diverted_dir.display()))?;

    let paths = PartitionPaths {
        accepted: accepted_dir.join(&routing.accepted_filename),
        diverted: diverted_dir.join(&routing.diverted_filename),
        complete: transformed_dir.join("complete.csv"),
    };

    write_partition(&paths.accepted, records, Some(Route::Accepted))?;
    write_partition(&paths.diverted, records, Some(Route::Diverted))?;
    write_partition(&paths.complete, records, None)?;

    info!(
        target: TARGET_TRIAGE,
        "accepted narratives saved to {}",
        paths.accepted.display()
    );
    info!(
        target: TARGET_TRIAGE,
        "diverted narratives saved to {}",
        paths.diverted.display()
    );

    Ok(paths)
}

fn write_partition(
    path: &Path,
    records: &[NarrativeRecord],
    route: Option<Route>,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create partition file {}", path.display()))?;
    writer
        .write_record(PARTITION_HEADER)
        .context("failed to write partition header")?;
    for record in records {
        if route.is_some() && record.route != route {
            continue;
        }
        writer
            .write_record(partition_row(record))
            .with_context(|| format!("failed to write row {} to {}", record.id, path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush partition file {}", path.display()))?;
    Ok(())
}

fn partition_row(record: &NarrativeRecord) -> Vec<String> {
    vec![
        record.id.clone(),
        record.raw_text.clone().unwrap_or_default(),
        record.normalized_text.clone(),
        record.length.to_string(),
        record.bucket_label().unwrap_or_default(),
        record.route.map(|r| r.to_string()).unwrap_or_default(),
        flag(record.is_short),
        flag(record.is_dirty),
        flag(record.is_same_source_prefix),
        flag(record.is_same_source_suffix),
        flag(record.is_same_source),
        record.edge_case_count.to_string(),
    ]
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Write one CSV table per entity label, named after the label. Tables are
/// sparse: a document with no span for a label has no row there.
pub fn write_label_tables(extracts_dir: &Path, tables: &[LabelTable]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(extracts_dir)
        .with_context(|| format!("failed to create {}", extracts_dir.display()))?;

    let mut paths = Vec::with_capacity(tables.len());
    for table in tables {
        let path = extracts_dir.join(format!("{}.csv", sanitize_label(&table.label)));
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("failed to create label table {}", path.display()))?;
        if table.rows.is_empty() {
            writer
                .write_record(["document_id", "start_char", "end_char", "text"])
                .context("failed to write label table header")?;
        }
        for row in &table.rows {
            writer.serialize(row).with_context(|| {
                format!("failed to write span row to {}", path.display())
            })?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush label table {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

/// Persist the original id/summary columns alongside the label tables.
pub fn write_summaries(extracts_dir: &Path, rows: &[SourceRow]) -> Result<PathBuf> {
    fs::create_dir_all(extracts_dir)
        .with_context(|| format!("failed to create {}", extracts_dir.display()))?;

    let path = extracts_dir.join("summaries.csv");
    let mut writer = WriterBuilder::new()
        .from_path(&path)
        .with_context(|| format!("failed to create summary table {}", path.display()))?;
    writer
        .write_record(["id", "narrative"])
        .context("failed to write summary header")?;
    for row in rows {
        writer
            .write_record([row.id.as_str(), row.narrative.as_deref().unwrap_or_default()])
            .with_context(|| format!("failed to write summary row {}", row.id))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush summary table {}", path.display()))?;
    Ok(path)
}

/// File-system-safe label name: lowercase, non-alphanumerics become `_`.
pub fn sanitize_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
