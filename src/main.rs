use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use prettytable::{Cell, Row as PrettyRow, Table};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use sift::config::{DataParams, PipelineConfig};
use sift::extract::{aggregate_by_label, RecordedExtraction, TARGET_EXTRACT};
use sift::io;
use sift::session::Session;
use sift::triage::{self, TriageOutcome};
use sift::TARGET_SESSION;

#[derive(Parser)]
#[clap(name = "sift", about = "Narrative triage and entity-extraction pipeline")]
struct Cli {
    /// Path to the pipeline config file
    #[clap(short, long, default_value = "sift.json")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize, deduplicate and route a narrative corpus
    Triage {
        /// Override the configured input CSV
        #[clap(short, long)]
        input: Option<PathBuf>,

        /// Only process the first N rows
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Reassemble per-label entity tables from recorded recognizer output
    Aggregate {
        /// Recognizer output JSON (label vocabulary plus per-document spans)
        #[clap(short, long)]
        extractions: PathBuf,

        /// Accepted partition produced by `triage`
        #[clap(short, long)]
        accepted: PathBuf,
    },

    /// Preview the quantile distribution and edge cases without writing
    Inspect {
        /// Override the configured input CSV
        #[clap(short, long)]
        input: Option<PathBuf>,

        /// Only process the first N rows
        #[clap(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    sift::logging::configure_logging();

    let args = Cli::parse();
    let config = PipelineConfig::load(&args.config)?;

    banner("sift - narrative triage & entity aggregation");
    let started = Local::now();

    match args.command {
        Commands::Triage { input, limit } => run_triage_command(&config, input, limit)?,
        Commands::Aggregate {
            extractions,
            accepted,
        } => run_aggregate_command(&config, &extractions, &accepted)?,
        Commands::Inspect { input, limit } => run_inspect_command(&config, input, limit)?,
    }

    let elapsed = Local::now().signed_duration_since(started);
    info!(
        target: TARGET_SESSION,
        "total runtime: {}.{:03}s",
        elapsed.num_seconds(),
        elapsed.num_milliseconds().rem_euclid(1000)
    );
    Ok(())
}

fn banner(text: &str) {
    println!("{}", "=".repeat(68));
    println!();
    println!("{}", text.bold());
    println!("{}", "-".repeat(68));
    println!();
}

fn run_triage_command(
    config: &PipelineConfig,
    input: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    let input_path = input.unwrap_or_else(|| PathBuf::from(&config.files.input_path));
    let rows = io::read_corpus(&input_path, &config.data, limit)?;

    let mut session = Session::create(Path::new(&config.files.output_dir))?;
    session
        .log
        .append("Input", input_path.display().to_string());

    let (outcome, partitions) = triage::run_triage(config, &mut session, rows)?;

    session
        .log
        .append("EndTime", Local::now().format("%H:%M:%S").to_string());
    let log_path = session.write_log()?;

    print_distribution(&outcome);
    print_edge_cases(&outcome);
    println!(
        "{} rows accepted for auto-extraction, {} rows diverted to human review.",
        outcome.routing.accepted, outcome.routing.diverted
    );
    println!("Accepted partition: {}", partitions.accepted.display());
    println!("Diverted partition: {}", partitions.diverted.display());
    println!("Session log: {}", log_path.display());
    Ok(())
}

fn run_aggregate_command(
    config: &PipelineConfig,
    extractions: &Path,
    accepted: &Path,
) -> Result<()> {
    let recorded = RecordedExtraction::from_file(extractions)?;

    // The accepted partition carries the pipeline's own column names.
    let partition_columns = DataParams {
        id_column: "id".to_string(),
        narrative_column: "narrative".to_string(),
    };
    let accepted_rows = io::read_corpus(accepted, &partition_columns, None)?;

    let known_ids: HashSet<&str> = accepted_rows.iter().map(|row| row.id.as_str()).collect();
    let orphans = recorded
        .documents
        .iter()
        .filter(|doc| !known_ids.contains(doc.document_id.as_str()))
        .count();
    if orphans > 0 {
        warn!(
            target: TARGET_EXTRACT,
            "{} extraction documents have no matching row in the accepted partition", orphans
        );
    }

    let mut session = Session::create(Path::new(&config.files.output_dir))?;
    session
        .log
        .append("Extractions", extractions.display().to_string());
    session.log.append("Labels", &recorded.labels);
    session.log.append("TotalSpans", recorded.total_spans());

    let tables = aggregate_by_label(&recorded);
    let extracts_dir = session.extracts_dir();
    let table_paths = io::write_label_tables(&extracts_dir, &tables)?;
    let summary_path = io::write_summaries(&extracts_dir, &accepted_rows)?;

    let mut display = Table::new();
    display.add_row(PrettyRow::new(vec![Cell::new("Label"), Cell::new("Rows")]));
    for table in &tables {
        display.add_row(PrettyRow::new(vec![
            Cell::new(&table.label),
            Cell::new(&table.rows.len().to_string()),
        ]));
        session
            .log
            .append(&format!("Rows[{}]", table.label), table.rows.len());
    }
    display.printstd();

    session
        .log
        .append("SummaryPath", summary_path.display().to_string());
    let log_path = session.write_log()?;

    info!(
        target: TARGET_EXTRACT,
        "{} label tables written to {}",
        table_paths.len(),
        extracts_dir.display()
    );
    println!("Label tables: {}", extracts_dir.display());
    println!("Session log: {}", log_path.display());
    Ok(())
}

fn run_inspect_command(
    config: &PipelineConfig,
    input: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    let input_path = input.unwrap_or_else(|| PathBuf::from(&config.files.input_path));
    let rows = io::read_corpus(&input_path, &config.data, limit)?;

    let outcome = triage::run_stages(&config.triage, rows);

    print_distribution(&outcome);
    print_edge_cases(&outcome);
    println!(
        "{} rows would be accepted, {} diverted. Nothing was written.",
        outcome.routing.accepted, outcome.routing.diverted
    );
    Ok(())
}

fn print_distribution(outcome: &TriageOutcome) {
    println!("{}", "Distribution of quantiles".bright_blue());
    let mut table = Table::new();
    table.add_row(PrettyRow::new(vec![
        Cell::new("Bucket"),
        Cell::new("Rows"),
        Cell::new("Route"),
    ]));
    for (index, (bucket, rows)) in outcome.routing.distribution.iter().enumerate() {
        let route = outcome
            .records
            .iter()
            .find(|r| r.quantile_bucket == Some(index as u32 + 1))
            .and_then(|r| r.route)
            .map(|r| r.to_string())
            .unwrap_or_default();
        table.add_row(PrettyRow::new(vec![
            Cell::new(bucket),
            Cell::new(&rows.to_string()),
            Cell::new(&route),
        ]));
    }
    table.printstd();
}

fn print_edge_cases(outcome: &TriageOutcome) {
    println!("{}", "Edge cases by type".bright_blue());
    let report = &outcome.edge_cases;
    let mut table = Table::new();
    table.add_row(PrettyRow::new(vec![Cell::new("Type"), Cell::new("Rows")]));
    for (name, count) in [
        ("SHORT", report.short),
        ("HTML", report.html_rows),
        ("IMG", report.img_rows),
        ("FORM", report.form_rows),
        ("SAME_SRC", report.same_source),
    ] {
        table.add_row(PrettyRow::new(vec![
            Cell::new(name),
            Cell::new(&count.to_string()),
        ]));
    }
    table.printstd();
    println!("{} total edge cases detected.", report.total_edge_cases);
}
