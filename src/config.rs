use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Pipeline parameters, loaded from a JSON config file and grouped the way
/// a run is organized: where the data lives, how the table is shaped, and
/// how triage decides.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub files: FileParams,
    pub data: DataParams,
    #[serde(default)]
    pub triage: TriageParams,
}

/// Input/output locations.
#[derive(Debug, Clone, Deserialize)]
pub struct FileParams {
    pub input_path: String,
    pub output_dir: String,
}

/// Column names of the source table. Both are required; a source file
/// missing either column aborts the run before any stage executes.
#[derive(Debug, Clone, Deserialize)]
pub struct DataParams {
    pub id_column: String,
    pub narrative_column: String,
}

/// Triage thresholds. All have working defaults so the `triage` section may
/// be omitted entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageParams {
    /// Number of length quantiles used for routing.
    pub quantiles: u32,
    /// Character count below which a narrative is flagged SHORT.
    pub short_threshold: usize,
    /// Pattern for the recurring boilerplate artifact. Deliberately
    /// configurable: the marker is corpus-specific and fragile.
    pub form_marker: String,
}

impl Default for TriageParams {
    fn default() -> Self {
        TriageParams {
            quantiles: crate::triage::quantile::DEFAULT_QUANTILES,
            short_threshold: crate::triage::edge_cases::DEFAULT_SHORT_THRESHOLD,
            form_marker: crate::triage::edge_cases::DEFAULT_FORM_MARKER.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
