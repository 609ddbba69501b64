//! Data Quality Reporting: best-effort HTML profiles of two artifacts.
//!
//! Never fails the run. Each report's failure is captured and logged.

use crate::config::PipelineConfig;
use crate::reporting::{DatasetProfile, HtmlReportGenerator, ProfileMode};
use anyhow::{Context, Result};
use cryptotrend_core::data::{read_csv, write_atomic, CsvSchema};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const API_REPORT_TITLE: &str = "Crypto API Quality Report";
pub const FINAL_REPORT_TITLE: &str = "Final Classified Quality Report";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Generated { path: PathBuf },
    Failed { error: String },
}

impl ReportOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, ReportOutcome::Generated { .. })
    }
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutcome::Generated { path } => write!(f, "generated {}", path.display()),
            ReportOutcome::Failed { error } => write!(f, "failed ({error})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub api: ReportOutcome,
    pub classified: ReportOutcome,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api report {}; final report {}", self.api, self.classified)
    }
}

/// Profile the live snapshot (full) and the classified output (minimal).
pub fn generate_data_quality_reports(config: &PipelineConfig) -> ReportSummary {
    let api = capture(
        "api",
        write_report(
            &config.api_snapshot_path(),
            &config.api_report_path(),
            API_REPORT_TITLE,
            ProfileMode::Full,
        ),
    );
    let classified = capture(
        "final",
        write_report(
            &config.classified_path(),
            &config.final_report_path(),
            FINAL_REPORT_TITLE,
            ProfileMode::Minimal,
        ),
    );
    ReportSummary { api, classified }
}

fn capture(which: &str, result: Result<PathBuf>) -> ReportOutcome {
    match result {
        Ok(path) => {
            info!(report = which, path = %path.display(), "quality report generated");
            ReportOutcome::Generated { path }
        }
        Err(e) => {
            warn!(report = which, error = %format!("{e:#}"), "quality report failed");
            ReportOutcome::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

fn write_report(input: &Path, output: &Path, title: &str, mode: ProfileMode) -> Result<PathBuf> {
    let df = read_csv(input, CsvSchema::Inferred)
        .with_context(|| format!("reading {}", input.display()))?;
    let profile = DatasetProfile::build(title, &df, mode)
        .with_context(|| format!("profiling {}", input.display()))?;
    let html = HtmlReportGenerator.generate(&profile);
    write_atomic(output, html.as_bytes())
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(output.to_path_buf())
}
