//! Classification: label the live snapshot with 24h trends.

use super::{read_rows, write_rows, StageError};
use crate::config::PipelineConfig;
use cryptotrend_core::classify_snapshot;
use cryptotrend_core::data::MarketSnapshotRow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ClassifySummary {
    pub rows: usize,
    /// Label text → row count.
    pub label_counts: BTreeMap<&'static str, usize>,
    pub path: PathBuf,
}

impl fmt::Display for ClassifySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows classified", self.rows)?;
        for (label, count) in &self.label_counts {
            write!(f, ", {label}: {count}")?;
        }
        write!(f, " -> {}", self.path.display())
    }
}

pub fn classify_api_data(config: &PipelineConfig) -> Result<ClassifySummary, StageError> {
    let input = config.api_snapshot_path();
    let rows: Vec<MarketSnapshotRow> = read_rows(&input)?;
    info!(rows = rows.len(), path = %input.display(), "classifying live snapshot");

    let classified = classify_snapshot(rows)?;

    let mut label_counts = BTreeMap::new();
    for row in &classified {
        *label_counts
            .entry(row.trend_classification.as_str())
            .or_insert(0) += 1;
    }

    let path = config.classified_path();
    write_rows(&path, &classified)?;
    info!(rows = classified.len(), path = %path.display(), "classified dataset written");

    Ok(ClassifySummary {
        rows: classified.len(),
        label_counts,
        path,
    })
}
