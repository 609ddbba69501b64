//! Live Ingestion: fetch the market snapshot and persist it.

use super::{write_rows, StageError};
use crate::config::PipelineConfig;
use cryptotrend_core::data::MarketDataProvider;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub provider: String,
    pub rows: usize,
    pub path: PathBuf,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows from {} -> {}",
            self.rows,
            self.provider,
            self.path.display()
        )
    }
}

/// Fetch the snapshot and write it to the scratch location.
///
/// A fetch error and an empty snapshot are both fatal; no file is written.
pub fn ingest_api_data(
    provider: &dyn MarketDataProvider,
    config: &PipelineConfig,
) -> Result<IngestSummary, StageError> {
    info!(provider = provider.name(), "fetching live market snapshot");
    let rows = provider.fetch_markets().map_err(|e| {
        error!(provider = provider.name(), error = %e, "live fetch failed");
        e
    })?;
    if rows.is_empty() {
        error!(provider = provider.name(), "live fetch returned no rows");
        return Err(StageError::UpstreamEmpty);
    }

    let path = config.api_snapshot_path();
    write_rows(&path, &rows)?;
    info!(rows = rows.len(), path = %path.display(), "live snapshot written");

    Ok(IngestSummary {
        provider: provider.name().to_string(),
        rows: rows.len(),
        path,
    })
}
