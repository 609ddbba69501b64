//! Stage entry points.
//!
//! Each stage either persists its artifact in full or fails before writing
//! it. Artifacts are written atomically, so a failed stage never leaves a
//! partial file behind for its dependents.

pub mod classify;
pub mod clean;
pub mod ingest;
pub mod publish;
pub mod report;

pub use classify::{classify_api_data, ClassifySummary};
pub use clean::{clean_historical_data, CleanSummary};
pub use ingest::{ingest_api_data, IngestSummary};
pub use publish::{download_final_data, PublishSummary, PublishedFile};
pub use report::{generate_data_quality_reports, ReportOutcome, ReportSummary};

use cryptotrend_core::data::{write_atomic, FetchError, FrameError};
use cryptotrend_core::{ClassifyError, CleaningError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal stage failures. Dependents of a failed stage do not run.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("required input not found: {}", path.display())]
    InputMissing { path: PathBuf },

    #[error("live market snapshot is empty; refusing to continue with zero rows")]
    UpstreamEmpty,

    #[error("live market fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("cleaning failed: {0}")]
    Cleaning(#[from] CleaningError),

    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> StageError + '_ {
        move |source| StageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path) -> impl FnOnce(csv::Error) -> StageError + '_ {
        move |source| StageError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Fail with `InputMissing` unless `path` is an existing file.
pub fn require_file(path: &Path) -> Result<(), StageError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StageError::InputMissing {
            path: path.to_path_buf(),
        })
    }
}

/// Serialize typed rows to CSV and write them atomically.
pub(crate) fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StageError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row).map_err(StageError::csv(path))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| StageError::Io {
            path: path.to_path_buf(),
            source: e.into_error(),
        })?;
    write_atomic(path, &bytes).map_err(StageError::io(path))
}

/// Read typed rows from a CSV artifact with trimmed headers.
pub(crate) fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StageError> {
    require_file(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(StageError::csv(path))?;
    rdr.deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(StageError::csv(path))
}
