//! Publishing: copy the final artifacts to durable storage under
//! run-timestamped names.

use super::{require_file, StageError};
use crate::config::PipelineConfig;
use chrono::{DateTime, Local};
use cryptotrend_core::data::atomic::tmp_path;
use cryptotrend_core::data::frame::column_names;
use cryptotrend_core::data::{read_csv_bytes, CsvSchema};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CLASSIFIED_PREFIX: &str = "crypto_api_classified";
pub const CLEANED_PREFIX: &str = "crypto_historical_cleaned";

/// `YYYYMMDD_HHMMSS`, local time.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn run_timestamp(run_time: &DateTime<Local>) -> String {
    run_time.format(RUN_TIMESTAMP_FORMAT).to_string()
}

pub fn published_name(prefix: &str, timestamp: &str) -> String {
    format!("{prefix}_{timestamp}.csv")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedFile {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub bytes: u64,
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishSummary {
    pub timestamp: String,
    pub classified: PublishedFile,
    pub cleaned: PublishedFile,
}

impl fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published {} and {}",
            self.classified.path.display(),
            self.cleaned.path.display()
        )
    }
}

/// Copy both final artifacts into the publish directory.
///
/// Both inputs are checked before anything is copied, and both copies are
/// staged under temp names before either is renamed into place. A failure
/// at any point publishes nothing.
pub fn download_final_data(
    config: &PipelineConfig,
    run_time: DateTime<Local>,
) -> Result<PublishSummary, StageError> {
    let classified_src = config.classified_path();
    let cleaned_src = config.cleaned_historical_path();
    require_file(&classified_src)?;
    require_file(&cleaned_src)?;

    fs::create_dir_all(&config.publish_dir).map_err(StageError::io(&config.publish_dir))?;

    let timestamp = run_timestamp(&run_time);
    let classified = StagedCopy::new(
        &classified_src,
        &config.publish_dir.join(published_name(CLASSIFIED_PREFIX, &timestamp)),
    )?;
    let cleaned = StagedCopy::new(
        &cleaned_src,
        &config.publish_dir.join(published_name(CLEANED_PREFIX, &timestamp)),
    )?;

    let classified_file = classified.describe()?;
    let cleaned_file = cleaned.describe()?;

    let classified_dest = classified.commit()?;
    if let Err(e) = cleaned.commit() {
        let _ = fs::remove_file(&classified_dest);
        return Err(e);
    }

    for file in [&classified_file, &cleaned_file] {
        info!(
            path = %file.path.display(),
            rows = file.rows,
            columns = file.columns,
            bytes = file.bytes,
            blake3 = %file.blake3,
            "published artifact"
        );
    }

    Ok(PublishSummary {
        timestamp,
        classified: classified_file,
        cleaned: cleaned_file,
    })
}

/// A copy waiting under its temp name. Removed on drop unless committed.
struct StagedCopy {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedCopy {
    /// Copy with permissions and access/modification times.
    fn new(src: &Path, dest: &Path) -> Result<Self, StageError> {
        let staged = Self {
            tmp: tmp_path(dest),
            dest: dest.to_path_buf(),
            committed: false,
        };
        fs::copy(src, &staged.tmp).map_err(StageError::io(&staged.tmp))?;

        let meta = fs::metadata(src).map_err(StageError::io(src))?;
        let mut times = fs::FileTimes::new();
        if let Ok(modified) = meta.modified() {
            times = times.set_modified(modified);
        }
        if let Ok(accessed) = meta.accessed() {
            times = times.set_accessed(accessed);
        }
        fs::OpenOptions::new()
            .write(true)
            .open(&staged.tmp)
            .and_then(|f| f.set_times(times))
            .map_err(StageError::io(&staged.tmp))?;
        Ok(staged)
    }

    /// Shape and digest of the staged bytes, reported under the final path.
    fn describe(&self) -> Result<PublishedFile, StageError> {
        let bytes = fs::read(&self.tmp).map_err(StageError::io(&self.tmp))?;
        let digest = blake3::hash(&bytes).to_hex().to_string();
        let len = bytes.len() as u64;
        let df = read_csv_bytes(bytes, CsvSchema::Text)?;

        Ok(PublishedFile {
            path: self.dest.clone(),
            rows: df.height(),
            columns: df.width(),
            column_names: column_names(&df),
            bytes: len,
            blake3: digest,
        })
    }

    fn commit(mut self) -> Result<PathBuf, StageError> {
        fs::rename(&self.tmp, &self.dest).map_err(StageError::io(&self.dest))?;
        self.committed = true;
        Ok(self.dest.clone())
    }
}

impl Drop for StagedCopy {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}
