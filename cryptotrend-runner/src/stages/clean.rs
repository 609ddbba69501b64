//! Historical Cleaning: normalize → flag outliers → impute, then persist.

use super::{require_file, StageError};
use crate::config::PipelineConfig;
use cryptotrend_core::clean_historical;
use cryptotrend_core::data::{read_csv, write_csv, CsvSchema};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CleanSummary {
    pub rows: usize,
    pub columns: usize,
    pub outliers: usize,
    pub imputed_columns: Vec<String>,
    pub path: PathBuf,
}

impl fmt::Display for CleanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows x {} columns, {} outliers, {} imputed columns -> {}",
            self.rows,
            self.columns,
            self.outliers,
            self.imputed_columns.len(),
            self.path.display()
        )
    }
}

pub fn clean_historical_data(config: &PipelineConfig) -> Result<CleanSummary, StageError> {
    let input = &config.historical_input;
    require_file(input)?;
    info!(path = %input.display(), "cleaning historical dataset");

    let mut cleaned = clean_historical(read_csv(input, CsvSchema::Text)?)?;

    match cleaned.bounds {
        Some(b) => debug!(
            q1 = b.q1,
            q3 = b.q3,
            lower = b.lower,
            upper = b.upper,
            outliers = cleaned.outliers,
            "price outlier bounds"
        ),
        None => debug!(
            outliers = cleaned.outliers,
            layout = ?cleaned.layout,
            "no price bounds; flags carried over or no price observed"
        ),
    }
    for imputation in &cleaned.imputations {
        debug!(
            column = %imputation.column,
            filled = imputation.filled,
            median = imputation.median,
            "imputed missing values"
        );
    }

    let path = config.cleaned_historical_path();
    write_csv(&mut cleaned.frame, &path)?;
    let (rows, columns) = cleaned.frame.shape();
    info!(
        rows,
        columns,
        layout = ?cleaned.layout,
        path = %path.display(),
        "cleaned historical dataset written"
    );

    Ok(CleanSummary {
        rows,
        columns,
        outliers: cleaned.outliers,
        imputed_columns: cleaned
            .imputations
            .iter()
            .map(|i| i.column.clone())
            .collect(),
        path,
    })
}
