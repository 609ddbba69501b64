//! CSV ⇄ polars `DataFrame`.
//!
//! Headers are trimmed on read and empty fields are missing. Written output
//! goes through [`write_atomic`], so readers never observe a partial file.

use super::atomic::write_atomic;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How column types are decided on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvSchema {
    /// Every column is `String`; parsing is left to the caller.
    Text,
    /// Types inferred over the whole file. A text column whose values all
    /// parse as numbers becomes numeric.
    Inferred,
}

impl CsvSchema {
    fn infer_schema_length(self) -> Option<usize> {
        match self {
            CsvSchema::Text => Some(0),
            CsvSchema::Inferred => None,
        }
    }
}

/// Read a CSV file.
pub fn read_csv(path: &Path, schema: CsvSchema) -> Result<DataFrame, FrameError> {
    let bytes = std::fs::read(path).map_err(|source| FrameError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_bytes(bytes, schema)
}

/// Read CSV text already in memory.
pub fn read_csv_bytes(
    bytes: impl Into<Vec<u8>>,
    schema: CsvSchema,
) -> Result<DataFrame, FrameError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(schema.infer_schema_length())
        .into_reader_with_file_handle(Cursor::new(bytes.into()))
        .finish()?;
    trim_headers(df)
}

fn trim_headers(mut df: DataFrame) -> Result<DataFrame, FrameError> {
    for name in column_names(&df) {
        let trimmed = name.trim();
        if trimmed != name {
            df.rename(&name, trimmed.into())?;
        }
    }
    Ok(df)
}

/// Render as CSV with a header row.
pub fn to_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(df)?;
    Ok(buf)
}

/// Write as CSV, atomically.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), FrameError> {
    let bytes = to_csv_bytes(df)?;
    write_atomic(path, &bytes).map_err(|source| FrameError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Like `DataFrame::column`, with a typed missing-column error.
pub fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, FrameError> {
    df.column(name)
        .map_err(|_| FrameError::MissingColumn(name.to_string()))
}

/// Every cell rendered as text; missing cells stay `None`.
pub fn render_column(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}
