//! Column-level profile of a frame.

use cryptotrend_core::data::frame::render_column;
use cryptotrend_core::stats;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const HISTOGRAM_BINS: usize = 10;
pub const TOP_VALUES: usize = 5;

/// `Minimal` skips the expensive sections (duplicates, quantiles,
/// histograms, frequencies, correlations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    Full,
    Minimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
    pub missing_pct: f64,
    /// Type name → column count.
    pub column_types: Vec<(&'static str, usize)>,
    /// Full mode only.
    pub duplicate_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub zeros: usize,
    pub negatives: usize,
    pub std_dev: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub histogram: Vec<HistogramBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableProfile {
    pub name: String,
    pub dtype: &'static str,
    pub count: usize,
    pub missing: usize,
    pub missing_pct: f64,
    pub distinct: usize,
    pub numeric: Option<NumericStats>,
    /// Most frequent values, descending; ties keep first-seen order.
    pub top_values: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `None` where the coefficient is undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub title: String,
    pub mode: ProfileMode,
    pub overview: Overview,
    pub variables: Vec<VariableProfile>,
    pub correlations: Option<CorrelationMatrix>,
}

impl DatasetProfile {
    pub fn build(title: &str, df: &DataFrame, mode: ProfileMode) -> PolarsResult<Self> {
        let full = mode == ProfileMode::Full;
        let rendered = df
            .get_columns()
            .iter()
            .map(render_column)
            .collect::<PolarsResult<Vec<_>>>()?;

        let variables = df
            .get_columns()
            .iter()
            .zip(&rendered)
            .map(|(column, cells)| profile_variable(column, cells, full))
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(Self {
            title: title.to_string(),
            mode,
            overview: overview(df, &rendered, full),
            variables,
            correlations: if full { Some(correlations(df)?) } else { None },
        })
    }
}

/// Report-level type family of a polars dtype.
pub fn type_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Float32 | DataType::Float64 => "float",
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "int",
        DataType::String => "text",
        DataType::Boolean => "bool",
        _ => "other",
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(type_name(dtype), "float" | "int")
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn overview(df: &DataFrame, rendered: &[Vec<Option<String>>], full: bool) -> Overview {
    let (rows, columns) = df.shape();
    let missing_cells: usize = df.get_columns().iter().map(|c| c.null_count()).sum();

    let mut column_types = Vec::new();
    for name in ["float", "int", "text", "bool", "other"] {
        let n = df
            .get_columns()
            .iter()
            .filter(|c| type_name(c.dtype()) == name)
            .count();
        if n > 0 {
            column_types.push((name, n));
        }
    }

    let duplicate_rows = full.then(|| {
        let mut seen = HashSet::new();
        (0..rows)
            .filter(|&r| {
                let row: Vec<&Option<String>> = rendered.iter().map(|cells| &cells[r]).collect();
                !seen.insert(row)
            })
            .count()
    });

    Overview {
        rows,
        columns,
        missing_cells,
        missing_pct: pct(missing_cells, rows * columns),
        column_types,
        duplicate_rows,
    }
}

fn profile_variable(
    column: &Column,
    cells: &[Option<String>],
    full: bool,
) -> PolarsResult<VariableProfile> {
    let rows = column.len();
    let missing = column.null_count();
    let present: Vec<&str> = cells.iter().flatten().map(String::as_str).collect();
    let distinct = present.iter().collect::<HashSet<_>>().len();

    let numeric = if is_numeric(column.dtype()) {
        let values = column.cast(&DataType::Float64)?;
        Some(numeric_stats(values.f64()?, full)?)
    } else {
        None
    };

    let top_values = if full && numeric.is_none() {
        top_values(&present)
    } else {
        Vec::new()
    };

    Ok(VariableProfile {
        name: column.name().to_string(),
        dtype: type_name(column.dtype()),
        count: rows - missing,
        missing,
        missing_pct: pct(missing, rows),
        distinct,
        numeric,
        top_values,
    })
}

fn numeric_stats(values: &Float64Chunked, full: bool) -> PolarsResult<NumericStats> {
    let observed: Vec<f64> = values.into_iter().flatten().collect();
    let min = values.min();
    let max = values.max();

    let mut out = NumericStats {
        mean: values.mean(),
        min,
        max,
        zeros: observed.iter().filter(|v| **v == 0.0).count(),
        negatives: observed.iter().filter(|v| **v < 0.0).count(),
        std_dev: None,
        q1: None,
        median: None,
        q3: None,
        histogram: Vec::new(),
    };
    if full {
        out.std_dev = values.std(1);
        out.q1 = values.quantile(0.25, QuantileMethod::Linear)?;
        out.median = values.median();
        out.q3 = values.quantile(0.75, QuantileMethod::Linear)?;
        if let (Some(lo), Some(hi)) = (min, max) {
            out.histogram = histogram(&observed, lo, hi);
        }
    }
    Ok(out)
}

/// Equal-width bins over `[lo, hi]`; the last bin is closed. A constant
/// column gets a single bin.
fn histogram(values: &[f64], lo: f64, hi: f64) -> Vec<HistogramBin> {
    if hi <= lo {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: values.len(),
        }];
    }
    let width = (hi - lo) / HISTOGRAM_BINS as f64;
    let mut bins: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
        .map(|i| HistogramBin {
            lower: lo + width * i as f64,
            upper: if i + 1 == HISTOGRAM_BINS {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();
    for v in values {
        let idx = (((v - lo) / width) as usize).min(HISTOGRAM_BINS - 1);
        bins[idx].count += 1;
    }
    bins
}

fn top_values(values: &[&str]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for v in values {
        let entry = counts.entry(v).or_insert(0);
        if *entry == 0 {
            order.push(v);
        }
        *entry += 1;
    }
    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|v| (v.to_string(), counts[v]))
        .collect();
    // Stable sort keeps first-seen order among ties.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_VALUES);
    ranked
}

fn correlations(df: &DataFrame) -> PolarsResult<CorrelationMatrix> {
    let mut numeric: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for column in df.get_columns().iter().filter(|c| is_numeric(c.dtype())) {
        let values = column.cast(&DataType::Float64)?;
        numeric.push((
            column.name().to_string(),
            values.f64()?.into_iter().collect(),
        ));
    }

    let values = numeric
        .iter()
        .map(|(_, x)| {
            numeric
                .iter()
                .map(|(_, y)| stats::pearson(x, y))
                .collect()
        })
        .collect();

    Ok(CorrelationMatrix {
        columns: numeric.into_iter().map(|(n, _)| n).collect(),
        values,
    })
}
