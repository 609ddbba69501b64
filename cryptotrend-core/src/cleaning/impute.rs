//! Median imputation for numeric columns.

use super::CleaningError;
use polars::prelude::*;

/// One column's fill: how many cells and with what value.
#[derive(Debug, Clone, PartialEq)]
pub struct Imputation {
    pub column: String,
    pub filled: usize,
    pub median: f64,
}

/// Fill missing cells of every `Float64`/`Int64` column with that column's
/// median.
///
/// Integer columns receive the median truncated toward zero. Text and boolean
/// columns are left alone. A numeric column with no observed value has no
/// median and fails the whole pass before anything is modified.
pub fn impute_median(df: DataFrame) -> Result<(DataFrame, Vec<Imputation>), CleaningError> {
    let mut plan = Vec::new();
    let mut fills = Vec::new();

    for column in df.get_columns() {
        let filled = column.null_count();
        if filled == 0 {
            continue;
        }
        let median = match column.dtype() {
            DataType::Float64 => column.f64()?.median(),
            DataType::Int64 => column.i64()?.median(),
            _ => continue,
        };
        let name = column.name().to_string();
        let median = median.ok_or_else(|| CleaningError::UndefinedMedian {
            column: name.clone(),
        })?;

        let fill = if column.dtype() == &DataType::Int64 {
            lit(median.trunc() as i64)
        } else {
            lit(median)
        };
        fills.push(col(name.as_str()).fill_null(fill));
        plan.push(Imputation {
            column: name,
            filled,
            median,
        });
    }

    if fills.is_empty() {
        return Ok((df, plan));
    }
    let df = df.lazy().with_columns(fills).collect()?;
    Ok((df, plan))
}
