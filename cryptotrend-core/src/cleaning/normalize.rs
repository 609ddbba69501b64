//! Field normalization: currency, percentage, and supply text to numbers.
//!
//! Every rule is total: an unparsable or non-finite cell becomes missing,
//! never an error. Cells are cast to text before parsing, so a rule gives the
//! same answer whatever type the reader assigned to the column.

use super::{HistoricalLayout, CURRENCY_COLUMNS, PERCENTAGE_COLUMNS, SUPPLY_COLUMN};
use polars::prelude::*;

const CURRENCY_NOISE: &str = r"[$,\s]";
const PERCENT_NOISE: &str = r"[%\s]";

fn parse_number(name: &str, noise: &str) -> Expr {
    let parsed = col(name)
        .cast(DataType::String)
        .str()
        .replace_all(lit(noise), lit(""), false)
        .cast(DataType::Float64);
    when(parsed.clone().is_finite())
        .then(parsed)
        .otherwise(lit(NULL))
}

/// Strip `$`, `,` and whitespace, then parse: `"$1,234.50"` → `1234.5`.
pub fn currency_expr(name: &str) -> Expr {
    parse_number(name, CURRENCY_NOISE).alias(name)
}

/// Percentage points to a fraction: `"12.5%"` → `0.125`, and `2.1` → `0.021`.
pub fn percentage_expr(name: &str) -> Expr {
    (parse_number(name, PERCENT_NOISE) / lit(100.0)).alias(name)
}

/// Values already stored as fractions are parsed without scaling.
pub fn fraction_expr(name: &str) -> Expr {
    parse_number(name, PERCENT_NOISE).alias(name)
}

/// Parse a total-supply cell into a whole number of units.
///
/// Accepts plain numbers (`"21,000,000"`) and magnitude suffixes
/// (`"21 Million"`, `"1.5 Billion"`). `-`, empty, and missing cells are
/// missing; so is anything that fails to parse.
pub fn clean_total_supply(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "-" {
        return None;
    }

    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();

    let (number, scale) = if compact.contains("Billion") {
        (compact.replace("Billion", ""), 1_000_000_000.0)
    } else if compact.contains("Million") {
        (compact.replace("Million", ""), 1_000_000.0)
    } else {
        (compact, 1.0)
    };

    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| (v * scale).trunc() as i64)
}

/// Apply [`clean_total_supply`] to every cell of a column.
pub fn supply_series(column: &Column) -> PolarsResult<Series> {
    let text = column.cast(&DataType::String)?;
    let parsed: Int64Chunked = text.str()?.into_iter().map(clean_total_supply).collect();
    Ok(parsed.with_name(column.name().clone()).into_series())
}

/// Normalize every known numeric column in place of the text it was read as.
///
/// Percentage columns of raw input hold points and are scaled to fractions;
/// those of cleaned input already hold fractions.
pub fn normalize(df: DataFrame, layout: HistoricalLayout) -> PolarsResult<DataFrame> {
    let supply = supply_series(df.column(SUPPLY_COLUMN)?)?;

    let mut exprs: Vec<Expr> = CURRENCY_COLUMNS.iter().map(|n| currency_expr(n)).collect();
    exprs.extend(PERCENTAGE_COLUMNS.iter().map(|n| match layout {
        HistoricalLayout::Raw => percentage_expr(n),
        HistoricalLayout::Cleaned => fraction_expr(n),
    }));

    let mut out = df.lazy().with_columns(exprs).collect()?;
    out.with_column(supply)?;
    Ok(out)
}
