//! Historical dataset cleaning: normalize → flag outliers → impute.
//!
//! The order is fixed. Outlier bounds are computed from the prices as parsed,
//! before any missing price is filled, and no row is ever dropped.

pub mod impute;
pub mod normalize;
pub mod outliers;

pub use impute::{impute_median, Imputation};
pub use normalize::{clean_total_supply, currency_expr, fraction_expr, percentage_expr};
pub use outliers::{flag_outliers, outlier_flag, IqrBounds};

use crate::data::frame::{has_column, require, FrameError};
use polars::prelude::*;
use thiserror::Error;

/// Source header → cleaned column name.
pub const HISTORICAL_RENAMES: [(&str, &str); 7] = [
    ("Coin Name", "coin"),
    ("Symbol", "symbol"),
    ("Price", "current_price"),
    ("24h Volume", "24h_volume"),
    ("Circulating Supply", "circulating_supply"),
    ("Total Supply", "total_supply"),
    ("Market Cap", "market_cap"),
];

/// Dropped from the cleaned output.
pub const RANK_COLUMN: &str = "Rank";

pub const PRICE_COLUMN: &str = "current_price";
pub const SUPPLY_COLUMN: &str = "total_supply";
pub const OUTLIER_COLUMN: &str = "is_outlier";

/// Columns parsed with the currency rule.
pub const CURRENCY_COLUMNS: [&str; 4] = [
    "current_price",
    "24h_volume",
    "market_cap",
    "circulating_supply",
];

/// Percentage-point columns stored as fractions.
pub const PERCENTAGE_COLUMNS: [&str; 4] = ["1h", "24h", "7d", "30d"];

#[derive(Debug, Error)]
pub enum CleaningError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("column {column} has no observed values, median is undefined")]
    UndefinedMedian { column: String },
}

/// Which headers a historical file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoricalLayout {
    /// Source headers (`Rank`, `Price`, ...); percentages are in points.
    Raw,
    /// Output of an earlier cleaning pass; percentages are fractions.
    Cleaned,
}

impl HistoricalLayout {
    pub fn detect(df: &DataFrame) -> Self {
        let raw = has_column(df, RANK_COLUMN)
            || HISTORICAL_RENAMES.iter().any(|(from, _)| has_column(df, from));
        if raw {
            HistoricalLayout::Raw
        } else {
            HistoricalLayout::Cleaned
        }
    }
}

/// Result of a cleaning pass.
#[derive(Debug, Clone)]
pub struct CleanedHistorical {
    pub frame: DataFrame,
    pub layout: HistoricalLayout,
    /// `None` when flags were carried over or no price was observed.
    pub bounds: Option<IqrBounds>,
    pub outliers: usize,
    pub imputations: Vec<Imputation>,
}

/// Clean the historical frame.
///
/// Expects every column as read from CSV text. Accepts both raw source files
/// and previously cleaned output; re-cleaning cleaned output yields the same
/// values.
pub fn clean_historical(mut df: DataFrame) -> Result<CleanedHistorical, CleaningError> {
    let layout = HistoricalLayout::detect(&df);
    for (from, to) in HISTORICAL_RENAMES {
        if has_column(&df, from) {
            df.rename(from, to.into())?;
        }
    }
    if has_column(&df, RANK_COLUMN) {
        df = df.drop(RANK_COLUMN)?;
    }
    for name in CURRENCY_COLUMNS.iter().chain(&PERCENTAGE_COLUMNS) {
        require(&df, name)?;
    }
    require(&df, SUPPLY_COLUMN)?;

    let df = normalize::normalize(df, layout)?;
    let (df, bounds) = flag_price_outliers(df, layout)?;
    let outliers = df
        .column(OUTLIER_COLUMN)?
        .bool()?
        .into_iter()
        .filter(|flag| *flag == Some(true))
        .count();

    let (frame, imputations) = impute_median(df)?;

    Ok(CleanedHistorical {
        frame,
        layout,
        bounds,
        outliers,
        imputations,
    })
}

/// `"true"`/`"false"` in either case; anything else is missing.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        t if t.eq_ignore_ascii_case("true") => Some(true),
        f if f.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// An earlier pass's `is_outlier`, if every row carries a valid flag.
fn carried_flags(df: &DataFrame) -> PolarsResult<Option<Series>> {
    let Ok(existing) = df.column(OUTLIER_COLUMN) else {
        return Ok(None);
    };
    let text = existing.cast(&DataType::String)?;
    let flags: BooleanChunked = text
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_flag))
        .collect();
    if flags.null_count() > 0 {
        return Ok(None);
    }
    Ok(Some(flags.with_name(OUTLIER_COLUMN.into()).into_series()))
}

/// Add `is_outlier`, unless cleaned input already carries complete flags.
fn flag_price_outliers(
    mut df: DataFrame,
    layout: HistoricalLayout,
) -> Result<(DataFrame, Option<IqrBounds>), CleaningError> {
    if layout == HistoricalLayout::Cleaned {
        if let Some(flags) = carried_flags(&df)? {
            df.with_column(flags)?;
            return Ok((df, None));
        }
    }
    Ok(flag_outliers(df, PRICE_COLUMN, OUTLIER_COLUMN)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{column_names, read_csv_bytes, to_csv_bytes, CsvSchema};

    const HEADER: &str = "Rank, Coin Name, Symbol, Price, 24h Volume, Circulating Supply, Total Supply, Market Cap, 1h, 24h, 7d, 30d\n";

    fn raw(rows: &[&str]) -> DataFrame {
        let mut csv = HEADER.to_string();
        for row in rows {
            csv.push_str(row);
            csv.push('\n');
        }
        read_csv_bytes(csv, CsvSchema::Text).unwrap()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        df.column(name).unwrap().i64().unwrap().into_iter().collect()
    }

    fn flags(df: &DataFrame) -> Vec<Option<bool>> {
        df.column(OUTLIER_COLUMN).unwrap().bool().unwrap().into_iter().collect()
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|a| (a - expected).abs() < 1e-12)
    }

    #[test]
    fn single_bitcoin_row() {
        let df = raw(&[
            r#"1,Bitcoin,BTC,"$50,000","$1,000,000,000","19,000,000",21 Million,"$950,000,000,000",0.5%,2.1%,-1.0%,10.0%"#,
        ]);
        let cleaned = clean_historical(df).unwrap();
        let t = &cleaned.frame;

        assert_eq!(cleaned.layout, HistoricalLayout::Raw);
        assert_eq!(
            column_names(t),
            vec![
                "coin",
                "symbol",
                "current_price",
                "24h_volume",
                "circulating_supply",
                "total_supply",
                "market_cap",
                "1h",
                "24h",
                "7d",
                "30d",
                "is_outlier"
            ]
        );
        assert_eq!(floats(t, "current_price"), vec![Some(50_000.0)]);
        assert_eq!(floats(t, "24h_volume"), vec![Some(1e9)]);
        assert_eq!(floats(t, "circulating_supply"), vec![Some(19e6)]);
        assert_eq!(floats(t, "market_cap"), vec![Some(9.5e11)]);
        assert_eq!(ints(t, "total_supply"), vec![Some(21_000_000)]);
        assert!(close(floats(t, "24h")[0], 0.021));
        assert!(close(floats(t, "7d")[0], -0.01));
        assert_eq!(flags(t), vec![Some(false)]);
        assert_eq!(cleaned.outliers, 0);
        assert!(cleaned.imputations.is_empty());
    }

    #[test]
    fn raw_percentages_without_percent_sign_are_scaled() {
        let df = raw(&[
            "1,A,A,$10,$1,1,-,$1,0.5,2.1,1%,1%",
            "2,B,B,$12,$1,1,-,$1,0.1,-3.2,1%,1%",
        ]);
        let cleaned = clean_historical(df).unwrap();
        let day = floats(&cleaned.frame, "24h");
        assert!(close(day[0], 0.021));
        assert!(close(day[1], -0.032));
        assert!(close(floats(&cleaned.frame, "1h")[0], 0.005));
    }

    #[test]
    fn outliers_flagged_before_imputation() {
        let df = raw(&[
            "1,A,A,$10,$1,1,-,$1,1%,1%,1%,1%",
            "2,B,B,$12,$1,1,-,$1,1%,1%,1%,1%",
            "3,C,C,$11,$1,1,5 Million,$1,1%,1%,1%,1%",
            "4,D,D,$13,$1,1,-,$1,1%,1%,1%,1%",
            "5,E,E,\"$1,000\",$1,1,-,$1,1%,1%,1%,1%",
            "6,F,F,unknown,$1,1,-,$1,1%,1%,1%,1%",
        ]);
        let cleaned = clean_historical(df).unwrap();
        let t = &cleaned.frame;

        assert_eq!(
            flags(t),
            [false, false, false, false, true, true]
                .into_iter()
                .map(Some)
                .collect::<Vec<_>>()
        );
        assert_eq!(cleaned.outliers, 2);
        // Bounds come from the five observed prices only.
        let b = cleaned.bounds.unwrap();
        assert_eq!((b.lower, b.upper), (8.0, 16.0));

        // The missing price gets the median of observed prices afterwards.
        assert_eq!(floats(t, "current_price")[5], Some(12.0));
        assert_eq!(ints(t, "total_supply"), vec![Some(5_000_000); 6]);
        assert_eq!(t.height(), 6);
    }

    #[test]
    fn recleaning_cleaned_output_is_identical() {
        let df = raw(&[
            r#"1,Bitcoin,BTC,"$50,000","$1,000,000,000","19,000,000",21 Million,"$950,000,000,000",0.5%,2.1%,-1.0%,10.0%"#,
            r#"2,Ether,ETH,"$3,000",,"120,000,000",-,"$360,000,000,000",0.1%,-3.2%,5.5%,"#,
            r#"3,Doge,DOGE,,"$9,000",1.5 Billion,1.5 Billion,$1,bad,0%,0%,0%"#,
        ]);
        let mut first = clean_historical(df).unwrap().frame;

        let text = to_csv_bytes(&mut first).unwrap();
        let reread = read_csv_bytes(text, CsvSchema::Text).unwrap();
        let second = clean_historical(reread).unwrap();

        assert_eq!(second.layout, HistoricalLayout::Cleaned);
        assert!(second.bounds.is_none(), "complete flags are carried over");
        assert!(first.equals_missing(&second.frame));
    }

    #[test]
    fn incomplete_flags_are_recomputed() {
        let csv = "coin,symbol,current_price,24h_volume,circulating_supply,total_supply,market_cap,1h,24h,7d,30d,is_outlier\n\
                   A,A,10,1,1,1,1,0.01,0.01,0.01,0.01,true\n\
                   B,B,11,1,1,1,1,0.01,0.01,0.01,0.01,\n";
        let cleaned = clean_historical(read_csv_bytes(csv, CsvSchema::Text).unwrap()).unwrap();
        assert!(cleaned.bounds.is_some());
        assert_eq!(flags(&cleaned.frame), vec![Some(false), Some(false)]);
        assert!(close(floats(&cleaned.frame, "24h")[0], 0.01));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let df = read_csv_bytes("Rank,Coin Name\n1,Bitcoin\n", CsvSchema::Text).unwrap();
        let err = clean_historical(df).unwrap_err();
        assert!(matches!(
            err,
            CleaningError::Frame(FrameError::MissingColumn(c)) if c == "current_price"
        ));
    }
}
