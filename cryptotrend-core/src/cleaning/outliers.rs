//! IQR outlier flagging on observed prices.

use polars::prelude::*;

/// Tukey fence multiplier.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Quartiles and fences computed from the observed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn from_quartiles(q1: f64, q3: f64) -> Self {
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            iqr,
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        }
    }

    /// Linear-interpolated quartiles of the non-missing prices. `None` when
    /// nothing is observed.
    pub fn from_prices(prices: &Float64Chunked) -> PolarsResult<Option<Self>> {
        let q1 = prices.quantile(0.25, QuantileMethod::Linear)?;
        let q3 = prices.quantile(0.75, QuantileMethod::Linear)?;
        Ok(match (q1, q3) {
            (Some(q1), Some(q3)) => Some(Self::from_quartiles(q1, q3)),
            _ => None,
        })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// True where `column` lies within the fences; null where it is missing.
    pub fn within(&self, column: &str) -> Expr {
        col(column).is_between(lit(self.lower), lit(self.upper), ClosedInterval::Both)
    }
}

/// Flag expression over a price column.
///
/// A missing price is never "within bounds", so it is flagged. With no
/// observed prices at all, every row is flagged.
pub fn outlier_flag(price_column: &str, bounds: Option<&IqrBounds>) -> Expr {
    match bounds {
        Some(b) => b.within(price_column).fill_null(lit(false)).not(),
        None => lit(true),
    }
}

/// Add `flag_column` computed from `price_column`, which must be `Float64`.
pub fn flag_outliers(
    df: DataFrame,
    price_column: &str,
    flag_column: &str,
) -> PolarsResult<(DataFrame, Option<IqrBounds>)> {
    let bounds = IqrBounds::from_prices(df.column(price_column)?.f64()?)?;
    let flagged = df
        .lazy()
        .with_column(outlier_flag(price_column, bounds.as_ref()).alias(flag_column))
        .collect()?;
    Ok((flagged, bounds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(values: &[Option<f64>]) -> DataFrame {
        df!("price" => values).unwrap()
    }

    fn flags(df: &DataFrame) -> Vec<Option<bool>> {
        df.column("flag").unwrap().bool().unwrap().into_iter().collect()
    }

    fn some(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    #[test]
    fn extreme_price_is_flagged() {
        let df = prices(&some(&[10.0, 12.0, 11.0, 13.0, 1000.0]));
        let (df, bounds) = flag_outliers(df, "price", "flag").unwrap();
        assert_eq!(
            flags(&df),
            vec![Some(false), Some(false), Some(false), Some(false), Some(true)]
        );

        let b = bounds.unwrap();
        assert_eq!((b.q1, b.q3, b.iqr), (11.0, 13.0, 2.0));
        assert_eq!((b.lower, b.upper), (8.0, 16.0));
    }

    #[test]
    fn fences_are_inclusive() {
        let df = prices(&some(&[8.0, 16.0, 16.000001]));
        let b = IqrBounds::from_quartiles(11.0, 13.0);
        let out = df
            .lazy()
            .select([outlier_flag("price", Some(&b)).alias("flag")])
            .collect()
            .unwrap();
        assert_eq!(flags(&out), vec![Some(false), Some(false), Some(true)]);
        assert!(b.contains(8.0));
        assert!(!b.contains(16.000001));
    }

    #[test]
    fn single_row_is_not_an_outlier() {
        let (df, bounds) = flag_outliers(prices(&[Some(50_000.0)]), "price", "flag").unwrap();
        assert_eq!(flags(&df), vec![Some(false)]);
        assert_eq!(bounds.unwrap().iqr, 0.0);
    }

    #[test]
    fn missing_prices_are_flagged_and_do_not_move_bounds() {
        let with_gap = prices(&[Some(10.0), None, Some(11.0), Some(12.0), Some(13.0)]);
        let (df, bounds) = flag_outliers(with_gap, "price", "flag").unwrap();
        assert_eq!(
            flags(&df),
            vec![Some(false), Some(true), Some(false), Some(false), Some(false)]
        );

        let plain = prices(&some(&[10.0, 11.0, 12.0, 13.0]));
        let expected = IqrBounds::from_prices(plain.column("price").unwrap().f64().unwrap()).unwrap();
        assert_eq!(bounds, expected);
    }

    #[test]
    fn all_missing_flags_everything() {
        let (df, bounds) = flag_outliers(prices(&[None, None]), "price", "flag").unwrap();
        assert_eq!(flags(&df), vec![Some(true), Some(true)]);
        assert!(bounds.is_none());
    }
}
