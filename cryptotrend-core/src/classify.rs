//! Rule-based 24h trend classification.

use crate::data::provider::MarketSnapshotRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A move of at least this fraction is a strong trend.
pub const STRONG_THRESHOLD: f64 = 0.05;
/// A move beyond this fraction (exclusive) is a moderate trend.
pub const MODERATE_THRESHOLD: f64 = 0.01;

/// Five-bucket trend label. Serialized with the dashboard's label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendLabel {
    #[serde(rename = "TENDENCIA FUERTE ALCISTA")]
    StrongUptrend,
    #[serde(rename = "TENDENCIA MODERADA ALCISTA")]
    ModerateUptrend,
    #[serde(rename = "TENDENCIA FUERTE BAJISTA")]
    StrongDowntrend,
    #[serde(rename = "TENDENCIA MODERADA BAJISTA")]
    ModerateDowntrend,
    #[serde(rename = "TENDENCIA ESTABLE")]
    Stable,
}

impl TrendLabel {
    pub const ALL: [TrendLabel; 5] = [
        TrendLabel::StrongUptrend,
        TrendLabel::ModerateUptrend,
        TrendLabel::StrongDowntrend,
        TrendLabel::ModerateDowntrend,
        TrendLabel::Stable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::StrongUptrend => "TENDENCIA FUERTE ALCISTA",
            TrendLabel::ModerateUptrend => "TENDENCIA MODERADA ALCISTA",
            TrendLabel::StrongDowntrend => "TENDENCIA FUERTE BAJISTA",
            TrendLabel::ModerateDowntrend => "TENDENCIA MODERADA BAJISTA",
            TrendLabel::Stable => "TENDENCIA ESTABLE",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a 24h change given in percentage points (`5.2` means 5.2%).
///
/// Checked top to bottom: strong up (≥ 5%), moderate up (> 1%), strong down
/// (≤ −5%), moderate down (< −1%), otherwise stable. `None` for NaN/infinite
/// input, which callers must treat as an error.
pub fn classify_trend(price_change_pct_24h: f64) -> Option<TrendLabel> {
    if !price_change_pct_24h.is_finite() {
        return None;
    }
    let p = price_change_pct_24h / 100.0;

    let label = if p >= STRONG_THRESHOLD {
        TrendLabel::StrongUptrend
    } else if p > MODERATE_THRESHOLD {
        TrendLabel::ModerateUptrend
    } else if p <= -STRONG_THRESHOLD {
        TrendLabel::StrongDowntrend
    } else if p < -MODERATE_THRESHOLD {
        TrendLabel::ModerateDowntrend
    } else {
        TrendLabel::Stable
    };
    Some(label)
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("row {row} ({symbol}): price_change_percentage_24h is missing")]
    MissingPriceChange { row: usize, symbol: String },

    #[error("row {row} ({symbol}): price_change_percentage_24h is not finite ({value})")]
    NonFinite {
        row: usize,
        symbol: String,
        value: f64,
    },
}

/// A snapshot row with its trend label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub symbol: String,
    pub current_price: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub trend_classification: TrendLabel,
}

impl ClassifiedRow {
    pub fn new(row: MarketSnapshotRow, trend_classification: TrendLabel) -> Self {
        Self {
            symbol: row.symbol,
            current_price: row.current_price,
            price_change_percentage_24h: row.price_change_percentage_24h,
            market_cap: row.market_cap,
            total_volume: row.total_volume,
            high_24h: row.high_24h,
            low_24h: row.low_24h,
            trend_classification,
        }
    }
}

/// Label every row. The first row without a usable 24h change fails the batch.
pub fn classify_snapshot(
    rows: Vec<MarketSnapshotRow>,
) -> Result<Vec<ClassifiedRow>, ClassifyError> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let value = row.price_change_percentage_24h.ok_or_else(|| {
                ClassifyError::MissingPriceChange {
                    row: i,
                    symbol: row.symbol.clone(),
                }
            })?;
            let label = classify_trend(value).ok_or_else(|| ClassifyError::NonFinite {
                row: i,
                symbol: row.symbol.clone(),
                value,
            })?;
            Ok(ClassifiedRow::new(row, label))
        })
        .collect()
}
