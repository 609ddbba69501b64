//! CryptoTrend Core: tabular data, field cleaning, trend classification.
//!
//! This crate holds the pipeline's logic, free of scheduling and file layout:
//! - CSV read/write on polars `DataFrame`s
//! - Field normalizer (currency, percentage, magnitude-suffixed supply)
//! - IQR outlier flagger and median imputer
//! - Five-bucket 24h trend classifier
//! - Market-data provider trait and the CoinGecko implementation

pub mod classify;
pub mod cleaning;
pub mod data;
pub mod stats;

pub use classify::{classify_snapshot, classify_trend, ClassifiedRow, ClassifyError, TrendLabel};
pub use cleaning::{clean_historical, CleanedHistorical, CleaningError};
