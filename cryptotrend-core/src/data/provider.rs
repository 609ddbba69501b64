//! Market-data provider trait, snapshot row type, and structured fetch errors.
//!
//! The provider trait abstracts over the live source so the pipeline can be
//! driven by a fake provider in tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One asset's live metrics, as captured once per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshotRow {
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
}

/// Column order of the snapshot artifact.
pub const SNAPSHOT_COLUMNS: [&str; 7] = [
    "symbol",
    "current_price",
    "price_change_percentage_24h",
    "market_cap",
    "total_volume",
    "high_24h",
    "low_24h",
];

/// Query parameters for the markets endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketsQuery {
    pub vs_currency: String,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub sparkline: bool,
}

impl Default for MarketsQuery {
    fn default() -> Self {
        Self {
            vs_currency: "usd".into(),
            order: "market_cap_desc".into(),
            per_page: 100,
            page: 1,
            sparkline: false,
        }
    }
}

impl MarketsQuery {
    /// Query-string pairs in the order the endpoint documents them.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.vs_currency.clone()),
            ("order", self.order.clone()),
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
            ("sparkline", self.sparkline.to_string()),
        ]
    }
}

/// Structured error types for live fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// A source of live market snapshots.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the current snapshot. An empty `Ok` is possible; callers decide
    /// whether that is acceptable.
    fn fetch_markets(&self) -> Result<Vec<MarketSnapshotRow>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_matches_endpoint_contract() {
        let pairs = MarketsQuery::default().pairs();
        assert_eq!(
            pairs,
            vec![
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", "100".to_string()),
                ("page", "1".to_string()),
                ("sparkline", "false".to_string()),
            ]
        );
    }

    #[test]
    fn snapshot_csv_header_order() {
        let row = MarketSnapshotRow {
            symbol: "btc".into(),
            current_price: Some(50000.0),
            price_change_percentage_24h: None,
            market_cap: Some(1.0),
            total_volume: Some(2.0),
            high_24h: Some(3.0),
            low_24h: Some(4.0),
        };
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(&row).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, SNAPSHOT_COLUMNS.join(","));
        assert!(text.lines().nth(1).unwrap().starts_with("btc,50000.0,,"));
    }
}
