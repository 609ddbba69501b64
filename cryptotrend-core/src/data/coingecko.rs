//! CoinGecko markets provider.
//!
//! Fetches the top assets by market capitalization from the public
//! `/coins/markets` endpoint. One request per call, bounded by the client
//! timeout; there is no retry.

use super::provider::{FetchError, MarketDataProvider, MarketSnapshotRow, MarketsQuery};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry of the markets response. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct MarketEntry {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    total_volume: Option<f64>,
    #[serde(default)]
    high_24h: Option<f64>,
    #[serde(default)]
    low_24h: Option<f64>,
}

impl MarketEntry {
    fn into_row(self) -> Option<MarketSnapshotRow> {
        Some(MarketSnapshotRow {
            symbol: self.symbol.filter(|s| !s.trim().is_empty())?,
            current_price: self.current_price,
            price_change_percentage_24h: self.price_change_percentage_24h,
            market_cap: self.market_cap,
            total_volume: self.total_volume,
            high_24h: self.high_24h,
            low_24h: self.low_24h,
        })
    }
}

/// CoinGecko data provider.
pub struct CoinGeckoProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    query: MarketsQuery,
}

impl CoinGeckoProvider {
    pub fn new(
        base_url: impl Into<String>,
        query: MarketsQuery,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cryptotrend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            query,
        })
    }

    /// Provider against the public endpoint with the default query.
    pub fn public() -> Result<Self, FetchError> {
        Self::new(DEFAULT_BASE_URL, MarketsQuery::default(), DEFAULT_TIMEOUT)
    }

    pub fn query(&self) -> &MarketsQuery {
        &self.query
    }

    /// `{base_url}/coins/markets`, tolerant of a trailing slash on the base.
    pub fn markets_url(&self) -> String {
        format!("{}/coins/markets", self.base_url.trim_end_matches('/'))
    }

    /// Parse the endpoint's JSON array, keeping only the snapshot fields.
    ///
    /// Entries without a symbol are dropped; the rest of the page is kept.
    pub fn parse_markets(body: &str) -> Result<Vec<MarketSnapshotRow>, FetchError> {
        let entries: Vec<MarketEntry> = serde_json::from_str(body).map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse markets response: {e}"))
        })?;
        let total = entries.len();
        let rows: Vec<MarketSnapshotRow> =
            entries.into_iter().filter_map(MarketEntry::into_row).collect();
        if rows.len() < total {
            warn!(
                skipped = total - rows.len(),
                kept = rows.len(),
                "dropped market entries without a symbol"
            );
        }
        Ok(rows)
    }
}

impl MarketDataProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch_markets(&self) -> Result<Vec<MarketSnapshotRow>, FetchError> {
        let url = self.markets_url();
        let resp = self
            .client
            .get(&url)
            .query(&self.query.pairs())
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::NetworkUnreachable(format!("reading body: {e}")))?;
        Self::parse_markets(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    const SAMPLE: &str = r#"[
        {
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 67012.5,
            "market_cap": 1320000000000,
            "total_volume": 28000000000,
            "high_24h": 68000,
            "low_24h": 66000.25,
            "price_change_percentage_24h": 2.31,
            "roi": null
        },
        {
            "id": "newcoin",
            "symbol": "new",
            "current_price": 0.01,
            "market_cap": null,
            "total_volume": 10,
            "high_24h": null,
            "low_24h": null,
            "price_change_percentage_24h": null
        }
    ]"#;

    #[test]
    fn parses_only_snapshot_fields() {
        let rows = CoinGeckoProvider::parse_markets(SAMPLE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "btc");
        assert_eq!(rows[0].current_price, Some(67012.5));
        assert_eq!(rows[0].market_cap, Some(1.32e12));
        assert_eq!(rows[0].price_change_percentage_24h, Some(2.31));
        assert_eq!(rows[1].market_cap, None);
        assert_eq!(rows[1].price_change_percentage_24h, None);
    }

    #[test]
    fn entries_without_symbol_are_dropped() {
        let body = r#"[
            {"symbol": "btc", "current_price": 1.0},
            {"symbol": null, "current_price": 2.0},
            {"current_price": 3.0},
            {"symbol": "  ", "current_price": 4.0},
            {"symbol": "eth", "current_price": null}
        ]"#;
        let rows = CoinGeckoProvider::parse_markets(body).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["btc", "eth"]);
        assert_eq!(rows[1].current_price, None);
    }

    #[test]
    fn mistyped_field_is_still_a_format_change() {
        let body = r#"[{"symbol": "btc", "current_price": "high"}]"#;
        let err = CoinGeckoProvider::parse_markets(body).unwrap_err();
        assert!(matches!(err, FetchError::ResponseFormatChanged(_)));
    }

    #[test]
    fn error_status_is_reported_with_code() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            stream
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
        });

        let provider = CoinGeckoProvider::new(
            format!("http://{addr}"),
            MarketsQuery::default(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = provider.fetch_markets().unwrap_err();
        server.join().unwrap();

        match err {
            FetchError::HttpStatus { status, url } => {
                assert_eq!(status, 500);
                assert_eq!(url, format!("http://{addr}/coins/markets"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_object_is_a_format_change() {
        let body = r#"{"status":{"error_code":429,"error_message":"rate limited"}}"#;
        let err = CoinGeckoProvider::parse_markets(body).unwrap_err();
        assert!(matches!(err, FetchError::ResponseFormatChanged(_)));
    }

    #[test]
    fn markets_url_trims_trailing_slash() {
        let provider = CoinGeckoProvider::new(
            "http://localhost:9/api/v3/",
            MarketsQuery::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(provider.markets_url(), "http://localhost:9/api/v3/coins/markets");
    }

    #[test]
    fn unreachable_host_is_a_network_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let provider = CoinGeckoProvider::new(
            "http://127.0.0.1:9",
            MarketsQuery::default(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = provider.fetch_markets().unwrap_err();
        assert!(matches!(err, FetchError::NetworkUnreachable(_)));
    }
}
