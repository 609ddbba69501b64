//! CSV frames, atomic writes, and market-data providers.

pub mod atomic;
pub mod coingecko;
pub mod frame;
pub mod provider;

pub use atomic::write_atomic;
pub use coingecko::CoinGeckoProvider;
pub use frame::{read_csv, read_csv_bytes, write_csv, CsvSchema, FrameError};
pub use provider::{FetchError, MarketDataProvider, MarketSnapshotRow, MarketsQuery};
