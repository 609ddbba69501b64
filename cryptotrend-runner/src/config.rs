//! Pipeline configuration.
//!
//! Resolution order: the `CRYPTOTREND_HOME` environment variable (or the
//! default home) decides where the historical input, published outputs, and
//! reports live; an optional TOML file then overrides any field. Paths not set
//! in the file follow the file's `home` when it sets one.

use cryptotrend_core::data::MarketsQuery;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const HOME_ENV: &str = "CRYPTOTREND_HOME";
pub const DEFAULT_HOME: &str = "/usr/local/cryptotrend";
pub const HISTORICAL_FILE_NAME: &str = "CryptocurrencyData.csv";
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp";

pub const API_SNAPSHOT_FILE: &str = "api_cryptocurrency_data.csv";
pub const CLEANED_HISTORICAL_FILE: &str = "cleaned_cryptocurrency_data.csv";
pub const CLASSIFIED_FILE: &str = "final_classified_report.csv";
pub const API_REPORT_FILE: &str = "cryptos_api_report.html";
pub const FINAL_REPORT_FILE: &str = "cryptos_final_report.html";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Fully resolved configuration for one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Root for the historical input, published artifacts, and reports.
    pub home: PathBuf,
    /// Historical CSV snapshot.
    pub historical_input: PathBuf,
    /// Shared scratch location for intermediate artifacts.
    pub scratch_dir: PathBuf,
    /// Durable destination for timestamped artifacts.
    pub publish_dir: PathBuf,
    /// Destination for the HTML quality reports.
    pub reports_dir: PathBuf,
    pub api: ApiConfig,
    pub schedule: ScheduleConfig,
}

/// Live market-data endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub vs_currency: String,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let query = MarketsQuery::default();
        Self {
            base_url: cryptotrend_core::data::coingecko::DEFAULT_BASE_URL.to_string(),
            vs_currency: query.vs_currency,
            order: query.order,
            per_page: query.per_page,
            page: query.page,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    pub interval_hours: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_hours: 6 }
    }
}

/// On-disk shape: every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    home: Option<PathBuf>,
    historical_input: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    publish_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    #[serde(default)]
    api: ApiOverrides,
    #[serde(default)]
    schedule: ScheduleOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApiOverrides {
    base_url: Option<String>,
    vs_currency: Option<String>,
    order: Option<String>,
    per_page: Option<u32>,
    page: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleOverrides {
    interval_hours: Option<u32>,
}

impl PipelineConfig {
    /// Defaults derived from a home directory.
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            historical_input: home.join("include").join(HISTORICAL_FILE_NAME),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            publish_dir: home.join("include"),
            reports_dir: home.join("reports"),
            api: ApiConfig::default(),
            schedule: ScheduleConfig::default(),
            home,
        }
    }

    /// Home from `CRYPTOTREND_HOME`, falling back to the default path.
    pub fn env_home() -> PathBuf {
        std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME))
    }

    pub fn from_env() -> Self {
        Self::from_home(Self::env_home())
    }

    /// Parse TOML overrides on top of the defaults for `default_home`.
    pub fn from_toml_with_home(content: &str, default_home: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;

        let mut config = Self::from_home(file.home.unwrap_or_else(|| default_home.to_path_buf()));
        if let Some(p) = file.historical_input {
            config.historical_input = p;
        }
        if let Some(p) = file.scratch_dir {
            config.scratch_dir = p;
        }
        if let Some(p) = file.publish_dir {
            config.publish_dir = p;
        }
        if let Some(p) = file.reports_dir {
            config.reports_dir = p;
        }

        let api = file.api;
        if let Some(v) = api.base_url {
            config.api.base_url = v;
        }
        if let Some(v) = api.vs_currency {
            config.api.vs_currency = v;
        }
        if let Some(v) = api.order {
            config.api.order = v;
        }
        if let Some(v) = api.per_page {
            config.api.per_page = v;
        }
        if let Some(v) = api.page {
            config.api.page = v;
        }
        if let Some(v) = api.timeout_secs {
            config.api.timeout_secs = v;
        }
        if let Some(v) = file.schedule.interval_hours {
            config.schedule.interval_hours = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::from_toml_with_home(content, &Self::env_home())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Config file if given, environment defaults otherwise.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::from_env()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.per_page == 0 || self.api.per_page > 250 {
            return Err(ConfigError::Invalid(format!(
                "api.per_page must be in 1..=250, got {}",
                self.api.per_page
            )));
        }
        if self.api.page == 0 {
            return Err(ConfigError::Invalid("api.page starts at 1".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
        }
        if self.schedule.interval_hours == 0 {
            return Err(ConfigError::Invalid(
                "schedule.interval_hours must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn api_snapshot_path(&self) -> PathBuf {
        self.scratch_dir.join(API_SNAPSHOT_FILE)
    }

    pub fn cleaned_historical_path(&self) -> PathBuf {
        self.scratch_dir.join(CLEANED_HISTORICAL_FILE)
    }

    pub fn classified_path(&self) -> PathBuf {
        self.scratch_dir.join(CLASSIFIED_FILE)
    }

    pub fn api_report_path(&self) -> PathBuf {
        self.reports_dir.join(API_REPORT_FILE)
    }

    pub fn final_report_path(&self) -> PathBuf {
        self.reports_dir.join(FINAL_REPORT_FILE)
    }

    pub fn markets_query(&self) -> MarketsQuery {
        MarketsQuery {
            vs_currency: self.api.vs_currency.clone(),
            order: self.api.order.clone(),
            per_page: self.api.per_page,
            page: self.api.page,
            sparkline: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_home() {
        let config = PipelineConfig::from_home("/srv/crypto");
        assert_eq!(
            config.historical_input,
            PathBuf::from("/srv/crypto/include/CryptocurrencyData.csv")
        );
        assert_eq!(config.publish_dir, PathBuf::from("/srv/crypto/include"));
        assert_eq!(config.reports_dir, PathBuf::from("/srv/crypto/reports"));
        assert_eq!(
            config.classified_path(),
            PathBuf::from("/tmp/final_classified_report.csv")
        );
        assert_eq!(config.schedule.interval_hours, 6);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.markets_query(), MarketsQuery::default());
    }

    #[test]
    fn file_home_moves_derived_paths() {
        let config = PipelineConfig::from_toml_with_home(
            "home = \"/data/ct\"\nscratch_dir = \"/data/scratch\"\n",
            Path::new("/unused"),
        )
        .unwrap();
        assert_eq!(config.publish_dir, PathBuf::from("/data/ct/include"));
        assert_eq!(
            config.api_snapshot_path(),
            PathBuf::from("/data/scratch/api_cryptocurrency_data.csv")
        );
    }

    #[test]
    fn nested_overrides() {
        let toml = r#"
reports_dir = "/var/reports"

[api]
base_url = "http://127.0.0.1:8080/api/v3"
per_page = 50

[schedule]
interval_hours = 12
"#;
        let config = PipelineConfig::from_toml_with_home(toml, Path::new("/h")).unwrap();
        assert_eq!(config.home, PathBuf::from("/h"));
        assert_eq!(config.reports_dir, PathBuf::from("/var/reports"));
        assert_eq!(config.api.base_url, "http://127.0.0.1:8080/api/v3");
        assert_eq!(config.api.per_page, 50);
        assert_eq!(config.api.vs_currency, "usd");
        assert_eq!(config.schedule.interval_hours, 12);
    }

    #[test]
    fn unknown_keys_and_bad_values_rejected() {
        let err = PipelineConfig::from_toml_with_home("hme = \"/x\"", Path::new("/h")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = PipelineConfig::from_toml_with_home("[schedule]\ninterval_hours = 0", Path::new("/h"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn renders_back_to_equivalent_toml() {
        let config = PipelineConfig::from_home("/srv/crypto");
        let rendered = config.to_toml().unwrap();
        let back = PipelineConfig::from_toml_with_home(&rendered, Path::new("/other")).unwrap();
        assert_eq!(back, config);
    }
}
