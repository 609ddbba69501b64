//! CryptoTrend Runner: configuration, stage entry points, task graph,
//! scheduling, and data quality reports.
//!
//! This crate builds on `cryptotrend-core` to provide:
//! - Config resolution from the environment and TOML
//! - The five stage entry points and their file artifacts
//! - A dependency-aware task graph with skip-on-failure semantics
//! - A fixed-interval scheduler
//! - HTML dataset profiles

pub mod config;
pub mod pipeline;
pub mod reporting;
pub mod schedule;
pub mod stages;

pub use config::{ApiConfig, ConfigError, PipelineConfig, ScheduleConfig};
pub use pipeline::{GraphError, Pipeline, RunReport, StageId, StageOutcome, TaskGraph};
pub use reporting::{DatasetProfile, HtmlReportGenerator, ProfileMode};
pub use schedule::FixedInterval;
pub use stages::{
    classify_api_data, clean_historical_data, download_final_data, generate_data_quality_reports,
    ingest_api_data, ReportOutcome, StageError,
};
