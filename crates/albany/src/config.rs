//! Workspace configuration.

use crate::error::{AlbanyError, Result};
use albany_analytics::correlation::MAX_WINDOW;
use albany_analytics::{AttributionConfig, MonthRange};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default tracked indices.
pub const DEFAULT_TICKERS: [&str; 6] = ["^GSPC", "^FTSE", "^BSESN", "^NSEI", "^MXX", "^N225"];

/// Get the default data directory.
///
/// Uses platform-specific data directories:
/// - Linux: `~/.local/share/albany/`
/// - macOS: `~/Library/Application Support/albany/`
/// - Windows: `%APPDATA%\albany\`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("albany")
}

/// Get the default database path.
pub fn default_database_path() -> PathBuf {
    default_data_dir().join("albany.db")
}

/// Configuration for ingestion and analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlbanyConfig {
    /// SQLite database file
    pub database: PathBuf,
    /// Directory holding one subdirectory per indicator category
    pub archive_dir: PathBuf,
    /// CSV choosing which indicators are ingested
    pub selection_file: PathBuf,
    /// Tickers fetched by price ingestion
    pub tickers: Vec<String>,
    /// First day of the ingestion range (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the ingestion range (inclusive)
    pub end_date: NaiveDate,
    /// Portfolio created on first run
    pub portfolio_id: String,
    /// Name of the portfolio created on first run
    pub portfolio_name: String,
    /// Trailing window of the rolling correlation, in months
    pub correlation_window: usize,
    /// Default attribution window
    pub attribution_window: MonthRange,
    /// Ridge fit settings
    pub attribution: AttributionConfig,
    /// Concurrent market data requests
    pub fetch_concurrency: usize,
    /// Delay after each market data request, in milliseconds
    pub rate_limit_ms: u64,
}

impl Default for AlbanyConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            archive_dir: PathBuf::from("data"),
            selection_file: PathBuf::from("config/selected_macroeconomic_indicators.csv"),
            tickers: DEFAULT_TICKERS.iter().map(|t| (*t).to_string()).collect(),
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap_or_default(),
            portfolio_id: "PF_01".to_string(),
            portfolio_name: "Portfolio_01".to_string(),
            correlation_window: 12,
            attribution_window: MonthRange::years(2010, 2012),
            attribution: AttributionConfig::default(),
            fetch_concurrency: 4,
            rate_limit_ms: 1000,
        }
    }
}

impl AlbanyConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Write the configuration as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Months covered by the ingestion range.
    pub fn ingestion_range(&self) -> Result<MonthRange> {
        Ok(MonthRange::from_dates(self.start_date, self.end_date)?)
    }

    /// Check ranges, windows and counts.
    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(AlbanyError::Config(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.attribution_window.start() > self.attribution_window.end() {
            return Err(AlbanyError::Config(format!(
                "attribution_window {} is inverted",
                self.attribution_window
            )));
        }
        if !(1..=MAX_WINDOW).contains(&self.correlation_window) {
            return Err(AlbanyError::Config(format!(
                "correlation_window must be between 1 and {MAX_WINDOW}, got {}",
                self.correlation_window
            )));
        }
        if self.attribution.alphas.is_empty()
            || self.attribution.alphas.iter().any(|a| !a.is_finite() || *a <= 0.0)
        {
            return Err(AlbanyError::Config(
                "attribution.alphas must be a non-empty list of positive numbers".to_string(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(AlbanyError::Config("fetch_concurrency must be at least 1".to_string()));
        }
        if self.portfolio_id.trim().is_empty() {
            return Err(AlbanyError::Config("portfolio_id must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = AlbanyConfig::default();
        assert_eq!(config.tickers.len(), 6);
        assert_eq!(config.tickers[0], "^GSPC");
        assert_eq!(config.attribution_window.to_string(), "2010-01..2012-12");
        assert_eq!(config.ingestion_range().unwrap().len(), 294);
        assert_eq!(config.attribution.alphas, vec![0.1, 1.0, 10.0]);
        assert!(config.database.ends_with("albany.db"));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"tickers": ["^GSPC"], "correlation_window": 6,
                       "attribution_window": {"start": "2015-01", "end": "2016-12"}}"#;
        let config: AlbanyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tickers, vec!["^GSPC".to_string()]);
        assert_eq!(config.correlation_window, 6);
        assert_eq!(config.attribution_window.len(), 24);
        assert_eq!(config.portfolio_id, "PF_01");
    }

    #[rstest]
    #[case(r#"{"start_date": "2025-01-01"}"#)]
    #[case(r#"{"correlation_window": 0}"#)]
    #[case(r#"{"correlation_window": 61}"#)]
    #[case(r#"{"attribution": {"alphas": []}}"#)]
    #[case(r#"{"attribution": {"alphas": [1.0, -0.5]}}"#)]
    #[case(r#"{"fetch_concurrency": 0}"#)]
    #[case(r#"{"attribution_window": {"start": "2013-01", "end": "2012-12"}}"#)]
    fn test_validate_rejects(#[case] json: &str) {
        let config: AlbanyConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(AlbanyError::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path();
        let config = AlbanyConfig {
            correlation_window: 24,
            ..AlbanyConfig::default()
        };
        config.save(path).unwrap();
        assert_eq!(AlbanyConfig::load(path).unwrap(), config);
    }
}
