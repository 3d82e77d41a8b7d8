//! Error types for data operations.

use albany_analytics::AnalyticsError;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while storing, fetching or reading data.
#[derive(Debug, Error)]
pub enum DataError {
    /// Yahoo Finance API error
    #[error("Yahoo Finance API error: {0}")]
    YahooApi(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Missing data
    #[error("Missing data for {symbol}: {reason}")]
    MissingData {
        /// Ticker, indicator or table that was queried
        symbol: String,
        /// Reason for missing data
        reason: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Time conversion error
    #[error("Time conversion error: {0}")]
    TimeConversion(String),

    /// Invalid symbol
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed indicator archive file
    #[error("Archive error in {file}: {reason}")]
    Archive {
        /// File or category the problem was found in
        file: String,
        /// What was wrong with it
        reason: String,
    },

    /// Upstream source could not deliver data for an entity
    #[error("Failed to fetch {entity}: {reason}")]
    UpstreamFetch {
        /// Ticker or indicator
        entity: String,
        /// Underlying failure
        reason: String,
    },

    /// Analytics error raised while preparing data
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

impl From<yahoo_finance_api::YahooError> for DataError {
    fn from(err: yahoo_finance_api::YahooError) -> Self {
        Self::YahooApi(err.to_string())
    }
}

impl DataError {
    /// Build a [`DataError::Archive`].
    pub fn archive(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Archive {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
