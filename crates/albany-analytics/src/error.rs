//! Error types for the analytics core.

use thiserror::Error;

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors raised by the normalization, return, correlation and attribution engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Not enough observations to interpolate, correlate or regress
    #[error("Insufficient data for {entity}: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Asset, factor key or window the data belongs to
        entity: String,
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Target and predictor series share no dates
    #[error("Cannot align {target} with {predictors}: date ranges are disjoint")]
    Alignment {
        /// Description of the target series range
        target: String,
        /// Description of the predictor series range
        predictors: String,
    },

    /// A portfolio's weights sum to zero
    #[error("Portfolio {portfolio_id} has zero total weight; weights left at zero")]
    DegenerateWeight {
        /// Portfolio whose weights could not be normalized
        portfolio_id: String,
    },

    /// Rolling window outside the supported range
    #[error("Invalid window: {window} (must be between 1 and {max})")]
    InvalidWindow {
        /// Requested window
        window: usize,
        /// Largest supported window
        max: usize,
    },

    /// Malformed month label
    #[error("Invalid month: {0} (expected YYYY-MM)")]
    InvalidMonth(String),

    /// Malformed input table
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AnalyticsError {
    /// Build an [`AnalyticsError::InsufficientData`] for an entity.
    pub fn insufficient(entity: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            entity: entity.into(),
            required,
            actual,
        }
    }
}
