//! Error types for the Albany workspace.

use albany_analytics::AnalyticsError;
use albany_data::DataError;
use albany_output::{ExportError, ReportError};
use thiserror::Error;

/// Result type for Albany operations.
pub type Result<T> = std::result::Result<T, AlbanyError>;

/// Errors surfaced by ingestion and analysis.
#[derive(Debug, Error)]
pub enum AlbanyError {
    /// Computation failure
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// Store, provider or archive failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Export failure
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Report failure
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown portfolio, asset or factor
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of entity
        kind: &'static str,
        /// Identifier that was looked up
        id: String,
    },
}

impl AlbanyError {
    /// Build an [`AlbanyError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
