//! Report generation for Albany analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Required builder field was not set.
    #[error("Missing report field: {0}")]
    MissingField(&'static str),
}

/// A JSON report wrapping the output of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Kind of analysis (`returns`, `correlation`, `attribution`, ...).
    pub kind: String,

    /// Portfolio or factor the analysis is about.
    pub subject: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Analysis window, formatted `start..end`, when one applies.
    pub window: Option<String>,

    /// Report contents (JSON format).
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report stamped with the current time.
    pub fn new(kind: String, subject: String, window: Option<String>, contents: serde_json::Value) -> Self {
        Self {
            kind,
            subject,
            timestamp: Utc::now(),
            window,
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    kind: Option<String>,
    subject: Option<String>,
    window: Option<String>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the analysis kind.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the analysis window.
    pub fn window(mut self, window: impl ToString) -> Self {
        self.window = Some(window.to_string());
        self
    }

    /// Set the report contents from any serializable value.
    pub fn contents<T: Serialize + ?Sized>(mut self, contents: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(contents)?);
        Ok(self)
    }

    /// Build the report.
    pub fn build(self) -> Result<Report, ReportError> {
        Ok(Report::new(
            self.kind.ok_or(ReportError::MissingField("kind"))?,
            self.subject.unwrap_or_default(),
            self.window,
            self.contents.unwrap_or(serde_json::Value::Null),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_creation() {
        let report = Report::new(
            "returns".to_string(),
            "PF_01".to_string(),
            None,
            serde_json::json!({"test": "data"}),
        );

        assert_eq!(report.subject, "PF_01");
        assert!(report.window.is_none());
    }

    #[test]
    fn test_report_builder() {
        let report = ReportBuilder::new()
            .kind("correlation")
            .subject("NY.GDP.MKTP.KD.ZG/USA")
            .window("2010-01..2012-12")
            .contents(&[0.1, 0.2])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(report.kind, "correlation");
        assert_eq!(report.window.as_deref(), Some("2010-01..2012-12"));
        assert_eq!(report.contents, serde_json::json!([0.1, 0.2]));

        let json = report.to_json().unwrap();
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_builder_requires_kind() {
        let result = ReportBuilder::new().subject("PF_01").build();
        assert!(matches!(result, Err(ReportError::MissingField("kind"))));
    }
}
