//! Export of Albany results.
//!
//! CSV and JSON export for return tables, rolling correlations, attribution
//! results and allocation tables.

use albany_analytics::{
    AssetAllocation, Attribution, FactorCoefficient, Month, PortfolioReturn, RollingCorrelation,
    WeightedReturn,
};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Serialize rows as CSV with a header line.
fn rows_to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn to_json<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(value)?),
        _ => Ok(serde_json::to_string(value)?),
    }
}

impl Exporter for [PortfolioReturn] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(self),
            _ => to_json(self, format),
        }
    }
}

impl Exporter for [WeightedReturn] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(self),
            _ => to_json(self, format),
        }
    }
}

impl Exporter for [AssetAllocation] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(self),
            _ => to_json(self, format),
        }
    }
}

/// One line of a rolling correlation CSV.
#[derive(Debug, Serialize)]
struct CorrelationRow {
    date: Month,
    window: usize,
    correlation: Option<f64>,
}

impl Exporter for RollingCorrelation {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(self.points.iter().map(|p| CorrelationRow {
                date: p.date,
                window: self.window,
                correlation: p.correlation,
            })),
            _ => to_json(self, format),
        }
    }
}

/// One line of an attribution CSV.
#[derive(Debug, Serialize)]
struct AttributionRow<'a> {
    factor_id: &'a str,
    region_id: &'a str,
    direction: &'static str,
    rank: Option<usize>,
    coefficient: Option<f64>,
}

fn attribution_rows(attribution: &Attribution) -> Vec<AttributionRow<'_>> {
    fn ranked<'a>(
        direction: &'static str,
        items: &'a [FactorCoefficient],
    ) -> impl Iterator<Item = AttributionRow<'a>> {
        items.iter().enumerate().map(move |(i, c)| AttributionRow {
            factor_id: &c.key.factor_id,
            region_id: &c.key.region_id,
            direction,
            rank: Some(i + 1),
            coefficient: Some(c.coefficient),
        })
    }

    ranked("positive", &attribution.positive)
        .chain(ranked("negative", &attribution.negative))
        .chain(attribution.dropped.iter().map(|key| AttributionRow {
            factor_id: &key.factor_id,
            region_id: &key.region_id,
            direction: "dropped",
            rank: None,
            coefficient: None,
        }))
        .collect()
}

impl Exporter for Attribution {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(attribution_rows(self)),
            _ => to_json(self, format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use albany_analytics::{CorrelationPoint, CorrelationSummary, FactorKey, MonthRange};
    use rstest::rstest;

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn sample_returns() -> Vec<PortfolioReturn> {
        vec![
            PortfolioReturn {
                portfolio_id: "PF_01".to_string(),
                date: month("2020-01"),
                price: Some(100.0),
                pct_return: None,
                log_return: None,
            },
            PortfolioReturn {
                portfolio_id: "PF_01".to_string(),
                date: month("2020-02"),
                price: Some(110.0),
                pct_return: Some(0.1),
                log_return: Some(0.0953),
            },
        ]
    }

    fn sample_attribution() -> Attribution {
        let gdp = FactorCoefficient {
            key: FactorKey::new("GDP", "USA"),
            coefficient: 0.8,
        };
        let cpi = FactorCoefficient {
            key: FactorKey::new("CPI", "USA"),
            coefficient: -0.3,
        };
        Attribution {
            window: MonthRange::new(month("2010-01"), month("2012-12")).unwrap(),
            alpha: 1.0,
            intercept: 0.01,
            observations: 35,
            coefficients: vec![cpi.clone(), gdp.clone()],
            positive: vec![gdp],
            negative: vec![cpi],
            dropped: vec![FactorKey::new("RATES", "USA")],
        }
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_parse_format(#[case] input: &str, #[case] expected: ExportFormat) {
        assert_eq!(input.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!("xlsx".parse::<ExportFormat>(), Err(ExportError::InvalidFormat(_))));
        assert_eq!(
            ExportFormat::from_path(Path::new("out/returns.JSON")).unwrap(),
            ExportFormat::Json
        );
    }

    #[test]
    fn test_export_returns_csv() {
        let csv = sample_returns().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "portfolio_id,date,price,pct_return,log_return");
        assert_eq!(lines[1], "PF_01,2020-01,100.0,,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_returns_json() {
        let json = sample_returns().export_to_string(ExportFormat::Json).unwrap();
        let parsed: Vec<PortfolioReturn> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_returns());
    }

    #[test]
    fn test_export_correlation_csv() {
        let rolling = RollingCorrelation {
            window: 12,
            points: vec![
                CorrelationPoint {
                    date: month("2020-12"),
                    correlation: Some(0.5),
                },
                CorrelationPoint {
                    date: month("2021-01"),
                    correlation: None,
                },
            ],
            summary: CorrelationSummary::from_values([Some(0.5), None]),
        };
        let csv = rolling.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("date,window,correlation\n"));
        assert!(csv.contains("2020-12,12,0.5\n"));
        assert!(csv.contains("2021-01,12,\n"));
    }

    #[test]
    fn test_export_attribution_csv() {
        let csv = sample_attribution().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "factor_id,region_id,direction,rank,coefficient");
        assert_eq!(lines[1], "GDP,USA,positive,1,0.8");
        assert_eq!(lines[2], "CPI,USA,negative,1,-0.3");
        assert_eq!(lines[3], "RATES,USA,dropped,,");
    }

    #[test]
    fn test_export_to_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        sample_attribution()
            .export_to_file(file.path(), ExportFormat::PrettyJson)
            .unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let parsed: Attribution = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, sample_attribution());
    }
}
