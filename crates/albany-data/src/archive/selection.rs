//! Indicator selection file.

use crate::error::{DataError, Result};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

const CODE_COLUMN: &str = "INDICATOR_CODE";
const FLAG_COLUMN: &str = "Selected for analysis (Y/N)";

/// Set of indicator codes chosen for ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorSelection {
    codes: BTreeSet<String>,
}

impl IndicatorSelection {
    /// Read a selection CSV from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file).map_err(|e| match e {
            DataError::Csv(inner) => {
                DataError::archive(path.as_ref().display().to_string(), inner.to_string())
            }
            other => other,
        })
    }

    /// Read a selection CSV; rows flagged `Y` are selected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv.headers()?.clone();
        let code = header_index(&headers, CODE_COLUMN, "indicator selection")?;
        let flag = header_index(&headers, FLAG_COLUMN, "indicator selection")?;

        let mut codes = BTreeSet::new();
        for record in csv.records() {
            let record = record?;
            let selected = record
                .get(flag)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("Y"));
            if selected && let Some(id) = record.get(code).map(str::trim).filter(|c| !c.is_empty()) {
                codes.insert(id.to_string());
            }
        }

        Ok(Self { codes })
    }

    /// Select an explicit list of codes.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `code` is selected.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Selected codes, sorted.
    pub const fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    /// Number of selected codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Position of a named column, ignoring a leading byte-order mark and padding.
pub(crate) fn header_index(headers: &csv::StringRecord, name: &str, file: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        .ok_or_else(|| DataError::archive(file, format!("missing column '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_filters_on_flag() {
        let csv = "\u{feff}INDICATOR_CODE,INDICATOR_NAME,Selected for analysis (Y/N)\n\
                   NY.GDP.MKTP.KD.ZG,GDP growth (annual %),Y\n\
                   FP.CPI.TOTL.ZG,\"Inflation, consumer prices (annual %)\",y\n\
                   SL.UEM.TOTL.ZS,Unemployment,N\n\
                   BN.CAB.XOKA.GD.ZS,Current account balance,\n";
        let selection = IndicatorSelection::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(selection.len(), 2);
        assert!(selection.contains("NY.GDP.MKTP.KD.ZG"));
        assert!(selection.contains("FP.CPI.TOTL.ZG"));
        assert!(!selection.contains("SL.UEM.TOTL.ZS"));
    }

    #[test]
    fn test_missing_flag_column() {
        let csv = "INDICATOR_CODE,INDICATOR_NAME\nNY.GDP.MKTP.KD.ZG,GDP growth\n";
        let result = IndicatorSelection::from_reader(csv.as_bytes());
        assert!(matches!(result, Err(DataError::Archive { .. })));
    }
}
