//! One indicator category bundle.
//!
//! A bundle holds three CSV files:
//!
//! - `Metadata_Indicator_*.csv` with `INDICATOR_CODE` and `INDICATOR_NAME`
//! - `Metadata_Country_*.csv` with `Country Code` and `TableName`
//! - the data file: a short preamble, then one row per country × indicator
//!   with one column per year

use super::selection::header_index;
use crate::error::{DataError, Result};
use albany_analytics::normalize::interpolate_yearly;
use albany_analytics::{Factor, FactorObservation, MonthRange, Region};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Yearly values of one indicator in one region.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    /// Indicator code
    pub factor_id: String,
    /// Country or aggregate code
    pub region_id: String,
    /// `(year, value)` pairs; `None` for blank cells
    pub values: Vec<(i32, Option<f64>)>,
}

impl IndicatorSeries {
    /// Interpolate onto the monthly grid within `range`.
    pub fn monthly(&self, range: &MonthRange) -> Result<Vec<FactorObservation>> {
        let entity = format!("{}/{}", self.factor_id, self.region_id);
        let monthly = interpolate_yearly(&entity, &self.values, range)?;
        Ok(monthly
            .into_iter()
            .map(|(date, value)| FactorObservation {
                factor_id: self.factor_id.clone(),
                region_id: self.region_id.clone(),
                date,
                value,
            })
            .collect())
    }

    /// Number of non-blank yearly values.
    pub fn observed_years(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// Parsed contents of one category bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveCategory {
    /// Category name (the bundle's directory name)
    pub name: String,
    /// Indicators described by the bundle
    pub indicators: Vec<Factor>,
    /// Regions described by the bundle
    pub regions: Vec<Region>,
    /// Yearly data rows
    pub series: Vec<IndicatorSeries>,
}

impl ArchiveCategory {
    /// Load a bundle directory.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut indicator_file = None;
        let mut country_file = None;
        let mut data_file = None;

        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        entries.sort();

        for path in entries {
            let lower = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if lower.contains("metadata_indicator") {
                indicator_file = Some(path);
            } else if lower.contains("metadata_country") {
                country_file = Some(path);
            } else if data_file.is_none() {
                data_file = Some(path);
            }
        }

        let missing = |what: &str| DataError::archive(dir.display().to_string(), format!("no {what} file"));
        let indicator_file = indicator_file.ok_or_else(|| missing("indicator metadata"))?;
        let country_file = country_file.ok_or_else(|| missing("country metadata"))?;
        let data_file = data_file.ok_or_else(|| missing("indicator data"))?;

        debug!(category = %name, data = %data_file.display(), "loading archive category");

        Self::from_readers(
            name,
            std::fs::File::open(&indicator_file)?,
            std::fs::File::open(&country_file)?,
            std::fs::File::open(&data_file)?,
        )
    }

    /// Parse a bundle from its three readers.
    pub fn from_readers<I: Read, C: Read, D: Read>(
        name: impl Into<String>,
        indicators: I,
        countries: C,
        data: D,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            indicators: parse_indicators(indicators)?,
            regions: parse_regions(countries)?,
            series: parse_data(data)?,
        })
    }
}

fn parse_indicators<R: Read>(reader: R) -> Result<Vec<Factor>> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv.headers()?.clone();
    let code = header_index(&headers, "INDICATOR_CODE", "indicator metadata")?;
    let label = header_index(&headers, "INDICATOR_NAME", "indicator metadata")?;

    let mut out = Vec::new();
    for record in csv.records() {
        let record = record?;
        let Some(factor_id) = record.get(code).map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        out.push(Factor {
            factor_id: factor_id.to_string(),
            factor_name: record.get(label).unwrap_or_default().trim().to_string(),
        });
    }
    Ok(out)
}

fn parse_regions<R: Read>(reader: R) -> Result<Vec<Region>> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv.headers()?.clone();
    let code = header_index(&headers, "Country Code", "country metadata")?;
    let label = header_index(&headers, "TableName", "country metadata")?;

    let mut out = Vec::new();
    for record in csv.records() {
        let record = record?;
        let Some(region_id) = record.get(code).map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        out.push(Region {
            region_id: region_id.to_string(),
            region_name: record.get(label).unwrap_or_default().trim().to_string(),
        });
    }
    Ok(out)
}

fn parse_data<R: Read>(mut reader: R) -> Result<Vec<IndicatorSeries>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    // skip the preamble up to the header row
    let header_offset = text
        .match_indices('\n')
        .map(|(i, _)| i + 1)
        .chain(std::iter::once(0))
        .filter(|&start| {
            text[start..]
                .trim_start_matches('\u{feff}')
                .trim_start_matches('"')
                .starts_with("Country Name")
        })
        .min()
        .ok_or_else(|| DataError::archive("indicator data", "no 'Country Name' header row"))?;

    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text[header_offset..].as_bytes());
    let headers = csv.headers()?.clone();
    let region = header_index(&headers, "Country Code", "indicator data")?;
    let factor = header_index(&headers, "Indicator Code", "indicator data")?;
    let years: Vec<(usize, i32)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.trim().parse::<i32>().ok().map(|year| (i, year)))
        .collect();

    let mut out = Vec::new();
    for record in csv.records() {
        let record = record?;
        let (Some(region_id), Some(factor_id)) = (record.get(region), record.get(factor)) else {
            continue;
        };

        let mut values = Vec::with_capacity(years.len());
        for &(i, year) in &years {
            let cell = record.get(i).map(str::trim).unwrap_or_default();
            let value = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<f64>().map_err(|e| {
                    DataError::archive(
                        "indicator data",
                        format!("{factor_id}/{region_id} {year}: '{cell}' ({e})"),
                    )
                })?)
            };
            values.push((year, value));
        }

        out.push(IndicatorSeries {
            factor_id: factor_id.trim().to_string(),
            region_id: region_id.trim().to_string(),
            values,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const INDICATORS: &str = "\"INDICATOR_CODE\",\"INDICATOR_NAME\",\"SOURCE_NOTE\",\"SOURCE_ORGANIZATION\",\n\
        \"NY.GDP.MKTP.KD.ZG\",\"GDP growth (annual %)\",\"Annual percentage growth rate of GDP\",\"World Bank\",\n\
        \"FP.CPI.TOTL.ZG\",\"Inflation, consumer prices (annual %)\",\"Inflation\",\"IMF\",\n";

    const COUNTRIES: &str = "\"Country Code\",\"Region\",\"IncomeGroup\",\"SpecialNotes\",\"TableName\",\n\
        \"USA\",\"North America\",\"High income\",\"\",\"United States\",\n\
        \"MEX\",\"Latin America & Caribbean\",\"Upper middle income\",\"\",\"Mexico\",\n";

    const DATA: &str = "\u{feff}\"Data Source\",\"World Development Indicators\",\n\
        \n\
        \"Last Updated Date\",\"2024-06-28\",\n\
        \n\
        \"Country Name\",\"Country Code\",\"Indicator Name\",\"Indicator Code\",\"2019\",\"2020\",\"2021\",\n\
        \"United States\",\"USA\",\"GDP growth (annual %)\",\"NY.GDP.MKTP.KD.ZG\",\"2.3\",\"-2.8\",\"5.9\",\n\
        \"Mexico\",\"MEX\",\"GDP growth (annual %)\",\"NY.GDP.MKTP.KD.ZG\",\"\",\"-8.6\",\"\",\n";

    #[test]
    fn test_parse_bundle() {
        let category =
            ArchiveCategory::from_readers("Economy & Growth", INDICATORS.as_bytes(), COUNTRIES.as_bytes(), DATA.as_bytes())
                .unwrap();

        assert_eq!(category.indicators.len(), 2);
        assert_eq!(category.indicators[1].factor_name, "Inflation, consumer prices (annual %)");
        assert_eq!(category.regions[0].region_name, "United States");

        assert_eq!(category.series.len(), 2);
        let usa = &category.series[0];
        assert_eq!(usa.region_id, "USA");
        assert_eq!(usa.values, vec![(2019, Some(2.3)), (2020, Some(-2.8)), (2021, Some(5.9))]);
        assert_eq!(category.series[1].observed_years(), 1);
    }

    #[test]
    fn test_series_to_monthly() {
        let category =
            ArchiveCategory::from_readers("Economy & Growth", INDICATORS.as_bytes(), COUNTRIES.as_bytes(), DATA.as_bytes())
                .unwrap();
        let range = MonthRange::new("2000-01".parse().unwrap(), "2024-06".parse().unwrap()).unwrap();

        let monthly = category.series[0].monthly(&range).unwrap();
        assert_eq!(monthly.len(), 25);
        assert_eq!(monthly[0].date.to_string(), "2019-12");
        assert_relative_eq!(monthly[0].value, 2.3);
        assert_relative_eq!(monthly[24].value, 5.9);

        assert!(matches!(
            category.series[1].monthly(&range),
            Err(DataError::Analytics(_))
        ));
    }

    #[test]
    fn test_bad_cell_is_reported() {
        let data = "\"Country Name\",\"Country Code\",\"Indicator Name\",\"Indicator Code\",\"2020\",\n\
                    \"United States\",\"USA\",\"GDP\",\"NY.GDP\",\"n/a\",\n";
        let result = ArchiveCategory::from_readers("x", INDICATORS.as_bytes(), COUNTRIES.as_bytes(), data.as_bytes());
        assert!(matches!(result, Err(DataError::Archive { .. })));
    }

    #[test]
    fn test_missing_header_row() {
        let result = ArchiveCategory::from_readers("x", INDICATORS.as_bytes(), COUNTRIES.as_bytes(), "a,b\n1,2\n".as_bytes());
        assert!(matches!(result, Err(DataError::Archive { .. })));
    }
}
