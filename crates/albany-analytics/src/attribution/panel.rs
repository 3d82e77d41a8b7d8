//! Predictor panel: one column of monthly factor changes per factor × region key.

use crate::calendar::{Month, MonthRange};
use crate::change::factor_pct_change;
use crate::error::{AnalyticsError, Result};
use crate::types::{FactorKey, FactorObservation};
use std::collections::{BTreeMap, BTreeSet};

/// Wide table of factor changes, stored column-major.
///
/// Every column spans the same sorted list of dates; a month where the key has
/// no change is `None`. Infinite changes (from a zero prior level) are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorPanel {
    keys: Vec<FactorKey>,
    dates: Vec<Month>,
    values: Vec<Vec<Option<f64>>>,
}

impl FactorPanel {
    /// Pivot factor levels into a panel of month-over-month changes.
    ///
    /// # Errors
    /// [`AnalyticsError::InvalidInput`] when a key has two observations in one month.
    pub fn from_observations(observations: &[FactorObservation]) -> Result<Self> {
        let mut levels: BTreeMap<FactorKey, BTreeMap<Month, f64>> = BTreeMap::new();
        for obs in observations {
            let series = levels.entry(obs.key()).or_default();
            if series.insert(obs.date, obs.value).is_some() {
                return Err(AnalyticsError::InvalidInput(format!(
                    "duplicate observation for {} at {}",
                    obs.key(),
                    obs.date
                )));
            }
        }

        let columns = levels
            .into_iter()
            .map(|(key, series)| {
                let series: Vec<(Month, f64)> = series.into_iter().collect();
                (key, factor_pct_change(&series))
            })
            .collect();

        Self::from_columns(columns)
    }

    /// Build a panel from per-key change series.
    ///
    /// # Errors
    /// [`AnalyticsError::InvalidInput`] on a repeated key or a repeated month
    /// within one column.
    pub fn from_columns(columns: Vec<(FactorKey, Vec<(Month, Option<f64>)>)>) -> Result<Self> {
        let dates: Vec<Month> = columns
            .iter()
            .flat_map(|(_, series)| series.iter().map(|(m, _)| *m))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position: BTreeMap<Month, usize> =
            dates.iter().enumerate().map(|(i, m)| (*m, i)).collect();

        let mut seen = BTreeSet::new();
        let mut keys = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());

        for (key, series) in columns {
            if !seen.insert(key.clone()) {
                return Err(AnalyticsError::InvalidInput(format!(
                    "factor {key} appears twice in the panel"
                )));
            }
            let mut column = vec![None; dates.len()];
            let mut filled = vec![false; dates.len()];
            for (month, value) in series {
                let Some(&row) = position.get(&month) else {
                    continue;
                };
                if filled[row] {
                    return Err(AnalyticsError::InvalidInput(format!(
                        "factor {key} has two values at {month}"
                    )));
                }
                filled[row] = true;
                column[row] = value.filter(|v| !v.is_nan());
            }
            keys.push(key);
            values.push(column);
        }

        Ok(Self {
            keys,
            dates,
            values,
        })
    }

    /// Column keys, in column order.
    pub fn keys(&self) -> &[FactorKey] {
        &self.keys
    }

    /// Row dates, ascending.
    pub fn dates(&self) -> &[Month] {
        &self.dates
    }

    /// Values of column `index`, one per date.
    pub fn column(&self, index: usize) -> Option<&[Option<f64>]> {
        self.values.get(index).map(Vec::as_slice)
    }

    /// Change series of one key, paired with dates.
    pub fn series(&self, key: &FactorKey) -> Option<Vec<(Month, Option<f64>)>> {
        let index = self.keys.iter().position(|k| k == key)?;
        Some(
            self.dates
                .iter()
                .copied()
                .zip(self.values[index].iter().copied())
                .collect(),
        )
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.keys.len()
    }

    /// Number of dates.
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Whether the panel has no columns.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The rows falling inside `window`.
    pub fn restrict(&self, window: &MonthRange) -> Self {
        let rows: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, m)| window.contains(m))
            .map(|(i, _)| i)
            .collect();

        Self {
            keys: self.keys.clone(),
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            values: self
                .values
                .iter()
                .map(|column| rows.iter().map(|&i| column[i]).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(factor: &str, region: &str, month: &str, value: f64) -> FactorObservation {
        FactorObservation {
            factor_id: factor.to_string(),
            region_id: region.to_string(),
            date: month.parse().unwrap(),
            value,
        }
    }

    #[test]
    fn test_pivot_computes_changes() {
        let panel = FactorPanel::from_observations(&[
            obs("GDP", "USA", "2020-01", 100.0),
            obs("GDP", "USA", "2020-02", 110.0),
            obs("CPI", "FRA", "2020-02", 2.0),
            obs("CPI", "FRA", "2020-03", 0.0),
        ])
        .unwrap();

        assert_eq!(panel.n_columns(), 2);
        assert_eq!(panel.n_dates(), 3);
        // keys are sorted, CPI before GDP
        assert_eq!(panel.keys()[0], FactorKey::new("CPI", "FRA"));

        let cpi = panel.column(0).unwrap();
        assert_eq!(cpi[0], None);
        assert_eq!(cpi[1], None);
        assert_eq!(cpi[2], Some(-1.0));

        let gdp = panel.series(&FactorKey::new("GDP", "USA")).unwrap();
        approx::assert_relative_eq!(gdp[1].1.unwrap(), 0.10, epsilon = 1e-12);
        assert_eq!(gdp[2].1, None);
    }

    #[test]
    fn test_zero_level_gives_infinite_change() {
        let panel = FactorPanel::from_observations(&[
            obs("BAL", "MEX", "2020-01", 0.0),
            obs("BAL", "MEX", "2020-02", -3.0),
        ])
        .unwrap();
        assert_eq!(panel.column(0).unwrap()[1], Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_restrict_keeps_window_rows() {
        let panel = FactorPanel::from_observations(&[
            obs("GDP", "USA", "2020-01", 1.0),
            obs("GDP", "USA", "2020-02", 2.0),
            obs("GDP", "USA", "2020-03", 3.0),
        ])
        .unwrap();
        let window = MonthRange::new("2020-02".parse().unwrap(), "2020-03".parse().unwrap()).unwrap();

        let restricted = panel.restrict(&window);
        assert_eq!(restricted.n_dates(), 2);
        assert_eq!(restricted.column(0).unwrap(), &[Some(1.0), Some(0.5)]);
    }

    #[test]
    fn test_duplicate_observation_rejected() {
        let result = FactorPanel::from_observations(&[
            obs("GDP", "USA", "2020-01", 1.0),
            obs("GDP", "USA", "2020-01", 2.0),
        ]);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let key = FactorKey::new("GDP", "USA");
        let result = FactorPanel::from_columns(vec![(key.clone(), vec![]), (key, vec![])]);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }
}
