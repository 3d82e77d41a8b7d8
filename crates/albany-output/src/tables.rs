//! Tabular views for terminal display and export.

use crate::export::{ExportError, ExportFormat, Exporter};
use albany_analytics::rebalance::{unbalanced_portfolios, weight_sums};
use albany_analytics::{AssetAllocation, FactorKey, Month, PriceObservation, RollingCorrelation};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Monthly prices pivoted to one row per month and one column per asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PricePivot {
    dates: Vec<Month>,
    assets: Vec<String>,
    /// Row-major, `dates.len() × assets.len()`.
    values: Vec<Option<f64>>,
}

impl PricePivot {
    /// Pivot price observations. Later duplicates overwrite earlier ones.
    pub fn from_observations(observations: &[PriceObservation]) -> Self {
        let dates: Vec<Month> = observations
            .iter()
            .map(|o| o.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let assets: Vec<String> = observations
            .iter()
            .map(|o| o.asset_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let row_of: BTreeMap<Month, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let col_of: BTreeMap<&str, usize> =
            assets.iter().enumerate().map(|(i, a)| (a.as_str(), i)).collect();

        let mut values = vec![None; dates.len() * assets.len()];
        for o in observations {
            if let (Some(&r), Some(&c)) = (row_of.get(&o.date), col_of.get(o.asset_id.as_str())) {
                values[r * assets.len() + c] = Some(o.asset_price);
            }
        }

        Self {
            dates,
            assets,
            values,
        }
    }

    /// Months, ascending.
    pub fn dates(&self) -> &[Month] {
        &self.dates
    }

    /// Asset ids, sorted.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Price of `asset` in `date`, if observed.
    pub fn get(&self, date: Month, asset: &str) -> Option<f64> {
        let r = self.dates.binary_search(&date).ok()?;
        let c = self.assets.iter().position(|a| a == asset)?;
        self.values[r * self.assets.len() + c]
    }

    fn row(&self, r: usize) -> &[Option<f64>] {
        let width = self.assets.len();
        &self.values[r * width..(r + 1) * width]
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();
        let width = 10 + self.assets.len() * 15;

        output.push_str("\nMonthly Asset Prices\n");
        output.push_str(&"=".repeat(width));
        output.push('\n');
        output.push_str(&format!("{:<10}", "Date"));
        for asset in &self.assets {
            output.push_str(&format!(" {asset:>14}"));
        }
        output.push('\n');
        output.push_str(&"-".repeat(width));
        output.push('\n');

        for (r, date) in self.dates.iter().enumerate() {
            output.push_str(&format!("{:<10}", date.to_string()));
            for value in self.row(r) {
                match value {
                    Some(v) => output.push_str(&format!(" {v:>14.2}")),
                    None => output.push_str(&format!(" {:>14}", "-")),
                }
            }
            output.push('\n');
        }
        output.push_str(&"=".repeat(width));
        output.push('\n');

        output
    }
}

impl Exporter for PricePivot {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["date".to_string()];
                header.extend(self.assets.iter().cloned());
                wtr.write_record(&header)?;
                for (r, date) in self.dates.iter().enumerate() {
                    let mut record = vec![date.to_string()];
                    record.extend(
                        self.row(r)
                            .iter()
                            .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
                    );
                    wtr.write_record(&record)?;
                }
                let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
                String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Allocation table with per-portfolio weight totals.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationView {
    /// Allocation rows, ordered by portfolio then asset.
    pub allocations: Vec<AssetAllocation>,

    /// Total weight per portfolio.
    pub sums: BTreeMap<String, f64>,

    /// Portfolios whose weights do not sum to one, with their totals.
    pub unbalanced: Vec<(String, f64)>,
}

impl AllocationView {
    /// Build a view, flagging portfolios whose weights miss one by more than `tolerance`.
    pub fn new(allocations: &[AssetAllocation], tolerance: f64) -> Self {
        let mut sorted = allocations.to_vec();
        sorted.sort_by(|a, b| {
            a.portfolio_id
                .cmp(&b.portfolio_id)
                .then_with(|| a.asset_id.cmp(&b.asset_id))
        });
        Self {
            sums: weight_sums(&sorted),
            unbalanced: unbalanced_portfolios(&sorted, tolerance),
            allocations: sorted,
        }
    }

    /// Whether every portfolio's weights sum to one.
    pub fn is_balanced(&self) -> bool {
        self.unbalanced.is_empty()
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nAsset Allocation\n");
        output.push_str(&"=".repeat(60));
        output.push('\n');
        output.push_str(&format!("{:<20} {:<25} {:>12}\n", "Portfolio", "Asset", "Weight"));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        let mut current: Option<&str> = None;
        for a in &self.allocations {
            if let Some(prev) = current
                && prev != a.portfolio_id
            {
                self.push_total(&mut output, prev);
            }
            current = Some(&a.portfolio_id);
            output.push_str(&format!(
                "{:<20} {:<25} {:>12.4}\n",
                a.portfolio_id, a.asset_id, a.asset_weight
            ));
        }
        if let Some(prev) = current {
            self.push_total(&mut output, prev);
        }

        output.push_str(&"=".repeat(60));
        output.push('\n');
        if self.unbalanced.is_empty() {
            output.push_str("All portfolios balanced\n");
        } else {
            for (id, total) in &self.unbalanced {
                output.push_str(&format!("Unbalanced: {id} (total {total:.4})\n"));
            }
        }

        output
    }

    fn push_total(&self, output: &mut String, portfolio_id: &str) {
        let total = self.sums.get(portfolio_id).copied().unwrap_or_default();
        output.push_str(&format!("{:<20} {:<25} {:>12.4}\n", "", "total", total));
    }
}

/// Summary table of rolling correlations between portfolio returns and factors.
pub fn correlation_summary_table(
    portfolio_id: &str,
    results: &[(FactorKey, RollingCorrelation)],
) -> String {
    let fmt_opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    let mut output = String::new();

    output.push_str(&format!("\nRolling Factor Correlation: {portfolio_id}\n"));
    output.push_str(&"=".repeat(80));
    output.push('\n');
    output.push_str(&format!(
        "{:<28} {:<8} {:>8} {:>10} {:>10} {:>10}\n",
        "Factor", "Region", "Window", "Mean", "Std Dev", "Obs"
    ));
    output.push_str(&"-".repeat(80));
    output.push('\n');

    for (key, rolling) in results {
        output.push_str(&format!(
            "{:<28} {:<8} {:>8} {:>10} {:>10} {:>10}\n",
            key.factor_id,
            key.region_id,
            rolling.window,
            fmt_opt(rolling.summary.mean),
            fmt_opt(rolling.summary.std_dev),
            rolling.summary.observations
        ));
    }
    output.push_str(&"=".repeat(80));
    output.push('\n');

    output
}
