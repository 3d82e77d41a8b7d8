//! Portfolio return calculation.
//!
//! Works on the allocation × price join ([`AllocatedPrice`]). Per asset, price
//! changes are computed month over month and scaled by the asset's weight; per
//! portfolio, the weighted returns of all its assets are summed.
//!
//! Weights are used as given. Callers are expected to rebalance first.

use crate::calendar::Month;
use crate::change::{log_change, pct_change};
use crate::error::{AnalyticsError, Result};
use crate::types::AllocatedPrice;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-asset weighted price and returns for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedReturn {
    /// Portfolio identifier
    pub portfolio_id: String,
    /// Asset ticker
    pub asset_id: String,
    /// Month
    pub date: Month,
    /// Allocation weight
    pub asset_weight: f64,
    /// Monthly price
    pub asset_price: Option<f64>,
    /// `asset_weight * asset_price`
    pub weighted_price: Option<f64>,
    /// Month-over-month percentage change of the price
    pub pct_return: Option<f64>,
    /// Month-over-month log change of the price
    pub log_return: Option<f64>,
    /// `asset_weight * pct_return`
    pub weighted_pct_return: Option<f64>,
    /// `asset_weight * log_return`
    pub weighted_log_return: Option<f64>,
}

/// Aggregate return of a portfolio for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReturn {
    /// Portfolio identifier
    pub portfolio_id: String,
    /// Month
    pub date: Month,
    /// Sum of the weighted prices of the portfolio's assets
    pub price: Option<f64>,
    /// Sum of weighted percentage returns
    pub pct_return: Option<f64>,
    /// Sum of weighted log returns
    pub log_return: Option<f64>,
}

/// Both outputs of the return calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnTables {
    /// Per-asset table
    pub weighted: Vec<WeightedReturn>,
    /// Per-portfolio table
    pub portfolio: Vec<PortfolioReturn>,
}

/// Compute both the weighted and the portfolio return tables.
pub fn calc_returns(rows: &[AllocatedPrice]) -> Result<ReturnTables> {
    let weighted = calc_weighted_returns(rows)?;
    let portfolio = calc_portfolio_returns(&weighted);
    Ok(ReturnTables {
        weighted,
        portfolio,
    })
}

/// Compute per-asset weighted returns.
///
/// The prior period of month `t` is the calendar month before `t`; when the
/// asset has no price there, the return at `t` is undefined. Output is sorted
/// by portfolio, asset and month.
///
/// # Errors
/// [`AnalyticsError::InvalidInput`] on non-finite weights or a repeated
/// `(portfolio_id, asset_id, date)` row.
pub fn calc_weighted_returns(rows: &[AllocatedPrice]) -> Result<Vec<WeightedReturn>> {
    // (portfolio, asset) -> month -> (weight, price)
    let mut wide: BTreeMap<(&str, &str), BTreeMap<Month, (f64, Option<f64>)>> = BTreeMap::new();

    for row in rows {
        if !row.asset_weight.is_finite() {
            return Err(AnalyticsError::InvalidInput(format!(
                "weight of {} in {} is not finite",
                row.asset_id, row.portfolio_id
            )));
        }
        let prices = wide
            .entry((row.portfolio_id.as_str(), row.asset_id.as_str()))
            .or_default();
        let price = row.asset_price.filter(|p| p.is_finite());
        if prices.insert(row.date, (row.asset_weight, price)).is_some() {
            return Err(AnalyticsError::InvalidInput(format!(
                "duplicate price row for {} in {} at {}",
                row.asset_id, row.portfolio_id, row.date
            )));
        }
    }

    let mut out = Vec::with_capacity(rows.len());
    for ((portfolio_id, asset_id), prices) in &wide {
        for (&date, &(weight, price)) in prices {
            let previous = prices.get(&date.pred()).and_then(|(_, p)| *p);
            let pct_return = pct_change(previous, price);
            let log_return = log_change(previous, price);

            out.push(WeightedReturn {
                portfolio_id: (*portfolio_id).to_string(),
                asset_id: (*asset_id).to_string(),
                date,
                asset_weight: weight,
                asset_price: price,
                weighted_price: price.map(|p| p * weight),
                pct_return,
                log_return,
                weighted_pct_return: pct_return.map(|r| r * weight),
                weighted_log_return: log_return.map(|r| r * weight),
            });
        }
    }

    Ok(out)
}

/// Sum weighted returns per portfolio and month.
///
/// A month where any of the portfolio's assets lacks a value (including an
/// asset with no row at all that month) has no portfolio value, so the first
/// month of every portfolio is always undefined.
pub fn calc_portfolio_returns(weighted: &[WeightedReturn]) -> Vec<PortfolioReturn> {
    let mut assets: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut groups: BTreeMap<(&str, Month), Vec<&WeightedReturn>> = BTreeMap::new();

    for row in weighted {
        assets
            .entry(row.portfolio_id.as_str())
            .or_default()
            .insert(row.asset_id.as_str());
        groups
            .entry((row.portfolio_id.as_str(), row.date))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((portfolio_id, date), rows)| {
            let complete = assets
                .get(portfolio_id)
                .is_some_and(|members| members.len() == rows.len());

            PortfolioReturn {
                portfolio_id: portfolio_id.to_string(),
                date,
                price: complete_sum(complete, rows.iter().map(|r| r.weighted_price)),
                pct_return: complete_sum(complete, rows.iter().map(|r| r.weighted_pct_return)),
                log_return: complete_sum(complete, rows.iter().map(|r| r.weighted_log_return)),
            }
        })
        .collect()
}

fn complete_sum(complete: bool, values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    if !complete {
        return None;
    }
    values.sum::<Option<f64>>()
}
