//! Analyses over the stored tables.
//!
//! Every function here reads from the store and hands the rows to the pure
//! engines in `albany-analytics`. Only the allocation editors write.

use crate::config::AlbanyConfig;
use crate::error::{AlbanyError, Result};
use albany_analytics::change::factor_pct_change;
use albany_analytics::correlation::rolling_correlation;
use albany_analytics::rebalance::{BALANCE_TOLERANCE, unbalanced_portfolios};
use albany_analytics::returns::calc_returns;
use albany_analytics::{
    AnalyticsError, Asset, AssetAllocation, Attribution, AttributionEngine, Factor, FactorKey,
    FactorObservation, FactorPanel, Month, MonthRange, Portfolio, PriceObservation,
    ReturnTables, RollingCorrelation,
};
use albany_data::{SqliteStore, Table};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Weighted and portfolio return tables for one portfolio.
///
/// # Errors
/// [`AlbanyError::NotFound`] when the portfolio has no allocation rows.
pub fn portfolio_returns(store: &SqliteStore, portfolio_id: &str) -> Result<ReturnTables> {
    let allocations = store.read_table::<AssetAllocation>()?;
    let held: Vec<&AssetAllocation> = allocations
        .iter()
        .filter(|a| a.portfolio_id == portfolio_id)
        .collect();
    if held.is_empty() {
        return Err(AlbanyError::not_found("portfolio", portfolio_id));
    }
    for (id, sum) in unbalanced_portfolios(&allocations, BALANCE_TOLERANCE) {
        if id == portfolio_id {
            warn!(portfolio = %id, sum, "weights do not sum to one; run rebalance");
        }
    }

    let rows = store.allocated_prices(Some(portfolio_id))?;
    Ok(calc_returns(&rows)?)
}

/// Return tables for every portfolio.
pub fn all_portfolio_returns(store: &SqliteStore) -> Result<ReturnTables> {
    let rows = store.allocated_prices(None)?;
    Ok(calc_returns(&rows)?)
}

/// Monthly percentage returns of the portfolio table.
pub fn return_series(tables: &ReturnTables) -> Vec<(Month, Option<f64>)> {
    tables
        .portfolio
        .iter()
        .map(|r| (r.date, r.pct_return))
        .collect()
}

/// Month-over-month changes of one stored factor series.
pub fn factor_changes(store: &SqliteStore, key: &FactorKey) -> Result<Vec<(Month, Option<f64>)>> {
    let series = store.factor_series(key)?;
    if series.is_empty() {
        return Err(AlbanyError::not_found("factor", key.to_string()));
    }
    Ok(factor_pct_change(&series))
}

/// Rolling correlation between a portfolio's returns and one factor.
pub fn factor_correlation(
    store: &SqliteStore,
    portfolio_id: &str,
    key: &FactorKey,
    window: usize,
) -> Result<RollingCorrelation> {
    let returns = return_series(&portfolio_returns(store, portfolio_id)?);
    let changes = factor_changes(store, key)?;
    Ok(rolling_correlation(&format!("{portfolio_id} vs {key}"), &returns, &changes, window)?)
}

/// Rolling correlation against every stored factor.
///
/// Factors that do not overlap the portfolio for at least `window` months are
/// left out.
pub fn correlate_all_factors(
    store: &SqliteStore,
    portfolio_id: &str,
    window: usize,
) -> Result<Vec<(FactorKey, RollingCorrelation)>> {
    let returns = return_series(&portfolio_returns(store, portfolio_id)?);
    let mut out = Vec::new();

    for key in store.factor_keys()? {
        let changes = factor_pct_change(&store.factor_series(&key)?);
        match rolling_correlation(&key.to_string(), &returns, &changes, window) {
            Ok(rolling) => out.push((key, rolling)),
            Err(e @ (AnalyticsError::Alignment { .. } | AnalyticsError::InsufficientData { .. })) => {
                debug!(factor = %key, error = %e, "factor skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(out)
}

/// Panel of monthly changes of every stored factor.
pub fn factor_panel(store: &SqliteStore) -> Result<FactorPanel> {
    let observations = store.read_table::<FactorObservation>()?;
    Ok(FactorPanel::from_observations(&observations)?)
}

/// Attribute a portfolio's returns to the stored factors over `window`.
pub fn factor_attribution(
    store: &SqliteStore,
    config: &AlbanyConfig,
    portfolio_id: &str,
    window: MonthRange,
) -> Result<Attribution> {
    let returns = return_series(&portfolio_returns(store, portfolio_id)?);
    let panel = factor_panel(store)?;
    debug!(
        factors = panel.n_columns(),
        months = panel.n_dates(),
        %window,
        "fitting attribution"
    );
    let engine = AttributionEngine::new(config.attribution.clone());
    Ok(engine.attribute(&returns, &panel, window)?)
}

/// Factor display names by id.
pub fn factor_names(store: &SqliteStore) -> Result<BTreeMap<String, String>> {
    Ok(store
        .read_table::<Factor>()?
        .into_iter()
        .map(|f| (f.factor_id, f.factor_name))
        .collect())
}

/// Stored monthly prices, optionally for one asset.
pub fn asset_prices(store: &SqliteStore, asset_id: Option<&str>) -> Result<Vec<PriceObservation>> {
    let mut prices = store.read_table::<PriceObservation>()?;
    if let Some(asset_id) = asset_id {
        prices.retain(|p| p.asset_id == asset_id);
    }
    Ok(prices)
}

/// Insert or update one allocation row without rebalancing.
///
/// A portfolio seen for the first time is registered under its id. Returns
/// the portfolios left unbalanced by the edit.
///
/// # Errors
/// - [`AlbanyError::NotFound`] for an asset without stored data
/// - [`AnalyticsError::InvalidInput`] for a negative or non-finite weight
pub fn set_allocation(
    store: &SqliteStore,
    portfolio_id: &str,
    asset_id: &str,
    weight: f64,
) -> Result<Vec<(String, f64)>> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(AnalyticsError::InvalidInput(format!(
            "weight of {asset_id} in {portfolio_id} must be a non-negative number, got {weight}"
        ))
        .into());
    }
    if !store.distinct(Table::Assets, "asset_id")?.contains(asset_id) {
        return Err(AlbanyError::not_found("asset", asset_id));
    }

    let mut allocations = store.read_table::<AssetAllocation>()?;
    match allocations
        .iter_mut()
        .find(|a| a.portfolio_id == portfolio_id && a.asset_id == asset_id)
    {
        Some(row) => row.asset_weight = weight,
        None => allocations.push(AssetAllocation::new(portfolio_id, asset_id, weight)),
    }
    store.replace_table(&allocations)?;

    if !store.distinct(Table::Portfolios, "portfolio_id")?.contains(portfolio_id) {
        store.append_table(&[Portfolio {
            portfolio_id: portfolio_id.to_string(),
            portfolio_name: portfolio_id.to_string(),
        }])?;
    }

    Ok(unbalanced(&allocations))
}

/// Delete one allocation row without rebalancing.
///
/// Returns the portfolios left unbalanced by the edit.
pub fn remove_allocation(
    store: &SqliteStore,
    portfolio_id: &str,
    asset_id: &str,
) -> Result<Vec<(String, f64)>> {
    let mut allocations = store.read_table::<AssetAllocation>()?;
    let before = allocations.len();
    allocations.retain(|a| !(a.portfolio_id == portfolio_id && a.asset_id == asset_id));
    if allocations.len() == before {
        return Err(AlbanyError::not_found(
            "allocation",
            format!("{portfolio_id}/{asset_id}"),
        ));
    }
    store.replace_table(&allocations)?;
    Ok(unbalanced(&allocations))
}

fn unbalanced(allocations: &[AssetAllocation]) -> Vec<(String, f64)> {
    let flagged = unbalanced_portfolios(allocations, BALANCE_TOLERANCE);
    for (portfolio, sum) in &flagged {
        warn!(%portfolio, sum, "weights do not sum to one until rebalanced");
    }
    flagged
}

/// Stored assets.
pub fn assets(store: &SqliteStore) -> Result<Vec<Asset>> {
    Ok(store.read_table::<Asset>()?)
}
