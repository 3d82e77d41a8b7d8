//! Ingestion pipeline.
//!
//! Populates the store from the market data provider and the indicator
//! archive, then maintains the allocation table:
//!
//! 1. [`ingest_ticker_data`] fetches daily prices for tickers not yet stored,
//!    averages them per month and appends prices and asset names
//! 2. [`ingest_macroeconomic_data`] reads the selected indicators from the
//!    archive, interpolates them monthly and appends factors, regions and
//!    observations
//! 3. [`update_portfolio_and_weights`] creates the default portfolio on first
//!    run, registers portfolios referenced by allocations and rebalances
//!
//! Fetches run concurrently; every write happens sequentially on the
//! caller's task. Failures for one ticker or archive file are logged,
//! recorded in the [`IngestReport`] and do not stop the batch.

use crate::config::AlbanyConfig;
use crate::error::Result;
use albany_analytics::normalize::monthly_mean;
use albany_analytics::rebalance::rebalance;
use albany_analytics::{
    AnalyticsError, Asset, AssetAllocation, Factor, FactorKey, FactorObservation, Portfolio,
    PriceObservation, Rebalanced, Region,
};
use albany_data::{
    DataError, IndicatorArchive, IndicatorSelection, MarketDataProvider, SqliteStore, Table,
    daily_closes,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// A ticker or archive file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    /// Ticker, archive directory or series
    pub entity: String,
    /// What went wrong
    pub reason: String,
}

impl IngestFailure {
    fn record(entity: impl Into<String>, reason: impl ToString) -> Self {
        let failure = Self {
            entity: entity.into(),
            reason: reason.to_string(),
        };
        warn!(entity = %failure.entity, reason = %failure.reason, "skipping");
        failure
    }
}

impl From<IngestFailure> for DataError {
    fn from(failure: IngestFailure) -> Self {
        Self::UpstreamFetch {
            entity: failure.entity,
            reason: failure.reason,
        }
    }
}

/// Outcome of the portfolio maintenance step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortfolioUpdate {
    /// Whether the default portfolio was created
    pub created_default: bool,
    /// Portfolios registered because allocations referenced them
    pub registered: Vec<String>,
    /// Portfolios whose weights sum to zero
    pub degenerate: Vec<String>,
    /// Allocation rows after rebalancing
    pub allocations: usize,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Tickers fetched and stored
    pub tickers_fetched: Vec<String>,
    /// Tickers skipped because prices were already stored
    pub tickers_skipped: Vec<String>,
    /// Monthly price rows appended
    pub price_rows: usize,
    /// Factors appended
    pub factors_added: usize,
    /// Regions in the table after merging
    pub regions: usize,
    /// Monthly factor observations appended
    pub factor_rows: usize,
    /// Indicator series with too few yearly values to interpolate
    pub series_skipped: Vec<String>,
    /// Tickers and archive files that failed
    pub failures: Vec<IngestFailure>,
    /// Portfolio maintenance outcome
    pub portfolio: Option<PortfolioUpdate>,
}

impl IngestReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.tickers_fetched.extend(other.tickers_fetched);
        self.tickers_skipped.extend(other.tickers_skipped);
        self.price_rows += other.price_rows;
        self.factors_added += other.factors_added;
        self.regions = self.regions.max(other.regions);
        self.factor_rows += other.factor_rows;
        self.series_skipped.extend(other.series_skipped);
        self.failures.extend(other.failures);
        if other.portfolio.is_some() {
            self.portfolio = other.portfolio;
        }
    }

    /// Whether every ticker and file was ingested.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch, normalize and store prices for configured tickers not yet stored.
///
/// `on_ticker` is called once per fetched ticker as its result is handled.
pub async fn ingest_ticker_data<P, F>(
    store: &SqliteStore,
    provider: &P,
    config: &AlbanyConfig,
    mut on_ticker: F,
) -> Result<IngestReport>
where
    P: MarketDataProvider,
    F: FnMut(&str),
{
    let range = config.ingestion_range()?;
    let priced = store.priced_assets()?;
    let mut known_assets = store.distinct(Table::Assets, "asset_id")?;
    let mut report = IngestReport::default();

    let mut pending = Vec::new();
    let mut seen = BTreeSet::new();
    for ticker in &config.tickers {
        let ticker = ticker.trim();
        if ticker.is_empty() || !seen.insert(ticker.to_string()) {
            continue;
        }
        if priced.contains(ticker) {
            debug!(ticker, "prices already stored");
            report.tickers_skipped.push(ticker.to_string());
        } else {
            pending.push(ticker.to_string());
        }
    }
    if !report.tickers_skipped.is_empty() {
        info!(count = report.tickers_skipped.len(), "skipping tickers with stored prices");
    }

    let (start, end) = (config.start_date, config.end_date);
    let mut fetches = std::pin::pin!(
        stream::iter(pending)
            .map(|ticker| async move {
                let prices = provider.fetch_prices(&ticker, start, end).await;
                let name = match &prices {
                    Ok(_) => Some(provider.fetch_name(&ticker).await),
                    Err(_) => None,
                };
                (ticker, prices, name)
            })
            .buffer_unordered(config.fetch_concurrency.max(1))
    );

    while let Some((ticker, prices, name)) = fetches.next().await {
        let monthly = prices
            .and_then(|df| daily_closes(&df))
            .and_then(|closes| monthly_mean(&ticker, &closes, &range).map_err(DataError::from));

        match monthly {
            Ok(monthly) if monthly.is_empty() => {
                report
                    .failures
                    .push(IngestFailure::record(&ticker, format!("no prices within {range}")));
            }
            Ok(monthly) => {
                let rows: Vec<PriceObservation> = monthly
                    .into_iter()
                    .map(|(date, asset_price)| PriceObservation {
                        asset_id: ticker.clone(),
                        date,
                        asset_price,
                    })
                    .collect();
                report.price_rows += store.append_table(&rows)?;

                if known_assets.insert(ticker.clone()) {
                    let asset_name = match name {
                        Some(Ok(name)) => name,
                        Some(Err(e)) => {
                            warn!(ticker = %ticker, error = %e, "name lookup failed; storing empty name");
                            String::new()
                        }
                        None => String::new(),
                    };
                    store.append_table(&[Asset {
                        asset_id: ticker.clone(),
                        asset_name,
                    }])?;
                }

                info!(ticker = %ticker, months = rows.len(), "stored monthly prices");
                report.tickers_fetched.push(ticker.clone());
            }
            Err(e) => report.failures.push(IngestFailure::record(&ticker, e)),
        }

        on_ticker(&ticker);
    }

    Ok(report)
}

/// Load selected indicators from the archive and store them.
///
/// New factors are appended, regions are merged with the stored ones and
/// written back, and observations are appended for selected factors that have
/// no stored data yet. Series whose indicator is missing from the factor
/// metadata are not stored.
pub fn ingest_macroeconomic_data(store: &SqliteStore, config: &AlbanyConfig) -> Result<IngestReport> {
    let range = config.ingestion_range()?;
    let selection = IndicatorSelection::from_path(&config.selection_file)?;
    let archive = IndicatorArchive::open(&config.archive_dir)?;
    info!(
        selected = selection.len(),
        categories = archive.categories().len(),
        "ingesting macroeconomic indicators"
    );

    let mut known_factors = store.distinct(Table::Factors, "factor_id")?;
    let with_data = store.factors_with_data()?;
    let mut regions: BTreeMap<String, Region> = store
        .read_table::<Region>()?
        .into_iter()
        .map(|r| (r.region_id.clone(), r))
        .collect();

    let mut report = IngestReport::default();
    let mut new_factors: Vec<Factor> = Vec::new();
    let mut observations: Vec<FactorObservation> = Vec::new();
    let mut loaded: BTreeSet<FactorKey> = BTreeSet::new();

    for (dir, category) in archive.load_all() {
        let category = match category {
            Ok(category) => category,
            Err(e) => {
                report
                    .failures
                    .push(IngestFailure::record(dir.display().to_string(), e));
                continue;
            }
        };
        debug!(category = %category.name, series = category.series.len(), "loaded category");

        for factor in category.indicators {
            if selection.contains(&factor.factor_id) && known_factors.insert(factor.factor_id.clone()) {
                new_factors.push(factor);
            }
        }

        for region in category.regions {
            regions.entry(region.region_id.clone()).or_insert(region);
        }

        for series in &category.series {
            if !selection.contains(&series.factor_id) || with_data.contains(&series.factor_id) {
                continue;
            }
            if !known_factors.contains(&series.factor_id) {
                debug!(factor = %series.factor_id, region = %series.region_id, "series without factor metadata ignored");
                continue;
            }
            let key = FactorKey::new(&series.factor_id, &series.region_id);
            if loaded.contains(&key) {
                warn!(factor = %key.factor_id, region = %key.region_id, "duplicate series ignored");
                continue;
            }

            match series.monthly(&range) {
                Ok(monthly) => {
                    loaded.insert(key);
                    observations.extend(monthly);
                }
                Err(DataError::Analytics(e @ AnalyticsError::InsufficientData { .. })) => {
                    warn!(error = %e, "series not interpolated");
                    report
                        .series_skipped
                        .push(format!("{}/{}", series.factor_id, series.region_id));
                }
                Err(e) => report.failures.push(IngestFailure::record(
                    format!("{}/{}", series.factor_id, series.region_id),
                    e,
                )),
            }
        }
    }

    report.factors_added = store.append_table(&new_factors)?;
    let regions: Vec<Region> = regions.into_values().collect();
    report.regions = store.replace_table(&regions)?;
    report.factor_rows = store.append_table(&observations)?;

    info!(
        factors = report.factors_added,
        regions = report.regions,
        observations = report.factor_rows,
        skipped = report.series_skipped.len(),
        "stored macroeconomic data"
    );
    Ok(report)
}

/// Normalize every portfolio's weights and replace the allocation table.
pub fn rebalance_asset_weights(store: &SqliteStore) -> Result<Rebalanced> {
    let allocations = store.read_table::<AssetAllocation>()?;
    let rebalanced = rebalance(&allocations)?;
    for error in rebalanced.degenerate_errors() {
        warn!(%error, "portfolio not rebalanced");
    }
    store.replace_table(&rebalanced.allocations)?;
    debug!(rows = rebalanced.allocations.len(), "rebalanced allocations");
    Ok(rebalanced)
}

/// Create or register portfolios, then rebalance.
///
/// With an empty allocation table the configured default portfolio is created
/// holding every stored asset at weight one. Otherwise any portfolio referenced
/// by an allocation but missing from the portfolio table is registered under
/// its id.
pub fn update_portfolio_and_weights(store: &SqliteStore, config: &AlbanyConfig) -> Result<PortfolioUpdate> {
    let allocations = store.read_table::<AssetAllocation>()?;
    let portfolios: BTreeSet<String> = store
        .read_table::<Portfolio>()?
        .into_iter()
        .map(|p| p.portfolio_id)
        .collect();
    let mut update = PortfolioUpdate::default();

    if allocations.is_empty() {
        let assets = store.read_table::<Asset>()?;
        if assets.is_empty() {
            info!("no assets stored; default portfolio not created");
            return Ok(update);
        }
        if !portfolios.contains(&config.portfolio_id) {
            store.append_table(&[Portfolio {
                portfolio_id: config.portfolio_id.clone(),
                portfolio_name: config.portfolio_name.clone(),
            }])?;
        }
        let rows: Vec<AssetAllocation> = assets
            .iter()
            .map(|a| AssetAllocation::new(&config.portfolio_id, &a.asset_id, 1.0))
            .collect();
        store.append_table(&rows)?;
        info!(
            portfolio = %config.portfolio_id,
            assets = rows.len(),
            "created default portfolio"
        );
        update.created_default = true;
    } else {
        let referenced: BTreeSet<&str> = allocations.iter().map(|a| a.portfolio_id.as_str()).collect();
        let missing: Vec<Portfolio> = referenced
            .into_iter()
            .filter(|id| !portfolios.contains(*id))
            .map(|id| Portfolio {
                portfolio_id: id.to_string(),
                portfolio_name: id.to_string(),
            })
            .collect();
        if !missing.is_empty() {
            store.append_table(&missing)?;
            update.registered = missing.into_iter().map(|p| p.portfolio_id).collect();
            info!(portfolios = ?update.registered, "registered portfolios");
        }
    }

    let rebalanced = rebalance_asset_weights(store)?;
    update.degenerate = rebalanced.degenerate;
    update.allocations = rebalanced.allocations.len();
    Ok(update)
}

/// Run the full pipeline: prices, macroeconomic data, portfolios.
///
/// A missing archive directory or selection file skips the macroeconomic
/// step and is recorded as a failure.
pub async fn ingest_all<P, F>(
    store: &SqliteStore,
    provider: &P,
    config: &AlbanyConfig,
    on_ticker: F,
) -> Result<IngestReport>
where
    P: MarketDataProvider,
    F: FnMut(&str),
{
    let mut report = ingest_ticker_data(store, provider, config, on_ticker).await?;

    if !config.archive_dir.is_dir() {
        report.failures.push(IngestFailure::record(
            config.archive_dir.display().to_string(),
            "archive directory not found",
        ));
    } else if !config.selection_file.is_file() {
        report.failures.push(IngestFailure::record(
            config.selection_file.display().to_string(),
            "indicator selection file not found",
        ));
    } else {
        report.merge(ingest_macroeconomic_data(store, config)?);
    }

    report.portfolio = Some(update_portfolio_and_weights(store, config)?);
    Ok(report)
}
