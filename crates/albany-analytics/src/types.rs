//! Portfolio and macroeconomic entities.

use crate::calendar::Month;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradable instrument identified by its ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Ticker symbol (e.g. `^GSPC`)
    pub asset_id: String,
    /// Display name; empty when the provider could not resolve one
    pub asset_name: String,
}

/// A named collection of weighted assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Portfolio identifier
    pub portfolio_id: String,
    /// Display name
    pub portfolio_name: String,
}

/// Weight of one asset inside one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    /// Portfolio identifier
    pub portfolio_id: String,
    /// Asset ticker
    pub asset_id: String,
    /// Non-negative weight; sums to 1 per portfolio once rebalanced
    pub asset_weight: f64,
}

impl AssetAllocation {
    /// Create an allocation row.
    pub fn new(portfolio_id: impl Into<String>, asset_id: impl Into<String>, weight: f64) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            asset_id: asset_id.into(),
            asset_weight: weight,
        }
    }
}

/// Monthly average price of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Asset ticker
    pub asset_id: String,
    /// Month of the observation
    pub date: Month,
    /// Mean closing price over the month
    pub asset_price: f64,
}

/// A macroeconomic indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    /// Indicator code (e.g. `NY.GDP.MKTP.KD.ZG`)
    pub factor_id: String,
    /// Indicator name
    pub factor_name: String,
}

/// A country or aggregate region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Region code (e.g. `USA`)
    pub region_id: String,
    /// Region name
    pub region_name: String,
}

/// Monthly value of a factor in a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorObservation {
    /// Indicator code
    pub factor_id: String,
    /// Region code
    pub region_id: String,
    /// Month of the observation
    pub date: Month,
    /// Interpolated indicator value
    pub value: f64,
}

impl FactorObservation {
    /// The factor × region key this observation belongs to.
    pub fn key(&self) -> FactorKey {
        FactorKey::new(&self.factor_id, &self.region_id)
    }
}

/// Identifies one predictor column: a factor observed in a region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactorKey {
    /// Indicator code
    pub factor_id: String,
    /// Region code
    pub region_id: String,
}

impl FactorKey {
    /// Create a key.
    pub fn new(factor_id: impl Into<String>, region_id: impl Into<String>) -> Self {
        Self {
            factor_id: factor_id.into(),
            region_id: region_id.into(),
        }
    }
}

impl fmt::Display for FactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.factor_id, self.region_id)
    }
}

/// One row of the allocation × price join consumed by the return calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedPrice {
    /// Portfolio identifier
    pub portfolio_id: String,
    /// Asset ticker
    pub asset_id: String,
    /// Month of the price
    pub date: Month,
    /// Allocation weight of the asset in the portfolio
    pub asset_weight: f64,
    /// Monthly price; `None` when the store holds no usable value
    pub asset_price: Option<f64>,
}
