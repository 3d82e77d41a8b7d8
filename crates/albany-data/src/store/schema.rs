//! Table definitions.

use crate::error::{DataError, Result};
use std::fmt;
use std::str::FromStr;

/// The tables of the Albany database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Instruments, keyed by ticker
    Assets,
    /// Portfolio names
    Portfolios,
    /// Portfolio × asset weights
    AssetAllocation,
    /// Monthly average prices
    AssetPrices,
    /// Macroeconomic indicators
    Factors,
    /// Countries and aggregates
    Regions,
    /// Monthly factor values per region
    FactorData,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Self; 7] = [
        Self::Assets,
        Self::Portfolios,
        Self::AssetAllocation,
        Self::AssetPrices,
        Self::Factors,
        Self::Regions,
        Self::FactorData,
    ];

    /// SQL table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Portfolios => "portfolios",
            Self::AssetAllocation => "asset_allocation",
            Self::AssetPrices => "asset_prices",
            Self::Factors => "factors",
            Self::Regions => "regions",
            Self::FactorData => "factor_data",
        }
    }

    /// Column names, in insert and select order.
    pub const fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Assets => &["asset_id", "asset_name"],
            Self::Portfolios => &["portfolio_id", "portfolio_name"],
            Self::AssetAllocation => &["portfolio_id", "asset_id", "asset_weight"],
            Self::AssetPrices => &["asset_id", "date", "asset_price"],
            Self::Factors => &["factor_id", "factor_name"],
            Self::Regions => &["region_id", "region_name"],
            Self::FactorData => &["factor_id", "region_id", "date", "value"],
        }
    }

    /// Primary key columns, used as the default read order.
    pub const fn primary_key(&self) -> &'static [&'static str] {
        match self {
            Self::Assets => &["asset_id"],
            Self::Portfolios => &["portfolio_id"],
            Self::AssetAllocation => &["portfolio_id", "asset_id"],
            Self::AssetPrices => &["asset_id", "date"],
            Self::Factors => &["factor_id"],
            Self::Regions => &["region_id"],
            Self::FactorData => &["factor_id", "region_id", "date"],
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub const fn create_sql(&self) -> &'static str {
        match self {
            Self::Assets => {
                "CREATE TABLE IF NOT EXISTS assets (
                    asset_id TEXT PRIMARY KEY,
                    asset_name TEXT NOT NULL DEFAULT ''
                )"
            }
            Self::Portfolios => {
                "CREATE TABLE IF NOT EXISTS portfolios (
                    portfolio_id TEXT PRIMARY KEY,
                    portfolio_name TEXT NOT NULL
                )"
            }
            Self::AssetAllocation => {
                "CREATE TABLE IF NOT EXISTS asset_allocation (
                    portfolio_id TEXT NOT NULL,
                    asset_id TEXT NOT NULL,
                    asset_weight REAL NOT NULL CHECK (asset_weight >= 0),
                    PRIMARY KEY (portfolio_id, asset_id)
                )"
            }
            Self::AssetPrices => {
                "CREATE TABLE IF NOT EXISTS asset_prices (
                    asset_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    asset_price REAL NOT NULL,
                    PRIMARY KEY (asset_id, date)
                )"
            }
            Self::Factors => {
                "CREATE TABLE IF NOT EXISTS factors (
                    factor_id TEXT PRIMARY KEY,
                    factor_name TEXT NOT NULL
                )"
            }
            Self::Regions => {
                "CREATE TABLE IF NOT EXISTS regions (
                    region_id TEXT PRIMARY KEY,
                    region_name TEXT NOT NULL
                )"
            }
            Self::FactorData => {
                "CREATE TABLE IF NOT EXISTS factor_data (
                    factor_id TEXT NOT NULL,
                    region_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    value REAL NOT NULL,
                    PRIMARY KEY (factor_id, region_id, date)
                )"
            }
        }
    }

    /// `SELECT` of every column, ordered by primary key.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.columns().join(", "),
            self.name(),
            self.primary_key().join(", ")
        )
    }

    /// Parameterized `INSERT` of one row.
    pub fn insert_sql(&self) -> String {
        let columns = self.columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name(),
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|table| table.name() == s)
            .ok_or_else(|| DataError::Parse(format!("Unknown table: {s}")))
    }
}
