//! Row mapping between entity structs and their tables.

use super::schema::Table;
use albany_analytics::{
    Asset, AssetAllocation, Factor, FactorObservation, Month, Portfolio, PriceObservation, Region,
};
use rusqlite::types::Type;
use rusqlite::{Row, Statement, params};

/// An entity stored as one row of a [`Table`].
pub trait Record: Sized {
    /// Table holding this entity.
    const TABLE: Table;

    /// Read one row selected with [`Table::select_sql`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Execute a statement prepared from [`Table::insert_sql`] for this row.
    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize>;
}

/// Read a `YYYY-MM` column.
pub(crate) fn month_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Month> {
    let text: String = row.get(idx)?;
    text.parse::<Month>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl Record for Asset {
    const TABLE: Table = Table::Assets;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            asset_id: row.get(0)?,
            asset_name: row.get(1)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.asset_id, self.asset_name])
    }
}

impl Record for Portfolio {
    const TABLE: Table = Table::Portfolios;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            portfolio_id: row.get(0)?,
            portfolio_name: row.get(1)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.portfolio_id, self.portfolio_name])
    }
}

impl Record for AssetAllocation {
    const TABLE: Table = Table::AssetAllocation;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            portfolio_id: row.get(0)?,
            asset_id: row.get(1)?,
            asset_weight: row.get(2)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.portfolio_id, self.asset_id, self.asset_weight])
    }
}

impl Record for PriceObservation {
    const TABLE: Table = Table::AssetPrices;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            asset_id: row.get(0)?,
            date: month_column(row, 1)?,
            asset_price: row.get(2)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.asset_id, self.date.to_string(), self.asset_price])
    }
}

impl Record for Factor {
    const TABLE: Table = Table::Factors;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            factor_id: row.get(0)?,
            factor_name: row.get(1)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.factor_id, self.factor_name])
    }
}

impl Record for Region {
    const TABLE: Table = Table::Regions;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            region_id: row.get(0)?,
            region_name: row.get(1)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![self.region_id, self.region_name])
    }
}

impl Record for FactorObservation {
    const TABLE: Table = Table::FactorData;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            factor_id: row.get(0)?,
            region_id: row.get(1)?,
            date: month_column(row, 2)?,
            value: row.get(3)?,
        })
    }

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.factor_id,
            self.region_id,
            self.date.to_string(),
            self.value
        ])
    }
}
