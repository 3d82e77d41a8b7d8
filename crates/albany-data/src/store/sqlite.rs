//! SQLite storage for the Albany tables.

use super::record::{Record, month_column};
use super::schema::Table;
use crate::error::{DataError, Result};
use albany_analytics::{AllocatedPrice, FactorKey, Month};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Single-connection SQLite store.
///
/// Writers replace or append whole tables inside one transaction, so the
/// store assumes a single writer.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database, creating any missing tables.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.initialize_schema()?;
        debug!(path = %path.as_ref().display(), "opened database");
        Ok(store)
    }

    /// Recreate a database from scratch, deleting any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "removed existing database"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::open(path)?;
        info!(path = %path.display(), "created database");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        for table in Table::ALL {
            self.conn.execute(table.create_sql(), [])?;
        }
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_asset_prices_date ON asset_prices(date)",
            [],
        )?;
        Ok(())
    }

    /// Read every row of a table, ordered by primary key.
    pub fn read_table<R: Record>(&self) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(&R::TABLE.select_sql())?;
        let rows = stmt.query_map([], |row| R::from_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Replace the full contents of a table.
    ///
    /// Either every row is written or the table is left unchanged.
    pub fn replace_table<R: Record>(&self, rows: &[R]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DELETE FROM {}", R::TABLE.name()), [])?;
        {
            let mut stmt = tx.prepare(&R::TABLE.insert_sql())?;
            for row in rows {
                row.insert(&mut stmt)?;
            }
        }
        tx.commit()?;
        debug!(table = %R::TABLE, rows = rows.len(), "replaced table");
        Ok(rows.len())
    }

    /// Append rows to a table.
    ///
    /// A key collision aborts the whole append.
    pub fn append_table<R: Record>(&self, rows: &[R]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&R::TABLE.insert_sql())?;
            for row in rows {
                row.insert(&mut stmt)?;
            }
        }
        tx.commit()?;
        debug!(table = %R::TABLE, rows = rows.len(), "appended rows");
        Ok(rows.len())
    }

    /// Number of rows in a table.
    pub fn count(&self, table: Table) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Distinct values of one column of a table.
    pub fn distinct(&self, table: Table, column: &str) -> Result<BTreeSet<String>> {
        if !table.columns().contains(&column) {
            return Err(DataError::Parse(format!(
                "Table {table} has no column {column}"
            )));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT DISTINCT {column} FROM {}", table.name()))?;
        let values = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(values.collect::<rusqlite::Result<BTreeSet<_>>>()?)
    }

    /// Tickers with at least one stored price.
    pub fn priced_assets(&self) -> Result<BTreeSet<String>> {
        self.distinct(Table::AssetPrices, "asset_id")
    }

    /// Factors with at least one stored observation.
    pub fn factors_with_data(&self) -> Result<BTreeSet<String>> {
        self.distinct(Table::FactorData, "factor_id")
    }

    /// Every factor × region key with stored observations.
    pub fn factor_keys(&self) -> Result<Vec<FactorKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT factor_id, region_id FROM factor_data
             ORDER BY factor_id, region_id",
        )?;
        let keys = stmt.query_map([], |row| {
            Ok(FactorKey::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;
        Ok(keys.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Monthly levels of one factor in one region, ascending by month.
    pub fn factor_series(&self, key: &FactorKey) -> Result<Vec<(Month, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, value FROM factor_data
             WHERE factor_id = ?1 AND region_id = ?2
             ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![key.factor_id, key.region_id], |row| {
            Ok((month_column(row, 0)?, row.get::<_, f64>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Allocation × price join, for one portfolio or all of them.
    ///
    /// Allocated assets without any stored price contribute no rows.
    pub fn allocated_prices(&self, portfolio_id: Option<&str>) -> Result<Vec<AllocatedPrice>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.portfolio_id, a.asset_id, p.date, a.asset_weight, p.asset_price
             FROM asset_allocation a
             INNER JOIN asset_prices p ON p.asset_id = a.asset_id
             WHERE ?1 IS NULL OR a.portfolio_id = ?1
             ORDER BY a.portfolio_id, a.asset_id, p.date",
        )?;
        let rows = stmt.query_map(params![portfolio_id], |row| {
            Ok(AllocatedPrice {
                portfolio_id: row.get(0)?,
                asset_id: row.get(1)?,
                date: month_column(row, 2)?,
                asset_weight: row.get(3)?,
                asset_price: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Row counts of every table.
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            assets: self.count(Table::Assets)?,
            portfolios: self.count(Table::Portfolios)?,
            allocations: self.count(Table::AssetAllocation)?,
            prices: self.count(Table::AssetPrices)?,
            factors: self.count(Table::Factors)?,
            regions: self.count(Table::Regions)?,
            factor_observations: self.count(Table::FactorData)?,
        })
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of assets
    pub assets: usize,
    /// Number of portfolios
    pub portfolios: usize,
    /// Number of allocation rows
    pub allocations: usize,
    /// Number of monthly prices
    pub prices: usize,
    /// Number of factors
    pub factors: usize,
    /// Number of regions
    pub regions: usize,
    /// Number of monthly factor observations
    pub factor_observations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use albany_analytics::{Asset, AssetAllocation, FactorObservation, PriceObservation};

    fn price(asset: &str, month: &str, value: f64) -> PriceObservation {
        PriceObservation {
            asset_id: asset.to_string(),
            date: month.parse().unwrap(),
            asset_price: value,
        }
    }

    #[test]
    fn test_store_initialization() {
        let store = SqliteStore::in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.assets, 0);
        assert_eq!(stats.factor_observations, 0);
    }

    #[test]
    fn test_replace_table() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .replace_table(&[
                AssetAllocation::new("PF_01", "^GSPC", 0.5),
                AssetAllocation::new("PF_01", "^FTSE", 0.5),
            ])
            .unwrap();
        store
            .replace_table(&[AssetAllocation::new("PF_02", "^N225", 1.0)])
            .unwrap();

        let rows: Vec<AssetAllocation> = store.read_table().unwrap();
        assert_eq!(rows, vec![AssetAllocation::new("PF_02", "^N225", 1.0)]);
    }

    #[test]
    fn test_append_key_collision_is_atomic() {
        let store = SqliteStore::in_memory().unwrap();
        store.append_table(&[price("^GSPC", "2020-01", 1.0)]).unwrap();

        let result = store.append_table(&[price("^GSPC", "2020-02", 2.0), price("^GSPC", "2020-01", 3.0)]);
        assert!(matches!(result, Err(DataError::Database(_))));

        let rows: Vec<PriceObservation> = store.read_table().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset_price, 1.0);
    }

    #[test]
    fn test_allocated_prices_join() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .append_table(&[
                price("^GSPC", "2020-01", 100.0),
                price("^GSPC", "2020-02", 110.0),
                price("^FTSE", "2020-01", 50.0),
            ])
            .unwrap();
        store
            .replace_table(&[
                AssetAllocation::new("PF_01", "^GSPC", 0.6),
                AssetAllocation::new("PF_01", "^FTSE", 0.4),
                AssetAllocation::new("PF_02", "^GSPC", 1.0),
                AssetAllocation::new("PF_02", "^MXX", 0.0),
            ])
            .unwrap();

        let pf1 = store.allocated_prices(Some("PF_01")).unwrap();
        assert_eq!(pf1.len(), 3);
        assert_eq!(pf1[0].asset_id, "^FTSE");
        assert_eq!(pf1[0].asset_weight, 0.4);

        let all = store.allocated_prices(None).unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|r| r.asset_id != "^MXX"));
    }

    #[test]
    fn test_factor_series_and_keys() {
        let store = SqliteStore::in_memory().unwrap();
        let obs = |region: &str, month: &str, value: f64| FactorObservation {
            factor_id: "GDP".to_string(),
            region_id: region.to_string(),
            date: month.parse().unwrap(),
            value,
        };
        store
            .append_table(&[obs("USA", "2020-02", 2.0), obs("USA", "2020-01", 1.0), obs("FRA", "2020-01", 5.0)])
            .unwrap();

        let series = store.factor_series(&FactorKey::new("GDP", "USA")).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0.to_string(), "2020-01");
        assert_eq!(
            store.factor_keys().unwrap(),
            vec![FactorKey::new("GDP", "FRA"), FactorKey::new("GDP", "USA")]
        );
        assert!(store.factors_with_data().unwrap().contains("GDP"));
    }

    #[test]
    fn test_distinct_rejects_unknown_column() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.distinct(Table::Assets, "1; DROP TABLE assets").is_err());
        store
            .append_table(&[Asset {
                asset_id: "^GSPC".to_string(),
                asset_name: String::new(),
            }])
            .unwrap();
        assert_eq!(store.distinct(Table::Assets, "asset_id").unwrap().len(), 1);
    }

    #[test]
    fn test_create_recreates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("albany.db");
        {
            let store = SqliteStore::create(&path).unwrap();
            store.append_table(&[price("^GSPC", "2020-01", 1.0)]).unwrap();
        }
        {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.count(Table::AssetPrices).unwrap(), 1);
        }
        {
            let store = SqliteStore::create(&path).unwrap();
            assert_eq!(store.count(Table::AssetPrices).unwrap(), 0);
        }
    }
}
