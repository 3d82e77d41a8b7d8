//! Relational store.
//!
//! Each table has an explicit schema in [`Table`] and a matching entity type
//! implementing [`Record`].

mod record;
pub mod schema;
pub mod sqlite;

pub use record::Record;
pub use schema::Table;
pub use sqlite::{SqliteStore, StoreStats};
