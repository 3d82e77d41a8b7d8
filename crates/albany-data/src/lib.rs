#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod error;
pub mod store;
pub mod yahoo;

pub use archive::{ArchiveCategory, IndicatorArchive, IndicatorSelection, IndicatorSeries};
pub use error::{DataError, Result};
pub use store::{Record, SqliteStore, StoreStats, Table};
pub use yahoo::{MarketDataProvider, YahooQuoteProvider, daily_closes};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
