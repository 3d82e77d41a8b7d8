#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;

// Re-export the sub-crates
pub use albany_analytics as analytics;
pub use albany_data as data;
pub use albany_output as output;

pub use albany_data::SqliteStore;
pub use config::AlbanyConfig;
pub use error::{AlbanyError, Result};
pub use ingest::{
    IngestFailure, IngestReport, PortfolioUpdate, ingest_all, ingest_macroeconomic_data,
    ingest_ticker_data, rebalance_asset_weights, update_portfolio_and_weights,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
