//! Yahoo Finance data provider.

pub mod quotes;

pub use quotes::{MarketDataProvider, YahooQuoteProvider, daily_closes};
