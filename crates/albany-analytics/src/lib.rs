#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attribution;
pub mod calendar;
pub mod change;
pub mod correlation;
pub mod error;
pub mod linalg;
pub mod normalize;
pub mod rebalance;
pub mod returns;
pub mod types;

pub use attribution::{
    Attribution, AttributionConfig, AttributionEngine, FactorCoefficient, FactorPanel,
};
pub use calendar::{Month, MonthRange};
pub use correlation::{CorrelationPoint, CorrelationSummary, RollingCorrelation};
pub use error::{AnalyticsError, Result};
pub use rebalance::Rebalanced;
pub use returns::{PortfolioReturn, ReturnTables, WeightedReturn};
pub use types::{
    AllocatedPrice, Asset, AssetAllocation, Factor, FactorKey, FactorObservation, Portfolio,
    PriceObservation, Region,
};

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
