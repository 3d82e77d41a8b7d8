//! Weight rebalancing.
//!
//! Divides every allocation weight by its portfolio's weight sum so each
//! portfolio sums to one. A portfolio whose weights sum to zero cannot be
//! normalized; its rows are kept at zero and the portfolio is flagged.

use crate::error::{AnalyticsError, Result};
use crate::types::AssetAllocation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Tolerance used when reporting portfolios as out of balance.
pub const BALANCE_TOLERANCE: f64 = 1e-9;

/// Sums this close to one are treated as already balanced and left untouched.
const UNIT_SUM_TOLERANCE: f64 = 1e-12;

/// Output of [`rebalance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rebalanced {
    /// Replacement allocation table, in input order
    pub allocations: Vec<AssetAllocation>,
    /// Portfolios whose weights sum to zero
    pub degenerate: Vec<String>,
}

impl Rebalanced {
    /// The degenerate portfolios as structured errors.
    pub fn degenerate_errors(&self) -> Vec<AnalyticsError> {
        self.degenerate
            .iter()
            .map(|portfolio_id| AnalyticsError::DegenerateWeight {
                portfolio_id: portfolio_id.clone(),
            })
            .collect()
    }
}

/// Check that weights are finite, non-negative, and that no
/// `(portfolio_id, asset_id)` pair repeats.
pub fn validate_allocations(allocations: &[AssetAllocation]) -> Result<()> {
    let mut seen = HashSet::with_capacity(allocations.len());

    for row in allocations {
        if !row.asset_weight.is_finite() || row.asset_weight < 0.0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "weight of {} in {} must be a non-negative number, got {}",
                row.asset_id, row.portfolio_id, row.asset_weight
            )));
        }
        if !seen.insert((row.portfolio_id.as_str(), row.asset_id.as_str())) {
            return Err(AnalyticsError::InvalidInput(format!(
                "duplicate allocation of {} in {}",
                row.asset_id, row.portfolio_id
            )));
        }
    }

    Ok(())
}

/// Weight sum of every portfolio in the table.
pub fn weight_sums(allocations: &[AssetAllocation]) -> BTreeMap<String, f64> {
    let mut sums = BTreeMap::new();
    for row in allocations {
        *sums.entry(row.portfolio_id.clone()).or_insert(0.0) += row.asset_weight;
    }
    sums
}

/// Portfolios whose weights sum neither to one nor to zero, with their sums.
///
/// Between allocation edits and the next rebalance this is how the
/// violation of the sum-to-one invariant is surfaced.
pub fn unbalanced_portfolios(allocations: &[AssetAllocation], tolerance: f64) -> Vec<(String, f64)> {
    weight_sums(allocations)
        .into_iter()
        .filter(|(_, sum)| (sum - 1.0).abs() > tolerance && sum.abs() > tolerance)
        .collect()
}

/// Normalize weights per portfolio.
///
/// Applying this twice yields the same table as applying it once.
///
/// # Errors
/// [`AnalyticsError::InvalidInput`] for negative or non-finite weights and
/// duplicate pairs.
pub fn rebalance(allocations: &[AssetAllocation]) -> Result<Rebalanced> {
    validate_allocations(allocations)?;

    let sums = weight_sums(allocations);
    let degenerate: Vec<String> = sums
        .iter()
        .filter(|(_, sum)| **sum == 0.0)
        .map(|(portfolio_id, _)| portfolio_id.clone())
        .collect();

    let allocations = allocations
        .iter()
        .map(|row| {
            let sum = sums.get(&row.portfolio_id).copied().unwrap_or(0.0);
            let asset_weight = if sum == 0.0 || (sum - 1.0).abs() <= UNIT_SUM_TOLERANCE {
                row.asset_weight
            } else {
                row.asset_weight / sum
            };
            AssetAllocation {
                asset_weight,
                ..row.clone()
            }
        })
        .collect();

    Ok(Rebalanced {
        allocations,
        degenerate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> Vec<AssetAllocation> {
        vec![
            AssetAllocation::new("PF_01", "^GSPC", 1.0),
            AssetAllocation::new("PF_01", "^FTSE", 1.0),
            AssetAllocation::new("PF_01", "^N225", 2.0),
            AssetAllocation::new("PF_02", "^GSPC", 0.3),
            AssetAllocation::new("PF_02", "^MXX", 0.9),
        ]
    }

    #[test]
    fn test_rebalance_sums_to_one() {
        let rebalanced = rebalance(&table()).unwrap();

        for sum in weight_sums(&rebalanced.allocations).values() {
            assert_relative_eq!(*sum, 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(rebalanced.allocations[2].asset_weight, 0.5);
        assert_relative_eq!(rebalanced.allocations[3].asset_weight, 0.25);
        assert!(rebalanced.degenerate.is_empty());
    }

    #[test]
    fn test_rebalance_is_idempotent() {
        let once = rebalance(&table()).unwrap();
        let twice = rebalance(&once.allocations).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_zero_sum_portfolio_is_flagged_not_nan() {
        let mut rows = table();
        rows.push(AssetAllocation::new("PF_03", "^BSESN", 0.0));
        rows.push(AssetAllocation::new("PF_03", "^NSEI", 0.0));

        let rebalanced = rebalance(&rows).unwrap();
        assert_eq!(rebalanced.degenerate, vec!["PF_03".to_string()]);

        let pf3: Vec<f64> = rebalanced
            .allocations
            .iter()
            .filter(|r| r.portfolio_id == "PF_03")
            .map(|r| r.asset_weight)
            .collect();
        assert_eq!(pf3, vec![0.0, 0.0]);

        assert_eq!(
            rebalanced.degenerate_errors(),
            vec![AnalyticsError::DegenerateWeight {
                portfolio_id: "PF_03".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_table() {
        let rebalanced = rebalance(&[]).unwrap();
        assert!(rebalanced.allocations.is_empty());
        assert!(rebalanced.degenerate.is_empty());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let rows = vec![AssetAllocation::new("PF_01", "^GSPC", -0.5)];
        assert!(matches!(rebalance(&rows), Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let rows = vec![
            AssetAllocation::new("PF_01", "^GSPC", 0.5),
            AssetAllocation::new("PF_01", "^GSPC", 0.5),
        ];
        assert!(matches!(rebalance(&rows), Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_unbalanced_portfolios() {
        let mut rows = rebalance(&table()).unwrap().allocations;
        rows.push(AssetAllocation::new("PF_02", "^FTSE", 0.5));
        rows.push(AssetAllocation::new("PF_04", "^FTSE", 0.0));

        let flagged = unbalanced_portfolios(&rows, BALANCE_TOLERANCE);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].0, "PF_02");
        assert_relative_eq!(flagged[0].1, 1.5, epsilon = 1e-12);
    }
}
