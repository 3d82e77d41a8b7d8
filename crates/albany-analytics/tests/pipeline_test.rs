//! End-to-end analytics: raw observations to attribution.

use albany_analytics::change::factor_pct_change;
use albany_analytics::correlation::rolling_correlation;
use albany_analytics::normalize::{interpolate_yearly, monthly_mean};
use albany_analytics::rebalance::rebalance;
use albany_analytics::returns::calc_returns;
use albany_analytics::{
    AllocatedPrice, AssetAllocation, AttributionEngine, FactorKey, FactorObservation, FactorPanel,
    Month, MonthRange,
};
use chrono::NaiveDate;

fn range(start: &str, end: &str) -> MonthRange {
    MonthRange::new(start.parse().unwrap(), end.parse().unwrap()).unwrap()
}

/// Two trading days per month with a drifting price.
fn daily_prices(base: f64, drift: f64, months: u32) -> Vec<(NaiveDate, f64)> {
    (0..months)
        .flat_map(|m| {
            let year = 2010 + (m / 12) as i32;
            let month = m % 12 + 1;
            let level = base * (1.0 + drift).powi(m as i32) * (1.0 + 0.02 * ((m % 5) as f64 - 2.0));
            [
                (NaiveDate::from_ymd_opt(year, month, 3).unwrap(), level * 0.99),
                (NaiveDate::from_ymd_opt(year, month, 20).unwrap(), level * 1.01),
            ]
        })
        .collect()
}

fn factor_levels(factor: &str, yearly: &[(i32, Option<f64>)], window: &MonthRange) -> Vec<FactorObservation> {
    interpolate_yearly(factor, yearly, window)
        .unwrap()
        .into_iter()
        .map(|(date, value)| FactorObservation {
            factor_id: factor.to_string(),
            region_id: "USA".to_string(),
            date,
            value,
        })
        .collect()
}

#[test]
fn test_full_analytics_workflow() {
    let grid = range("2009-01", "2012-12");

    let allocations = rebalance(&[
        AssetAllocation::new("PF_01", "^GSPC", 3.0),
        AssetAllocation::new("PF_01", "^FTSE", 1.0),
    ])
    .unwrap()
    .allocations;
    assert!((allocations[0].asset_weight - 0.75).abs() < 1e-12);

    let mut joined: Vec<AllocatedPrice> = Vec::new();
    for (ticker, base, drift) in [("^GSPC", 1100.0, 0.01), ("^FTSE", 5200.0, 0.004)] {
        let weight = allocations
            .iter()
            .find(|a| a.asset_id == ticker)
            .unwrap()
            .asset_weight;
        for (date, price) in monthly_mean(ticker, &daily_prices(base, drift, 36), &grid).unwrap() {
            joined.push(AllocatedPrice {
                portfolio_id: "PF_01".to_string(),
                asset_id: ticker.to_string(),
                date,
                asset_weight: weight,
                asset_price: Some(price),
            });
        }
    }

    let tables = calc_returns(&joined).unwrap();
    assert_eq!(tables.portfolio.len(), 36);
    assert!(tables.portfolio[0].pct_return.is_none());
    assert!(tables.portfolio[1..].iter().all(|r| r.pct_return.is_some()));

    let returns: Vec<(Month, Option<f64>)> = tables
        .portfolio
        .iter()
        .map(|r| (r.date, r.pct_return))
        .collect();

    let mut observations = factor_levels(
        "GDP",
        &[(2009, Some(100.0)), (2010, Some(103.0)), (2011, Some(101.0)), (2012, Some(106.0))],
        &grid,
    );
    observations.extend(factor_levels(
        "CPI",
        &[(2009, Some(2.0)), (2010, None), (2011, Some(3.1)), (2012, Some(2.4))],
        &grid,
    ));
    // a factor that only exists after the attribution window
    observations.extend(factor_levels(
        "RATES",
        &[(2013, Some(1.0)), (2014, Some(2.0))],
        &range("2013-01", "2014-12"),
    ));

    let gdp: Vec<(Month, f64)> = observations
        .iter()
        .filter(|o| o.factor_id == "GDP")
        .map(|o| (o.date, o.value))
        .collect();
    let correlation = rolling_correlation("PF_01 ~ GDP/USA", &returns, &factor_pct_change(&gdp), 12).unwrap();
    assert_eq!(correlation.window, 12);
    assert!(correlation.points.iter().take(11).all(|p| p.correlation.is_none()));
    assert!(correlation.summary.observations > 0);
    assert!(
        correlation
            .points
            .iter()
            .flat_map(|p| p.correlation)
            .all(|c| (-1.0..=1.0).contains(&c))
    );

    let panel = FactorPanel::from_observations(&observations).unwrap();
    let engine = AttributionEngine::default();
    let attribution = engine
        .attribute(&returns, &panel, range("2010-01", "2012-12"))
        .unwrap();

    assert_eq!(attribution.dropped, vec![FactorKey::new("RATES", "USA")]);
    assert_eq!(attribution.coefficients.len(), 2);
    assert_eq!(
        attribution.positive.len() + attribution.negative.len(),
        attribution.coefficients.len()
    );
    assert!(engine.config().alphas.contains(&attribution.alpha));

    let json = serde_json::to_string(&attribution).unwrap();
    assert!(json.contains("\"2010-01..2012-12\"") || json.contains("\"start\":\"2010-01\""));
}
