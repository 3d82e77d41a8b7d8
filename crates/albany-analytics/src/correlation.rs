//! Rolling correlation between portfolio returns and a factor.
//!
//! The factor side uses month-over-month percentage change rather than log
//! change, which stays defined when a factor level crosses zero.

use crate::calendar::{Month, describe_span};
use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest supported rolling window, in months.
pub const MAX_WINDOW: usize = 60;

/// Correlation at the end of one trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPoint {
    /// Last month of the window
    pub date: Month,
    /// Pearson correlation; `None` until a full window of finite values exists
    pub correlation: Option<f64>,
}

/// Summary statistics over the defined correlation values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    /// Mean correlation
    pub mean: Option<f64>,
    /// Sample standard deviation of the correlation
    pub std_dev: Option<f64>,
    /// Number of defined correlation values
    pub observations: usize,
}

impl CorrelationSummary {
    /// Summarize a set of correlation values, skipping missing ones.
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let values: Vec<f64> = values.into_iter().flatten().collect();
        let n = values.len();
        let mean = (n > 0).then(|| values.iter().sum::<f64>() / n as f64);
        let std_dev = mean.filter(|_| n > 1).map(|m| {
            let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });

        Self {
            mean,
            std_dev,
            observations: n,
        }
    }
}

/// Rolling correlation series together with its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingCorrelation {
    /// Window length in months
    pub window: usize,
    /// One point per aligned month
    pub points: Vec<CorrelationPoint>,
    /// Statistics over the defined points
    pub summary: CorrelationSummary,
}

/// Pearson correlation coefficient.
///
/// Returns `None` when the slices differ in length, hold fewer than two
/// values, contain a non-finite value, or either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 || x.iter().chain(y).any(|v| !v.is_finite()) {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

/// Rolling Pearson correlation over trailing windows of `window` aligned months.
///
/// The two series are inner-joined on month. The first `window - 1` aligned
/// months carry no value, and neither does any window containing a missing or
/// non-finite observation.
///
/// # Errors
/// - [`AnalyticsError::InvalidWindow`] unless `1 <= window <= MAX_WINDOW`
/// - [`AnalyticsError::Alignment`] when the series share no month
/// - [`AnalyticsError::InsufficientData`] when fewer than `window` months align
pub fn rolling_correlation(
    entity: &str,
    returns: &[(Month, Option<f64>)],
    factor_changes: &[(Month, Option<f64>)],
    window: usize,
) -> Result<RollingCorrelation> {
    if !(1..=MAX_WINDOW).contains(&window) {
        return Err(AnalyticsError::InvalidWindow {
            window,
            max: MAX_WINDOW,
        });
    }

    let factor: BTreeMap<Month, Option<f64>> = factor_changes.iter().copied().collect();
    let mut aligned: Vec<(Month, Option<f64>, Option<f64>)> = returns
        .iter()
        .filter_map(|&(month, r)| factor.get(&month).map(|&f| (month, r, f)))
        .collect();
    aligned.sort_by_key(|(month, _, _)| *month);

    if aligned.is_empty() {
        let mut target: Vec<Month> = returns.iter().map(|(m, _)| *m).collect();
        target.sort();
        return Err(AnalyticsError::Alignment {
            target: format!("returns {}", describe_span(&target)),
            predictors: format!("factor {}", describe_span(&factor.keys().copied().collect::<Vec<_>>())),
        });
    }
    if aligned.len() < window {
        return Err(AnalyticsError::insufficient(entity, window, aligned.len()));
    }

    let points: Vec<CorrelationPoint> = aligned
        .iter()
        .enumerate()
        .map(|(i, &(date, _, _))| {
            let correlation = (i + 1 >= window)
                .then(|| &aligned[i + 1 - window..=i])
                .and_then(|slice| {
                    let x: Option<Vec<f64>> = slice.iter().map(|(_, r, _)| *r).collect();
                    let y: Option<Vec<f64>> = slice.iter().map(|(_, _, f)| *f).collect();
                    pearson(&x?, &y?)
                });
            CorrelationPoint { date, correlation }
        })
        .collect();

    let summary = CorrelationSummary::from_values(points.iter().map(|p| p.correlation));

    Ok(RollingCorrelation {
        window,
        points,
        summary,
    })
}
