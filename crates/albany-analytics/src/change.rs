//! Period-over-period changes.
//!
//! Prices use [`pct_change`] and [`log_change`], which are undefined whenever
//! the ratio is not a finite positive number. Factor levels use
//! [`factor_pct_change`], which keeps the signed infinity produced by a zero
//! prior value so the attribution engine can cap it.

use crate::calendar::Month;

/// `current / previous - 1`, or `None` when either side is missing, non-finite or
/// the previous value is zero.
pub fn pct_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let (previous, current) = (previous?, current?);
    if !previous.is_finite() || !current.is_finite() || previous == 0.0 {
        return None;
    }
    Some(current / previous - 1.0)
}

/// `ln(current / previous)`, or `None` when the ratio is missing or not positive.
pub fn log_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let ratio = pct_change(previous, current)? + 1.0;
    (ratio > 0.0).then(|| ratio.ln())
}

/// Percentage change of a factor level.
///
/// A zero previous value yields `±inf` (by the sign of the current value), and
/// `0 / 0` yields `None`.
pub fn factor_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let (previous, current) = (previous?, current?);
    if !previous.is_finite() || !current.is_finite() {
        return None;
    }
    if previous == 0.0 {
        return match current {
            c if c > 0.0 => Some(f64::INFINITY),
            c if c < 0.0 => Some(f64::NEG_INFINITY),
            _ => None,
        };
    }
    Some(current / previous - 1.0)
}

/// Month-over-month factor change for a series sorted by month.
///
/// The first month, and any month whose predecessor is absent from the
/// series, has no change.
pub fn factor_pct_change(series: &[(Month, f64)]) -> Vec<(Month, Option<f64>)> {
    let mut out = Vec::with_capacity(series.len());
    let mut previous: Option<(Month, f64)> = None;

    for &(month, value) in series {
        let change = previous
            .filter(|(prev_month, _)| *prev_month == month.pred())
            .and_then(|(_, prev_value)| factor_change(Some(prev_value), Some(value)));
        out.push((month, change));
        previous = Some((month, value));
    }

    out
}
