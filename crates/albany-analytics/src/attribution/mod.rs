//! Factor attribution.
//!
//! Regresses a portfolio's monthly returns on a panel of factor changes over
//! a chosen window and ranks the factors by their ridge coefficients.
//!
//! The pipeline, applied to a single window:
//!
//! 1. restrict both sides to the window and drop factor columns with no values
//! 2. inner-join on month, dropping months where the return is missing
//! 3. backward-fill then forward-fill the remaining predictor gaps
//! 4. replace infinite changes with a finite sentinel
//! 5. fit ridge regression with the alpha chosen by leave-one-out error
//!
//! Coefficients describe association only.

mod panel;
pub mod ridge;

pub use panel::FactorPanel;
pub use ridge::{RidgeFit, ridge_cv};

use crate::calendar::{Month, MonthRange};
use crate::error::{AnalyticsError, Result};
use crate::types::FactorKey;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Candidate ridge penalties (default: 0.1, 1, 10)
    pub alphas: Vec<f64>,

    /// Minimum number of aligned months required to fit (default: 3)
    pub min_observations: usize,

    /// Magnitude substituted for infinite factor changes (default: 999)
    pub infinity_sentinel: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            alphas: vec![0.1, 1.0, 10.0],
            min_observations: 3,
            infinity_sentinel: 999.0,
        }
    }
}

/// Coefficient of one factor × region key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorCoefficient {
    /// Factor and region
    pub key: FactorKey,
    /// Ridge coefficient
    pub coefficient: f64,
}

/// Result of one attribution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Window the model was fitted on
    pub window: MonthRange,
    /// Selected ridge penalty
    pub alpha: f64,
    /// Fitted intercept
    pub intercept: f64,
    /// Number of aligned months used in the fit
    pub observations: usize,
    /// One coefficient per retained key, in panel order
    pub coefficients: Vec<FactorCoefficient>,
    /// Coefficients `>= 0`, largest first
    pub positive: Vec<FactorCoefficient>,
    /// Coefficients `< 0`, most negative first
    pub negative: Vec<FactorCoefficient>,
    /// Keys dropped because they had no values in the window
    pub dropped: Vec<FactorKey>,
}

impl Attribution {
    /// Coefficient of `key`, if it was retained.
    pub fn coefficient(&self, key: &FactorKey) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.coefficient)
    }
}

/// Ridge-based factor attribution engine
#[derive(Debug, Default)]
pub struct AttributionEngine {
    config: AttributionConfig,
}

impl AttributionEngine {
    /// Create an engine with the given configuration
    pub const fn new(config: AttributionConfig) -> Self {
        Self { config }
    }

    /// Engine configuration
    pub const fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Attribute `target` returns to the factors of `panel` over `window`.
    ///
    /// Read-only: inputs are never modified.
    ///
    /// # Errors
    /// - [`AnalyticsError::Alignment`] when target and panel share no month
    /// - [`AnalyticsError::InsufficientData`] when no factor column survives or
    ///   fewer than `min_observations` months align
    /// - [`AnalyticsError::InvalidInput`] for an invalid alpha list
    pub fn attribute(
        &self,
        target: &[(Month, Option<f64>)],
        panel: &FactorPanel,
        window: MonthRange,
    ) -> Result<Attribution> {
        let entity = format!("attribution window {window}");
        let panel = panel.restrict(&window);

        let y: BTreeMap<Month, f64> = target
            .iter()
            .filter(|(month, _)| window.contains(month))
            .filter_map(|&(month, value)| value.filter(|v| v.is_finite()).map(|v| (month, v)))
            .collect();

        let mut dropped = Vec::new();
        let mut columns: Vec<(FactorKey, &[Option<f64>])> = Vec::new();
        for (index, key) in panel.keys().iter().enumerate() {
            let Some(values) = panel.column(index) else {
                continue;
            };
            if values.iter().all(Option::is_none) {
                dropped.push(key.clone());
            } else {
                columns.push((key.clone(), values));
            }
        }
        if columns.is_empty() {
            return Err(AnalyticsError::insufficient(entity, 1, 0));
        }

        let rows: Vec<(usize, Month, f64)> = panel
            .dates()
            .iter()
            .enumerate()
            .filter_map(|(i, month)| y.get(month).map(|&v| (i, *month, v)))
            .collect();

        if rows.is_empty() {
            return Err(AnalyticsError::Alignment {
                target: format!("returns in {window} ({} months)", y.len()),
                predictors: format!("factor panel in {window} ({} months)", panel.n_dates()),
            });
        }

        let mut aligned: Vec<(FactorKey, Vec<f64>)> = Vec::with_capacity(columns.len());
        for (key, values) in columns {
            let picked: Vec<Option<f64>> = rows.iter().map(|&(i, _, _)| values[i]).collect();
            match fill_gaps(&picked) {
                Some(filled) => aligned.push((
                    key,
                    filled
                        .into_iter()
                        .map(|v| replace_infinite(v, self.config.infinity_sentinel))
                        .collect(),
                )),
                None => dropped.push(key),
            }
        }

        if aligned.is_empty() {
            return Err(AnalyticsError::insufficient(entity, 1, 0));
        }
        if rows.len() < self.config.min_observations {
            return Err(AnalyticsError::insufficient(
                entity,
                self.config.min_observations,
                rows.len(),
            ));
        }

        let x = Array2::from_shape_fn((rows.len(), aligned.len()), |(r, c)| aligned[c].1[r]);
        let y = Array1::from_iter(rows.iter().map(|&(_, _, v)| v));
        let fit = ridge_cv(&x, &y, &self.config.alphas)?;

        let coefficients: Vec<FactorCoefficient> = aligned
            .into_iter()
            .zip(fit.coefficients.iter())
            .map(|((key, _), &coefficient)| FactorCoefficient { key, coefficient })
            .collect();

        let (mut positive, mut negative): (Vec<_>, Vec<_>) = coefficients
            .iter()
            .cloned()
            .partition(|c| c.coefficient >= 0.0);
        positive.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));
        negative.sort_by(|a, b| a.coefficient.total_cmp(&b.coefficient));
        dropped.sort();

        Ok(Attribution {
            window,
            alpha: fit.alpha,
            intercept: fit.intercept,
            observations: rows.len(),
            coefficients,
            positive,
            negative,
            dropped,
        })
    }
}

/// Backward-fill then forward-fill; `None` when the column has no value at all.
fn fill_gaps(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let mut out: Vec<Option<f64>> = values.to_vec();

    let mut next = None;
    for value in out.iter_mut().rev() {
        if value.is_some() {
            next = *value;
        } else {
            *value = next;
        }
    }

    let mut previous = None;
    for value in &mut out {
        if value.is_some() {
            previous = *value;
        } else {
            *value = previous;
        }
    }

    out.into_iter().collect()
}

fn replace_infinite(value: f64, sentinel: f64) -> f64 {
    if value == f64::INFINITY {
        sentinel
    } else if value == f64::NEG_INFINITY {
        -sentinel
    } else {
        value
    }
}
