//! Ridge regression with leave-one-out alpha selection.
//!
//! The intercept is left unpenalized by centering both sides. For each
//! candidate alpha the leave-one-out residuals come from the hat matrix
//! diagonal in closed form, so a single eigendecomposition serves every
//! candidate:
//!
//! ```text
//! e_i = (y_i - ŷ_i) / (1 - 1/n - h_i)
//! ```
//!
//! The decomposition runs on `XᵀX` when there are at least as many rows as
//! columns and on `XXᵀ` otherwise.

use crate::error::{AnalyticsError, Result};
use crate::linalg::symmetric_eigen;
use ndarray::{Array1, Array2, Axis};

/// Denominators this close to zero make a candidate's LOO error infinite.
const LEVERAGE_EPSILON: f64 = 1e-12;

/// Fitted ridge model.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    /// Selected regularization strength
    pub alpha: f64,
    /// Unpenalized intercept
    pub intercept: f64,
    /// One coefficient per predictor column
    pub coefficients: Array1<f64>,
    /// Mean squared leave-one-out error at the selected alpha
    pub loo_mse: f64,
}

impl RidgeFit {
    /// Predict targets for the rows of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }
}

/// Per-candidate solver built from one eigendecomposition.
enum Solver {
    /// `XᵀX = V Λ Vᵀ`; `projected = X V`, `vty = Vᵀ Xᵀ y`
    Primal {
        eigenvalues: Array1<f64>,
        vectors: Array2<f64>,
        projected: Array2<f64>,
        vty: Array1<f64>,
    },
    /// `XXᵀ = Q Λ Qᵀ`; `qty = Qᵀ y`
    Dual {
        eigenvalues: Array1<f64>,
        vectors: Array2<f64>,
        qty: Array1<f64>,
    },
}

impl Solver {
    fn new(xc: &Array2<f64>, yc: &Array1<f64>) -> Result<Self> {
        let (n, p) = xc.dim();
        if p <= n {
            let decomp = symmetric_eigen(&xc.t().dot(xc))?;
            let vectors = decomp.eigenvectors;
            Ok(Self::Primal {
                eigenvalues: decomp.eigenvalues.mapv(|l| l.max(0.0)),
                projected: xc.dot(&vectors),
                vty: vectors.t().dot(&xc.t().dot(yc)),
                vectors,
            })
        } else {
            let decomp = symmetric_eigen(&xc.dot(&xc.t()))?;
            Ok(Self::Dual {
                eigenvalues: decomp.eigenvalues.mapv(|l| l.max(0.0)),
                qty: decomp.eigenvectors.t().dot(yc),
                vectors: decomp.eigenvectors,
            })
        }
    }

    /// Coefficients and hat-matrix diagonal (centered part) for one alpha.
    fn solve(&self, xc: &Array2<f64>, alpha: f64) -> (Array1<f64>, Array1<f64>) {
        match self {
            Self::Primal {
                eigenvalues,
                vectors,
                projected,
                vty,
            } => {
                let shrink = eigenvalues.mapv(|l| 1.0 / (l + alpha));
                let coef = vectors.dot(&(vty * &shrink));
                let leverage = (projected * projected).dot(&shrink);
                (coef, leverage)
            }
            Self::Dual {
                eigenvalues,
                vectors,
                qty,
            } => {
                let dual = vectors.dot(&(qty / &eigenvalues.mapv(|l| l + alpha)));
                let coef = xc.t().dot(&dual);
                let ratio = eigenvalues.mapv(|l| l / (l + alpha));
                let leverage = (vectors * vectors).dot(&ratio);
                (coef, leverage)
            }
        }
    }
}

/// Fit ridge regression of `y` on `x`, choosing alpha by leave-one-out error.
///
/// Ties keep the earliest candidate.
///
/// # Errors
/// - [`AnalyticsError::InvalidInput`] on shape mismatches, an empty or
///   non-positive candidate list, or non-finite data
/// - [`AnalyticsError::InsufficientData`] with fewer than two rows
pub fn ridge_cv(x: &Array2<f64>, y: &Array1<f64>, alphas: &[f64]) -> Result<RidgeFit> {
    let (n, p) = x.dim();
    if y.len() != n {
        return Err(AnalyticsError::InvalidInput(format!(
            "ridge target has {} rows, predictors have {n}",
            y.len()
        )));
    }
    if alphas.is_empty() || alphas.iter().any(|a| !a.is_finite() || *a <= 0.0) {
        return Err(AnalyticsError::InvalidInput(format!(
            "ridge alphas must be positive and finite, got {alphas:?}"
        )));
    }
    if p == 0 {
        return Err(AnalyticsError::insufficient("ridge predictors", 1, 0));
    }
    if n < 2 {
        return Err(AnalyticsError::insufficient("ridge observations", 2, n));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AnalyticsError::InvalidInput(
            "ridge inputs contain non-finite values".to_string(),
        ));
    }

    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| AnalyticsError::insufficient("ridge observations", 2, 0))?;
    let y_mean = y
        .mean()
        .ok_or_else(|| AnalyticsError::insufficient("ridge observations", 2, 0))?;
    let xc = x - &x_mean;
    let yc = y - y_mean;

    let solver = Solver::new(&xc, &yc)?;
    let base = 1.0 - 1.0 / n as f64;

    let mut best: Option<(f64, Array1<f64>, f64)> = None;
    for &alpha in alphas {
        let (coef, leverage) = solver.solve(&xc, alpha);
        let residuals = &yc - &xc.dot(&coef);

        let mut sum_sq = 0.0;
        for (r, h) in residuals.iter().zip(leverage.iter()) {
            let denom = base - h;
            if denom <= LEVERAGE_EPSILON {
                sum_sq = f64::INFINITY;
                break;
            }
            sum_sq += (r / denom).powi(2);
        }
        let mse = sum_sq / n as f64;

        let improves = best.as_ref().is_none_or(|(_, _, best_mse)| mse < *best_mse);
        if improves {
            best = Some((alpha, coef, mse));
        }
    }

    let (alpha, coefficients, loo_mse) =
        best.ok_or_else(|| AnalyticsError::InvalidInput("no ridge alpha evaluated".to_string()))?;
    let intercept = y_mean - x_mean.dot(&coefficients);

    Ok(RidgeFit {
        alpha,
        intercept,
        coefficients,
        loo_mse,
    })
}
