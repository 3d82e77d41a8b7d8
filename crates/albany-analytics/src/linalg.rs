//! Symmetric eigendecomposition.
//!
//! Cyclic Jacobi rotations, sized for the small Gram matrices of the
//! attribution fit.

use crate::error::{AnalyticsError, Result};
use ndarray::{Array1, Array2};

/// Maximum number of full Jacobi sweeps.
const MAX_SWEEPS: usize = 100;

/// Off-diagonal mass, relative to the matrix norm, below which iteration stops.
const TOLERANCE: f64 = 1e-14;

/// Eigenvalues and eigenvectors of a symmetric matrix.
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues, sorted descending
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors, one per column, in the same order as `eigenvalues`
    pub eigenvectors: Array2<f64>,
}

/// Decompose a symmetric matrix as `V * diag(λ) * V^T`.
///
/// # Errors
/// [`AnalyticsError::InvalidInput`] for non-square matrices or non-finite entries.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<EigenDecomposition> {
    let (n, m) = matrix.dim();
    if n != m {
        return Err(AnalyticsError::InvalidInput(format!(
            "eigendecomposition needs a square matrix, got {n}x{m}"
        )));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::InvalidInput(
            "eigendecomposition input contains non-finite values".to_string(),
        ));
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale = matrix.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    for _sweep in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a) <= TOLERANCE * scale {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                rotate(&mut a, &mut v, p, q);
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = order.iter().map(|&i| a[[i, i]]).collect();
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (new_idx, &old_idx) in order.iter().enumerate() {
        eigenvectors.column_mut(new_idx).assign(&v.column(old_idx));
    }

    Ok(EigenDecomposition {
        eigenvalues,
        eigenvectors,
    })
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += a[[i, j]] * a[[i, j]];
        }
    }
    (2.0 * sum).sqrt()
}

/// Zero `a[p, q]` with one rotation, accumulating it into `v`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let apq = a[[p, q]];
    if apq == 0.0 {
        return;
    }

    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    let n = a.nrows();
    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = c * akp - s * akq;
        a[[k, q]] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = c * apk - s * aqk;
        a[[q, k]] = s * apk + c * aqk;
    }
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diagonal_matrix() {
        let m = Array2::from_shape_vec((3, 3), vec![2.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 1.0])
            .unwrap();
        let decomp = symmetric_eigen(&m).unwrap();
        assert_relative_eq!(decomp.eigenvalues[0], 5.0);
        assert_relative_eq!(decomp.eigenvalues[1], 2.0);
        assert_relative_eq!(decomp.eigenvalues[2], 1.0);
    }

    #[test]
    fn test_known_2x2() {
        // eigenvalues of [[2, 1], [1, 2]] are 3 and 1
        let m = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 1.0, 2.0]).unwrap();
        let decomp = symmetric_eigen(&m).unwrap();
        assert_relative_eq!(decomp.eigenvalues[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(decomp.eigenvalues[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reconstruction() {
        let m = Array2::from_shape_vec(
            (4, 4),
            vec![
                4.0, 1.0, 0.5, -0.3, 1.0, 3.0, 0.2, 0.1, 0.5, 0.2, 2.0, 0.7, -0.3, 0.1, 0.7, 1.5,
            ],
        )
        .unwrap();
        let decomp = symmetric_eigen(&m).unwrap();

        let lambda = Array2::from_diag(&decomp.eigenvalues);
        let rebuilt = decomp
            .eigenvectors
            .dot(&lambda)
            .dot(&decomp.eigenvectors.t());
        for (a, b) in rebuilt.iter().zip(m.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10);
        }

        let identity = decomp.eigenvectors.t().dot(&decomp.eigenvectors);
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(identity[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_non_square_rejected() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(symmetric_eigen(&m).is_err());
    }
}
