//! L2-regularized least squares with an unpenalized intercept.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Ridge {
    pub alpha: f64,
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl Ridge {
    /// Fits `y ≈ Xβ + b` minimizing `||y - Xβ - b||² + α||β||²`.
    ///
    /// Columns and target are centered on the fitting rows. The primal normal
    /// equations `(XᵀX + αI)β = Xᵀy` are solved when there are no more
    /// features than rows; otherwise the kernel form `(XXᵀ + αI)c = y`,
    /// `β = Xᵀc`.
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, alpha: f64) -> Result<Self> {
        let (n, p) = x.dim();
        if n == 0 || y.len() != n {
            return Err(PipelineError::Numerical(format!(
                "ridge fit needs matching non-empty inputs, got {n} rows and {} targets",
                y.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Numerical("empty design matrix".into()))?;
        let y_mean = y.sum() / n as f64;
        let xc = &x - &x_mean;
        let yc = y.mapv(|v| v - y_mean);

        let coefficients = if p <= n {
            let mut gram = xc.t().dot(&xc);
            add_to_diagonal(&mut gram, alpha);
            let rhs = xc.t().dot(&yc);
            cholesky_solve(&gram, &rhs)?
        } else {
            let mut kernel = xc.dot(&xc.t());
            add_to_diagonal(&mut kernel, alpha);
            let dual = cholesky_solve(&kernel, &yc)?;
            xc.t().dot(&dual)
        };

        let intercept = y_mean - x_mean.dot(&coefficients);
        Ok(Self {
            alpha,
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }
}

fn add_to_diagonal(m: &mut Array2<f64>, value: f64) {
    for d in m.diag_mut() {
        *d += value;
    }
}

/// Solves the symmetric positive-definite system `a · x = b`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let matrix = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    let rhs = DVector::from_iterator(n, b.iter().copied());

    let chol = matrix.cholesky().ok_or_else(|| {
        PipelineError::Numerical(format!(
            "normal equations ({n}×{n}) are not positive definite"
        ))
    })?;
    let solution = chol.solve(&rhs);

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Numerical(
            "ridge solution contains non-finite coefficients".into(),
        ));
    }
    Ok(solution.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_linear_relationship_with_small_alpha() {
        // y = 2a - 3b + 5
        let x = array![
            [1.0, 0.0],
            [2.0, 1.0],
            [3.0, 1.0],
            [4.0, 3.0],
            [5.0, 2.0],
            [6.0, 5.0]
        ];
        let y = x.map_axis(Axis(1), |r| 2.0 * r[0] - 3.0 * r[1] + 5.0);

        let model = Ridge::fit(x.view(), y.view(), 1e-8).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-5);
        assert!((model.coefficients[1] + 3.0).abs() < 1e-5);
        assert!((model.intercept - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_feature_closed_form() {
        // centered x = [-1, 0, 1], centered y = [-2, 0, 2]
        // beta = Σxy / (Σx² + α) = 4 / (2 + 2) = 1
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 3.0, 5.0];

        let model = Ridge::fit(x.view(), y.view(), 2.0).unwrap();
        assert!((model.coefficients[0] - 1.0).abs() < 1e-12);
        assert!((model.intercept - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_form_matches_primal() {
        let x = array![[1.0, 2.0, 0.5], [0.0, 1.0, 1.5], [2.0, 0.0, 1.0]];
        let y = array![1.0, 2.0, 0.5];

        // 3 features, 3 rows: primal
        let primal = Ridge::fit(x.view(), y.view(), 0.7).unwrap();
        // drop a row: 3 features, 2 rows, kernel form
        let kernel = Ridge::fit(x.slice(ndarray::s![..2, ..]), y.slice(ndarray::s![..2]), 0.7)
            .unwrap();
        let preds = kernel.predict(x.slice(ndarray::s![..2, ..]));
        assert_eq!(preds.len(), 2);
        assert!(primal.coefficients.iter().all(|c| c.is_finite()));

        // cross-check the kernel fit against the primal solve on the same rows
        let x2 = x.slice(ndarray::s![..2, ..]);
        let y2 = y.slice(ndarray::s![..2]);
        let xm = x2.mean_axis(Axis(0)).unwrap();
        let xc = &x2 - &xm;
        let ym = y2.sum() / 2.0;
        let yc = y2.mapv(|v| v - ym);
        let mut gram = xc.t().dot(&xc);
        add_to_diagonal(&mut gram, 0.7);
        let beta = cholesky_solve(&gram, &xc.t().dot(&yc)).unwrap();
        for (a, b) in beta.iter().zip(kernel.coefficients.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_empty_rows_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(
            Ridge::fit(x.view(), y.view(), 1.0),
            Err(PipelineError::Numerical(_))
        ));
    }
}
