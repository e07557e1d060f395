//! Column standardization fitted on training rows.

use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};

/// Indices of columns whose values are all identical.
pub fn constant_columns(x: &Array2<f64>) -> Vec<usize> {
    x.axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, col)| match col.first() {
            Some(first) => col.iter().all(|v| v == first),
            None => true,
        })
        .map(|(j, _)| j)
        .collect()
}

/// Centers each column to zero mean and scales it to unit population
/// variance.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// # Errors
    ///
    /// [`PipelineError::DegenerateFeature`] naming every column whose
    /// standard deviation is zero or not finite.
    pub fn fit(x: &Array2<f64>, names: &[String]) -> Result<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Numerical("cannot standardize zero rows".into()))?;
        let scale = x.std_axis(Axis(0), 0.0);

        let degenerate: Vec<String> = scale
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_finite() || **s <= 0.0)
            .map(|(j, _)| names.get(j).cloned().unwrap_or_else(|| format!("x{j}")))
            .collect();
        if !degenerate.is_empty() {
            return Err(PipelineError::DegenerateFeature {
                columns: degenerate,
            });
        }

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}
