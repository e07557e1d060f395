//! Polynomial expansion → standardization → cross-validated ridge.
//!
//! [`RidgePipeline::fit`] sees training rows only; [`FittedPipeline::predict`]
//! replays the same transformation on any later rows.

pub mod cv;
pub mod poly;
pub mod ridge;
pub mod scaler;

use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis};
use tracing::{info, warn};

use crate::config::{DegeneratePolicy, PipelineConfig};
use crate::error::{PipelineError, Result};
use cv::{AlphaScore, TimeSeriesFolds, score_alphas, select_alpha};
use poly::PolynomialFeatures;
use ridge::Ridge;
use scaler::{StandardScaler, constant_columns};

/// Untrained pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgePipeline {
    pub degree: usize,
    pub alphas: Vec<f64>,
    pub cv_folds: usize,
    pub degenerate: DegeneratePolicy,
}

impl RidgePipeline {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            degree: config.degree,
            alphas: config.alphas.clone(),
            cv_folds: config.cv_folds,
            degenerate: config.degenerate,
        }
    }

    /// Fits on the training design matrix.
    ///
    /// `dates` gives each row's service date; cross-validation folds are cut
    /// over the rows in date order regardless of their order in `x`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DegenerateFeature`] when expanded columns are
    ///   constant and the policy is `Fail`, or when no column survives.
    /// - [`PipelineError::TooFewTrainingRows`] when there are too few rows
    ///   for the folds.
    /// - [`PipelineError::Numerical`] when a solve fails.
    #[tracing::instrument(skip_all, fields(rows = x.nrows(), inputs = x.ncols(), degree = self.degree))]
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        dates: &[NaiveDate],
        input_names: &[String],
    ) -> Result<FittedPipeline> {
        if x.nrows() == 0 {
            return Err(PipelineError::TooFewTrainingRows(
                "training set is empty".into(),
            ));
        }
        if x.nrows() != y.len() || x.nrows() != dates.len() {
            return Err(PipelineError::Numerical(format!(
                "training inputs disagree: {} rows, {} targets, {} dates",
                x.nrows(),
                y.len(),
                dates.len()
            )));
        }

        let poly = PolynomialFeatures::new(self.degree, x.ncols());
        let expanded = poly.transform(x);
        let names = poly.feature_names(input_names);

        let constant = constant_columns(&expanded);
        let dropped_columns: Vec<String> = constant.iter().map(|&j| names[j].clone()).collect();
        if !dropped_columns.is_empty() {
            if self.degenerate == DegeneratePolicy::Fail {
                return Err(PipelineError::DegenerateFeature {
                    columns: dropped_columns,
                });
            }
            warn!(
                count = dropped_columns.len(),
                columns = %dropped_columns.join(", "),
                "Dropping zero-variance feature columns"
            );
        }

        let kept: Vec<usize> = (0..expanded.ncols())
            .filter(|j| constant.binary_search(j).is_err())
            .collect();
        if kept.is_empty() {
            return Err(PipelineError::DegenerateFeature {
                columns: dropped_columns,
            });
        }
        let feature_names: Vec<String> = kept.iter().map(|&j| names[j].clone()).collect();

        let reduced = expanded.select(Axis(1), &kept);
        let scaler = StandardScaler::fit(&reduced, &feature_names)?;
        let z = scaler.transform(&reduced);

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        let z_chrono = z.select(Axis(0), &order);
        let y_chrono = y.select(Axis(0), &order);

        let folds = TimeSeriesFolds::new(self.cv_folds).split(order.len())?;
        let cv_scores = score_alphas(&z_chrono, &y_chrono, &self.alphas, &folds)?;
        let best = select_alpha(&cv_scores).ok_or_else(|| {
            PipelineError::Numerical("no ridge penalty produced a finite validation error".into())
        })?;
        for score in &cv_scores {
            info!(alpha = score.alpha, mean_mse = score.mean_mse, "Cross-validation score");
        }

        let ridge = Ridge::fit(z.view(), y.view(), best.alpha)?;
        info!(
            alpha = ridge.alpha,
            features = feature_names.len(),
            dropped = dropped_columns.len(),
            "Ridge pipeline fitted"
        );

        Ok(FittedPipeline {
            poly,
            kept,
            feature_names,
            dropped_columns,
            scaler,
            ridge,
            cv_scores,
        })
    }
}

/// A fitted transformation plus regression, ready to predict.
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    poly: PolynomialFeatures,
    kept: Vec<usize>,
    feature_names: Vec<String>,
    dropped_columns: Vec<String>,
    scaler: StandardScaler,
    ridge: Ridge,
    cv_scores: Vec<AlphaScore>,
}

impl FittedPipeline {
    /// Raw real-valued predictions for rows encoded against the training schema.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.poly.n_inputs() {
            return Err(PipelineError::Numerical(format!(
                "expected {} input columns, got {}",
                self.poly.n_inputs(),
                x.ncols()
            )));
        }
        let expanded = self.poly.transform(x).select(Axis(1), &self.kept);
        let z = self.scaler.transform(&expanded);
        Ok(self.ridge.predict(z.view()).to_vec())
    }

    pub fn alpha(&self) -> f64 {
        self.ridge.alpha
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    pub fn cv_scores(&self) -> &[AlphaScore] {
        &self.cv_scores
    }
}
