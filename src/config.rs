//! Run configuration for the forecasting pipeline.
//!
//! [`PipelineConfig::default`] carries the fixed values the MBTA model was
//! tuned with; the CLI overrides any of them from flags or environment.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Where the holiday calendar comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidaySource {
    /// Built-in US federal calendar for the years present in the data.
    UsFederal,
    /// CSV file with a `date` column.
    File(PathBuf),
}

/// What to do with feature columns that are constant over the training rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Remove them from the model and log a warning.
    Drop,
    /// Abort the run.
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub report: Option<PathBuf>,
    /// Last service date (inclusive) used for training.
    pub cutoff: NaiveDate,
    pub eval_start: NaiveDate,
    pub eval_end: NaiveDate,
    pub alphas: Vec<f64>,
    pub degree: usize,
    pub roll_window: usize,
    pub cv_folds: usize,
    pub holidays: HolidaySource,
    pub degenerate: DegeneratePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/processed/merged_mbta_weather.csv"),
            output: PathBuf::from("mbta_test_predictions.csv"),
            report: None,
            cutoff: ymd(2022, 3, 1),
            eval_start: ymd(2022, 3, 2),
            eval_end: ymd(2023, 3, 1),
            alphas: vec![0.1, 1.0, 10.0],
            degree: 2,
            roll_window: 7,
            cv_folds: 5,
            holidays: HolidaySource::UsFederal,
            degenerate: DegeneratePolicy::Drop,
        }
    }
}

impl PipelineConfig {
    /// Rejects parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.alphas.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one ridge alpha is required".into(),
            ));
        }
        if let Some(bad) = self.alphas.iter().find(|a| !a.is_finite() || **a <= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "ridge alpha must be positive and finite, got {bad}"
            )));
        }
        if self.degree == 0 {
            return Err(PipelineError::InvalidConfig(
                "polynomial degree must be at least 1".into(),
            ));
        }
        if self.roll_window == 0 {
            return Err(PipelineError::InvalidConfig(
                "rolling window must be at least 1 day".into(),
            ));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.cv_folds
            )));
        }
        if self.eval_start > self.eval_end {
            return Err(PipelineError::InvalidConfig(format!(
                "evaluation window start {} is after end {}",
                self.eval_start, self.eval_end
            )));
        }
        Ok(())
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}
