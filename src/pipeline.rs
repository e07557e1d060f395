//! End-to-end run: load, engineer, split, fit, predict, evaluate, write.

use chrono::{Datelike, NaiveDate};
use ndarray::Array1;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::{DegeneratePolicy, HolidaySource, PipelineConfig};
use crate::dataset::{Observation, load_observations};
use crate::encoder::FeatureSchema;
use crate::error::{PipelineError, Result};
use crate::evaluate::{
    LineError, Metrics, PredictionRecord, line_errors, record_metrics, to_ridership, within_window,
};
use crate::features::{DerivedRow, FeatureEngineer};
use crate::holidays::HolidayCalendar;
use crate::model::RidgePipeline;
use crate::model::cv::AlphaScore;
use crate::output::write_run;
use crate::split::TemporalSplit;

/// Everything a finished run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// RMSE over the evaluation window.
    pub rmse: f64,
    pub cutoff: NaiveDate,
    pub eval_start: NaiveDate,
    pub eval_end: NaiveDate,
    pub observations: usize,
    pub derived_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub window_rows: usize,
    pub alpha: f64,
    pub cv_scores: Vec<AlphaScore>,
    pub input_features: usize,
    pub model_features: usize,
    pub dropped_columns: Vec<String>,
    pub degenerate_policy: DegeneratePolicy,
    pub test_metrics: Metrics,
    pub window_metrics: Metrics,
    pub line_errors: Vec<LineError>,
}

/// Distinct calendar years covered by `observations`.
pub fn observed_years(observations: &[Observation]) -> BTreeSet<i32> {
    observations.iter().map(|o| o.service_date.year()).collect()
}

/// Builds the holiday calendar for the years in the data.
pub fn build_calendar(source: &HolidaySource, years: &BTreeSet<i32>) -> Result<HolidayCalendar> {
    let calendar = match source {
        HolidaySource::UsFederal => HolidayCalendar::us_federal(years.iter().copied()),
        HolidaySource::File(path) => HolidayCalendar::load(path, years)?,
    };
    if calendar.is_empty() {
        warn!(?years, "Holiday calendar is empty; every row will lack holiday distances");
    }
    info!(holidays = calendar.len(), years = years.len(), "Holiday calendar ready");
    Ok(calendar)
}

/// Loads the input and derives the engineered feature table.
pub fn derive_features(config: &PipelineConfig) -> Result<(Vec<Observation>, Vec<DerivedRow>)> {
    config.validate()?;
    let observations = load_observations(&config.input)?;
    let calendar = build_calendar(&config.holidays, &observed_years(&observations))?;
    let rows = FeatureEngineer::new(&calendar, config.roll_window).derive(&observations)?;
    Ok((observations, rows))
}

/// Runs the whole pipeline and writes the evaluation-window predictions (and
/// the JSON report when configured).
///
/// Nothing is written unless every earlier step succeeds.
#[tracing::instrument(skip_all, fields(input = %config.input.display(), cutoff = %config.cutoff))]
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let (observations, rows) = derive_features(config)?;

    let schema = FeatureSchema::from_rows(&rows);
    let split = TemporalSplit::at_cutoff(&rows, config.cutoff)?;

    let train_rows: Vec<&DerivedRow> = split.train.iter().map(|&i| &rows[i]).collect();
    let test_rows: Vec<&DerivedRow> = split.test.iter().map(|&i| &rows[i]).collect();

    let x_train = schema.encode(train_rows.iter().copied());
    let y_train: Array1<f64> = train_rows.iter().map(|r| r.gated_entries as f64).collect();
    let train_dates: Vec<NaiveDate> = train_rows.iter().map(|r| r.service_date).collect();

    let fitted = RidgePipeline::from_config(config).fit(
        &x_train,
        &y_train,
        &train_dates,
        &schema.column_names(),
    )?;

    let x_test = schema.encode(test_rows.iter().copied());
    let raw = fitted.predict(&x_test)?;

    let records: Vec<PredictionRecord> = test_rows
        .iter()
        .zip(&raw)
        .map(|(row, &value)| PredictionRecord::new(row, to_ridership(value)))
        .collect();

    let test_metrics = record_metrics(&records).ok_or(PipelineError::EmptySplit {
        partition: "test partition",
        cutoff: config.cutoff,
    })?;

    let window = within_window(&records, config.eval_start, config.eval_end);
    let window_metrics = record_metrics(&window).ok_or(PipelineError::EmptySplit {
        partition: "evaluation window",
        cutoff: config.cutoff,
    })?;
    let lines = line_errors(&window);

    info!(
        rmse = window_metrics.rmse,
        mae = window_metrics.mae,
        r2 = window_metrics.r2,
        rows = window_metrics.count,
        "Evaluation window scored"
    );
    for line in &lines {
        info!(line = %line.line, rmse = line.rmse, rows = line.count, "Line error");
    }

    let summary = RunSummary {
        rmse: window_metrics.rmse,
        cutoff: config.cutoff,
        eval_start: config.eval_start,
        eval_end: config.eval_end,
        observations: observations.len(),
        derived_rows: rows.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        window_rows: window.len(),
        alpha: fitted.alpha(),
        cv_scores: fitted.cv_scores().to_vec(),
        input_features: schema.len(),
        model_features: fitted.feature_names().len(),
        dropped_columns: fitted.dropped_columns().to_vec(),
        degenerate_policy: config.degenerate,
        test_metrics,
        window_metrics,
        line_errors: lines,
    };

    write_run(
        &config.output,
        &window,
        config.report.as_deref().map(|path| (path, &summary)),
    )?;

    Ok(summary)
}
