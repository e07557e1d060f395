//! Turning raw predictions into ridership counts and scoring them.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::features::DerivedRow;
use crate::lines::line_for;

/// Rounds half to even, then clips at zero. Counts have no upper bound.
pub fn to_ridership(raw: f64) -> u64 {
    let rounded = raw.round_ties_even();
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else {
        rounded as u64
    }
}

/// Accuracy metrics over paired actual/predicted values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub count: usize,
}

impl Metrics {
    /// Returns `None` for empty or mismatched inputs.
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return None;
        }
        let n = actual.len() as f64;

        let mse = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .sum::<f64>()
            / n;
        let mae = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .sum::<f64>()
            / n;

        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - (mse * n) / ss_tot
        };

        Some(Self {
            rmse: mse.sqrt(),
            mae,
            r2,
            count: actual.len(),
        })
    }
}

/// One output row for the visualization front-end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub service_date: NaiveDate,
    pub station_name: String,
    pub tavg: f64,
    pub prcp: f64,
    pub wspd: f64,
    pub actual_entries: u64,
    pub predicted_entries: u64,
}

impl PredictionRecord {
    pub fn new(row: &DerivedRow, predicted_entries: u64) -> Self {
        Self {
            service_date: row.service_date,
            station_name: row.station_name.clone(),
            tavg: row.tavg,
            prcp: row.prcp,
            wspd: row.wspd,
            actual_entries: row.gated_entries,
            predicted_entries,
        }
    }
}

/// RMSE of one transit line within the evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineError {
    pub line: String,
    pub rmse: f64,
    pub count: usize,
}

/// Keeps records dated within `[start, end]`, in their current order.
pub fn within_window(records: &[PredictionRecord], start: NaiveDate, end: NaiveDate) -> Vec<PredictionRecord> {
    records
        .iter()
        .filter(|r| r.service_date >= start && r.service_date <= end)
        .cloned()
        .collect()
}

pub fn record_metrics(records: &[PredictionRecord]) -> Option<Metrics> {
    let actual: Vec<f64> = records.iter().map(|r| r.actual_entries as f64).collect();
    let predicted: Vec<f64> = records.iter().map(|r| r.predicted_entries as f64).collect();
    Metrics::calculate(&actual, &predicted)
}

/// Per-line RMSE, ordered by line name.
pub fn line_errors(records: &[PredictionRecord]) -> Vec<LineError> {
    let mut by_line: BTreeMap<&str, Vec<&PredictionRecord>> = BTreeMap::new();
    for r in records {
        by_line.entry(line_for(&r.station_name)).or_default().push(r);
    }

    by_line
        .into_iter()
        .map(|(line, rows)| {
            let sq: f64 = rows
                .iter()
                .map(|r| (r.actual_entries as f64 - r.predicted_entries as f64).powi(2))
                .sum();
            LineError {
                line: line.to_string(),
                rmse: (sq / rows.len() as f64).sqrt(),
                count: rows.len(),
            }
        })
        .collect()
}
