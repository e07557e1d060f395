//! Loader for the merged station-ridership/weather table.
//!
//! One row per `(service_date, station_name)`. Paths ending in `.gz` are
//! decompressed on the fly.

use chrono::{NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result, Stage};

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "service_date",
    "station_name",
    "tavg",
    "tmin",
    "tmax",
    "prcp",
    "wspd",
    "gated_entries",
];

/// One station-day of ridership with that day's weather.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub service_date: NaiveDate,
    pub station_name: String,
    pub tavg: f64,
    pub tmin: f64,
    pub tmax: f64,
    pub prcp: f64,
    pub wspd: f64,
    pub gated_entries: u64,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    service_date: String,
    station_name: String,
    tavg: f64,
    tmin: f64,
    tmax: f64,
    prcp: f64,
    wspd: f64,
    gated_entries: f64,
}

/// Parses `YYYY-MM-DD`, tolerating a trailing time of day.
pub fn parse_service_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| PipelineError::io(Stage::Load, path, e))?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        debug!(path = %path.display(), "Reading gzip-compressed input");
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Reads every observation from `path`, preserving file order.
///
/// # Errors
///
/// [`PipelineError::InputSchema`] if a required column is missing, a date or
/// number is malformed, ridership is negative or fractional, a
/// `(service_date, station_name)` pair repeats, or the file has no rows.
#[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_observations(path: impl AsRef<Path>) -> Result<Vec<Observation>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(open_reader(path)?);

    let headers = rdr.headers().map_err(|e| PipelineError::csv(Stage::Load, path, e))?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::InputSchema(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for (i, result) in rdr.deserialize::<RawObservation>().enumerate() {
        // header is line 1
        let line = i + 2;
        let raw = result
            .map_err(|e| PipelineError::InputSchema(format!("line {line}: {e}")))?;
        let obs = validate(raw, line)?;

        if !seen.insert((obs.service_date, obs.station_name.clone())) {
            return Err(PipelineError::InputSchema(format!(
                "line {line}: duplicate row for station '{}' on {}",
                obs.station_name, obs.service_date
            )));
        }
        rows.push(obs);
    }

    if rows.is_empty() {
        return Err(PipelineError::InputSchema("input contains no rows".into()));
    }

    info!(rows = rows.len(), stations = count_stations(&rows), "Observations loaded");
    Ok(rows)
}

fn validate(raw: RawObservation, line: usize) -> Result<Observation> {
    let service_date = parse_service_date(&raw.service_date).ok_or_else(|| {
        PipelineError::InputSchema(format!(
            "line {line}: unparseable service_date '{}'",
            raw.service_date
        ))
    })?;

    let entries = raw.gated_entries;
    if !entries.is_finite() || entries < 0.0 || entries.fract() != 0.0 {
        return Err(PipelineError::InputSchema(format!(
            "line {line}: gated_entries must be a non-negative integer, got {entries}"
        )));
    }

    for (name, value) in [
        ("tavg", raw.tavg),
        ("tmin", raw.tmin),
        ("tmax", raw.tmax),
        ("prcp", raw.prcp),
        ("wspd", raw.wspd),
    ] {
        if !value.is_finite() {
            return Err(PipelineError::InputSchema(format!(
                "line {line}: {name} is not a finite number"
            )));
        }
    }

    Ok(Observation {
        service_date,
        station_name: raw.station_name,
        tavg: raw.tavg,
        tmin: raw.tmin,
        tmax: raw.tmax,
        prcp: raw.prcp,
        wspd: raw.wspd,
        gated_entries: entries as u64,
    })
}

fn count_stations(rows: &[Observation]) -> usize {
    rows.iter()
        .map(|r| r.station_name.as_str())
        .collect::<HashSet<_>>()
        .len()
}
