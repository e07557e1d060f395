//! Feature engineering: calendar, holiday distance, seasonal, lag/rolling and
//! COVID-regime features derived from raw observations.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info};

use crate::dataset::Observation;
use crate::error::{PipelineError, Result};
use crate::holidays::HolidayCalendar;

/// Meteorological season. Variant order is alphabetical, which is the level
/// order used for indicator encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Fall,
    Spring,
    Summer,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Fall => "fall",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Winter => "winter",
        }
    }
}

/// Ridership regime keyed on fixed, half-open date ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    PreCovid,
    /// [2020-03-15, 2021-03-01)
    Covid,
    /// [2021-03-01, 2022-01-01)
    Recovery,
    /// [2022-01-01, ..)
    PostCovid,
}

impl Regime {
    pub fn for_date(date: NaiveDate) -> Self {
        let key = (date.year(), date.month(), date.day());
        if key >= (2022, 1, 1) {
            Regime::PostCovid
        } else if key >= (2021, 3, 1) {
            Regime::Recovery
        } else if key >= (2020, 3, 15) {
            Regime::Covid
        } else {
            Regime::PreCovid
        }
    }
}

/// An observation extended with every engineered feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRow {
    /// Position of the source row in the loaded input.
    #[serde(skip)]
    pub source_index: usize,
    pub service_date: NaiveDate,
    pub station_name: String,
    pub tavg: f64,
    pub tmin: f64,
    pub tmax: f64,
    pub prcp: f64,
    pub wspd: f64,
    pub gated_entries: u64,

    pub day_of_week: u32,
    pub is_weekend: bool,
    pub month: u32,
    pub season: Season,

    pub is_holiday: bool,
    pub days_to_next_hol: i64,
    pub days_from_prev_hol: i64,

    pub lag1: f64,
    /// Trailing mean over the rolling window, ending at the previous row.
    pub roll7: f64,

    pub month_sin: f64,
    pub month_cos: f64,

    pub is_covid_period: bool,
    pub is_recovery_period: bool,
    pub is_post_covid: bool,
    pub covid_weekend: bool,
    pub recovery_weekend: bool,
}

/// Cyclical month encoding, `2π(month - 1) / 12` mapped to (sin, cos).
pub fn month_cycle(month: u32) -> (f64, f64) {
    let angle = 2.0 * PI * (month as f64 - 1.0) / 12.0;
    (angle.sin(), angle.cos())
}

pub struct FeatureEngineer<'a> {
    calendar: &'a HolidayCalendar,
    roll_window: usize,
}

impl<'a> FeatureEngineer<'a> {
    pub fn new(calendar: &'a HolidayCalendar, roll_window: usize) -> Self {
        Self {
            calendar,
            roll_window,
        }
    }

    /// Prior rows a station needs before one of its rows is usable.
    pub fn required_history(&self) -> usize {
        self.roll_window.max(1)
    }

    /// Derives features for every row with enough station history and a
    /// defined holiday distance, preserving input order.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InsufficientHistory`] if no row qualifies.
    #[tracing::instrument(skip_all, fields(rows = observations.len(), roll_window = self.roll_window))]
    pub fn derive(&self, observations: &[Observation]) -> Result<Vec<DerivedRow>> {
        let history = self.station_history(observations);

        let mut rows = Vec::with_capacity(observations.len());
        let mut short_history = 0usize;
        let mut no_holiday = 0usize;

        for (index, obs) in observations.iter().enumerate() {
            let Some((lag1, roll)) = history[index] else {
                short_history += 1;
                continue;
            };

            let date = obs.service_date;
            let (Some(to_next), Some(from_prev)) = (
                self.calendar.days_to_next(date),
                self.calendar.days_from_prev(date),
            ) else {
                no_holiday += 1;
                continue;
            };

            rows.push(build_row(index, obs, self.calendar, lag1, roll, to_next, from_prev));
        }

        info!(
            derived = rows.len(),
            dropped_short_history = short_history,
            dropped_no_holiday = no_holiday,
            "Features derived"
        );

        if rows.is_empty() {
            return Err(PipelineError::InsufficientHistory(format!(
                "no row has {} prior observations for its station and a holiday on both sides",
                self.required_history()
            )));
        }
        Ok(rows)
    }

    /// `(lag1, rolling mean)` per input row, computed over each station's
    /// rows in date order; `None` where history is too short.
    fn station_history(&self, observations: &[Observation]) -> Vec<Option<(f64, f64)>> {
        let mut by_station: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, obs) in observations.iter().enumerate() {
            by_station.entry(obs.station_name.as_str()).or_default().push(i);
        }

        let required = self.required_history();
        let window = self.roll_window.max(1);
        let mut history = vec![None; observations.len()];

        for (station, mut indices) in by_station {
            indices.sort_by_key(|&i| observations[i].service_date);
            debug!(station, rows = indices.len(), "Computing station history");

            for k in required..indices.len() {
                let lag1 = observations[indices[k - 1]].gated_entries as f64;
                let sum: f64 = indices[k - window..k]
                    .iter()
                    .map(|&i| observations[i].gated_entries as f64)
                    .sum();
                history[indices[k]] = Some((lag1, sum / window as f64));
            }
        }

        history
    }
}

fn build_row(
    source_index: usize,
    obs: &Observation,
    calendar: &HolidayCalendar,
    lag1: f64,
    roll7: f64,
    days_to_next_hol: i64,
    days_from_prev_hol: i64,
) -> DerivedRow {
    let date = obs.service_date;
    let day_of_week = date.weekday().num_days_from_monday();
    let is_weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    let month = date.month();
    let (month_sin, month_cos) = month_cycle(month);
    let regime = Regime::for_date(date);
    let is_covid_period = regime == Regime::Covid;
    let is_recovery_period = regime == Regime::Recovery;

    DerivedRow {
        source_index,
        service_date: date,
        station_name: obs.station_name.clone(),
        tavg: obs.tavg,
        tmin: obs.tmin,
        tmax: obs.tmax,
        prcp: obs.prcp,
        wspd: obs.wspd,
        gated_entries: obs.gated_entries,
        day_of_week,
        is_weekend,
        month,
        season: Season::from_month(month),
        is_holiday: calendar.is_holiday(date),
        days_to_next_hol,
        days_from_prev_hol,
        lag1,
        roll7,
        month_sin,
        month_cos,
        is_covid_period,
        is_recovery_period,
        is_post_covid: regime == Regime::PostCovid,
        covid_weekend: is_covid_period && is_weekend,
        recovery_weekend: is_recovery_period && is_weekend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, station: &str, entries: u64) -> Observation {
        Observation {
            service_date: date,
            station_name: station.to_string(),
            tavg: 10.0,
            tmin: 5.0,
            tmax: 15.0,
            prcp: 0.0,
            wspd: 8.0,
            gated_entries: entries,
        }
    }

    /// Two stations interleaved by date, `days` days each.
    fn interleaved(start: NaiveDate, days: i64) -> Vec<Observation> {
        let mut rows = Vec::new();
        for d in 0..days {
            let date = start + Duration::days(d);
            rows.push(obs(date, "Alewife", 1000 + d as u64));
            rows.push(obs(date, "Davis", 5000 + 10 * d as u64));
        }
        rows
    }

    #[test]
    fn test_season_mapping() {
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(2), Season::Winter);
        assert_eq!(Season::from_month(3), Season::Spring);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(11), Season::Fall);
    }

    #[test]
    fn test_regime_boundaries_are_half_open() {
        assert_eq!(Regime::for_date(ymd(2020, 3, 14)), Regime::PreCovid);
        assert_eq!(Regime::for_date(ymd(2020, 3, 15)), Regime::Covid);
        assert_eq!(Regime::for_date(ymd(2021, 2, 28)), Regime::Covid);
        assert_eq!(Regime::for_date(ymd(2021, 3, 1)), Regime::Recovery);
        assert_eq!(Regime::for_date(ymd(2021, 12, 31)), Regime::Recovery);
        assert_eq!(Regime::for_date(ymd(2022, 1, 1)), Regime::PostCovid);
    }

    #[test]
    fn test_month_cycle() {
        let (s, c) = month_cycle(1);
        assert!(s.abs() < 1e-12 && (c - 1.0).abs() < 1e-12);
        let (s, c) = month_cycle(4);
        assert!((s - 1.0).abs() < 1e-12 && c.abs() < 1e-12);
        let (s, c) = month_cycle(7);
        assert!(s.abs() < 1e-12 && (c + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lag_is_per_station() {
        let calendar = HolidayCalendar::us_federal([2022]);
        let data = interleaved(ymd(2022, 3, 1), 10);
        let rows = FeatureEngineer::new(&calendar, 7).derive(&data).unwrap();

        // 3 eligible days per station
        assert_eq!(rows.len(), 6);
        for row in &rows {
            let prev = data
                .iter()
                .filter(|o| {
                    o.station_name == row.station_name && o.service_date < row.service_date
                })
                .max_by_key(|o| o.service_date)
                .unwrap();
            assert_eq!(row.lag1, prev.gated_entries as f64);
        }

        let first_davis = rows.iter().find(|r| r.station_name == "Davis").unwrap();
        assert_eq!(first_davis.service_date, ymd(2022, 3, 8));
        // mean of 5000, 5010, ..., 5060
        assert_eq!(first_davis.roll7, 5030.0);
    }

    #[test]
    fn test_lag_uses_chronological_order_not_file_order() {
        let calendar = HolidayCalendar::us_federal([2022]);
        let mut data = interleaved(ymd(2022, 3, 1), 9);
        data.reverse();
        let rows = FeatureEngineer::new(&calendar, 7).derive(&data).unwrap();

        // file order is kept: latest dates first
        assert_eq!(rows[0].service_date, ymd(2022, 3, 9));
        assert_eq!(rows[0].station_name, "Davis");
        assert_eq!(rows[0].lag1, 5070.0);
        assert_eq!(rows[1].station_name, "Alewife");
        assert_eq!(rows[1].lag1, 1007.0);
    }

    #[test]
    fn test_source_index_points_at_input_row() {
        let calendar = HolidayCalendar::us_federal([2022]);
        let data = interleaved(ymd(2022, 3, 1), 9);
        let rows = FeatureEngineer::new(&calendar, 7).derive(&data).unwrap();

        for row in &rows {
            let source = &data[row.source_index];
            assert_eq!(source.service_date, row.service_date);
            assert_eq!(source.station_name, row.station_name);
        }
    }

    #[test]
    fn test_insufficient_history() {
        let calendar = HolidayCalendar::us_federal([2022]);
        let data = interleaved(ymd(2022, 3, 1), 7);

        let err = FeatureEngineer::new(&calendar, 7).derive(&data).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientHistory(_)));
    }

    #[test]
    fn test_rows_without_holiday_distance_dropped() {
        let calendar = HolidayCalendar::from_dates([ymd(2022, 3, 10)]);
        let data = interleaved(ymd(2022, 3, 1), 14);
        let rows = FeatureEngineer::new(&calendar, 7).derive(&data).unwrap();

        // only 2022-03-10 has a holiday on both sides
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.is_holiday));
        assert!(rows.iter().all(|r| r.days_to_next_hol == 0 && r.days_from_prev_hol == 0));
    }

    #[test]
    fn test_calendar_and_regime_flags() {
        let calendar = HolidayCalendar::us_federal([2021]);
        let data: Vec<Observation> = (0..10)
            .map(|d| obs(ymd(2021, 2, 20) + Duration::days(d), "Alewife", 100))
            .collect();
        let rows = FeatureEngineer::new(&calendar, 7).derive(&data).unwrap();

        // 2021-02-27 (Saturday), 02-28 (Sunday), 03-01 (Monday)
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_weekend && rows[0].covid_weekend);
        assert_eq!(rows[0].day_of_week, 5);
        assert_eq!(rows[0].season, Season::Winter);
        assert!(rows[1].is_covid_period && rows[1].covid_weekend);
        assert!(rows[2].is_recovery_period && !rows[2].is_weekend);
        assert!(!rows[2].recovery_weekend);
        assert_eq!(rows[2].season, Season::Spring);
        assert_eq!(rows[2].roll7, 100.0);
    }
}
