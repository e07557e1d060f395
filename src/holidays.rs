//! Holiday calendar used for the holiday-distance features.
//!
//! A [`HolidayCalendar`] is built once per run, either from the built-in US
//! federal rules or from a CSV file, and handed to the feature engineer.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::dataset::parse_service_date;
use crate::error::{PipelineError, Result, Stage};

/// First year Juneteenth was observed federally.
const JUNETEENTH_FIRST_YEAR: i32 = 2021;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayCalendar {
    dates: BTreeSet<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct HolidayRow {
    date: String,
}

impl HolidayCalendar {
    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// US federal holidays for `years`, including observed weekday shifts.
    pub fn us_federal(years: impl IntoIterator<Item = i32>) -> Self {
        let mut dates = BTreeSet::new();
        for year in years {
            dates.extend(federal_holidays(year));
        }
        Self { dates }
    }

    /// Loads a calendar from a CSV file with a `date` column, keeping only
    /// dates that fall in `years`.
    pub fn load(path: impl AsRef<Path>, years: &BTreeSet<i32>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PipelineError::io(Stage::Load, path, e))?;
        let mut rdr = csv::Reader::from_reader(file);

        let mut dates = BTreeSet::new();
        for (i, result) in rdr.deserialize::<HolidayRow>().enumerate() {
            let row = result.map_err(|e| PipelineError::csv(Stage::Load, path, e))?;
            let date = parse_service_date(&row.date).ok_or_else(|| {
                PipelineError::InputSchema(format!(
                    "holiday file {} line {}: unparseable date '{}'",
                    path.display(),
                    i + 2,
                    row.date
                ))
            })?;
            if years.contains(&date.year()) {
                dates.insert(date);
            }
        }

        debug!(path = %path.display(), holidays = dates.len(), "Holiday calendar loaded");
        Ok(Self { dates })
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Days until the nearest holiday on or after `date`.
    pub fn days_to_next(&self, date: NaiveDate) -> Option<i64> {
        self.dates
            .range(date..)
            .next()
            .map(|h| (*h - date).num_days())
    }

    /// Days since the nearest holiday on or before `date`.
    pub fn days_from_prev(&self, date: NaiveDate) -> Option<i64> {
        self.dates
            .range(..=date)
            .next_back()
            .map(|h| (date - *h).num_days())
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

fn federal_holidays(year: i32) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(16);

    let mut fixed = vec![(1, 1), (7, 4), (11, 11), (12, 25)];
    if year >= JUNETEENTH_FIRST_YEAR {
        fixed.push((6, 19));
    }
    for (month, day) in fixed {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            out.push(date);
            if let Some(observed) = observed(date) {
                out.push(observed);
            }
        }
    }

    let floating = [
        nth_weekday(year, 1, Weekday::Mon, 3),  // Martin Luther King Jr. Day
        nth_weekday(year, 2, Weekday::Mon, 3),  // Washington's Birthday
        last_weekday(year, 5, Weekday::Mon),    // Memorial Day
        nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
        nth_weekday(year, 10, Weekday::Mon, 2), // Columbus Day
        nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
    ];
    out.extend(floating.into_iter().flatten());
    out
}

/// Saturday holidays are observed the Friday before, Sunday ones the Monday after.
fn observed(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => Some(date - Duration::days(1)),
        Weekday::Sun => Some(date + Duration::days(1)),
        _ => None,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}
