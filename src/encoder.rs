//! Drop-first indicator encoding against a fixed feature schema.
//!
//! The schema is computed once from the full derived dataset, so every split
//! is encoded into the same column universe.

use ndarray::Array2;
use std::collections::BTreeSet;
use tracing::info;

use crate::features::{DerivedRow, Season};

const WEATHER_AND_HOLIDAY: [&str; 9] = [
    "tavg",
    "tmin",
    "tmax",
    "prcp",
    "wspd",
    "is_weekend",
    "is_holiday",
    "days_to_next_hol",
    "days_from_prev_hol",
];

const HISTORY_AND_REGIME: [&str; 9] = [
    "lag1",
    "roll7",
    "month_sin",
    "month_cos",
    "is_covid_period",
    "is_recovery_period",
    "is_post_covid",
    "covid_weekend",
    "recovery_weekend",
];

/// Ordered list of model input columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    seasons: Vec<Season>,
    stations: Vec<String>,
    reference_station: Option<String>,
}

impl FeatureSchema {
    /// Builds the schema from the distinct seasons and stations in `rows`,
    /// dropping the first level of each in sorted order.
    pub fn from_rows(rows: &[DerivedRow]) -> Self {
        let seasons: BTreeSet<Season> = rows.iter().map(|r| r.season).collect();
        let stations: BTreeSet<&str> = rows.iter().map(|r| r.station_name.as_str()).collect();

        let mut seasons = seasons.into_iter();
        seasons.next();
        let mut stations = stations.into_iter().map(str::to_string);
        let reference_station = stations.next();

        let schema = Self {
            seasons: seasons.collect(),
            stations: stations.collect(),
            reference_station,
        };

        info!(
            columns = schema.len(),
            station_indicators = schema.stations.len(),
            season_indicators = schema.seasons.len(),
            reference_station = schema.reference_station().unwrap_or(""),
            "Feature schema built"
        );
        schema
    }

    pub fn len(&self) -> usize {
        WEATHER_AND_HOLIDAY.len() + self.seasons.len() + HISTORY_AND_REGIME.len() + self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reference_station(&self) -> Option<&str> {
        self.reference_station.as_deref()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = WEATHER_AND_HOLIDAY.iter().map(|s| s.to_string()).collect();
        names.extend(self.seasons.iter().map(|s| format!("season_{}", s.as_str())));
        names.extend(HISTORY_AND_REGIME.iter().map(|s| s.to_string()));
        names.extend(self.stations.iter().map(|s| format!("station_name_{s}")));
        names
    }

    /// Encodes `rows` into a design matrix, one row per input row. Levels not
    /// in the schema encode as all-zero indicators.
    pub fn encode<'r>(&self, rows: impl IntoIterator<Item = &'r DerivedRow>) -> Array2<f64> {
        let width = self.len();
        let mut data = Vec::new();
        let mut n = 0;

        for row in rows {
            data.extend(self.encode_row(row));
            n += 1;
        }

        // data.len() == n * width by construction
        Array2::from_shape_vec((n, width), data).unwrap_or_else(|_| Array2::zeros((n, width)))
    }

    fn encode_row(&self, row: &DerivedRow) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let mut out = Vec::with_capacity(self.len());

        out.extend([
            row.tavg,
            row.tmin,
            row.tmax,
            row.prcp,
            row.wspd,
            flag(row.is_weekend),
            flag(row.is_holiday),
            row.days_to_next_hol as f64,
            row.days_from_prev_hol as f64,
        ]);
        out.extend(self.seasons.iter().map(|s| flag(*s == row.season)));
        out.extend([
            row.lag1,
            row.roll7,
            row.month_sin,
            row.month_cos,
            flag(row.is_covid_period),
            flag(row.is_recovery_period),
            flag(row.is_post_covid),
            flag(row.covid_weekend),
            flag(row.recovery_weekend),
        ]);
        out.extend(self.stations.iter().map(|s| flag(*s == row.station_name)));
        out
    }
}
