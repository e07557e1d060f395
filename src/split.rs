//! Hard temporal train/test boundary.

use chrono::NaiveDate;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::features::DerivedRow;

/// Row indices of each partition, both in original row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalSplit {
    pub cutoff: NaiveDate,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TemporalSplit {
    /// Rows dated on or before `cutoff` train; later rows test.
    ///
    /// # Errors
    ///
    /// [`PipelineError::EmptySplit`] if either side has no rows.
    pub fn at_cutoff(rows: &[DerivedRow], cutoff: NaiveDate) -> Result<Self> {
        let (train, test): (Vec<usize>, Vec<usize>) =
            (0..rows.len()).partition(|&i| rows[i].service_date <= cutoff);

        if train.is_empty() {
            return Err(PipelineError::EmptySplit {
                partition: "train partition",
                cutoff,
            });
        }
        if test.is_empty() {
            return Err(PipelineError::EmptySplit {
                partition: "test partition",
                cutoff,
            });
        }

        info!(%cutoff, train = train.len(), test = test.len(), "Rows split at cutoff");
        Ok(Self {
            cutoff,
            train,
            test,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Observation;
    use crate::features::FeatureEngineer;
    use crate::holidays::HolidayCalendar;
    use chrono::Duration;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn derived(start: NaiveDate, days: i64) -> Vec<DerivedRow> {
        let data: Vec<Observation> = (0..days)
            .flat_map(|d| {
                let date = start + Duration::days(d);
                ["Alewife", "Davis"].map(|s| Observation {
                    service_date: date,
                    station_name: s.to_string(),
                    tavg: 0.0,
                    tmin: 0.0,
                    tmax: 0.0,
                    prcp: 0.0,
                    wspd: 0.0,
                    gated_entries: d as u64,
                })
            })
            .collect();
        let calendar = HolidayCalendar::us_federal([2022]);
        FeatureEngineer::new(&calendar, 7).derive(&data).unwrap()
    }

    #[test]
    fn test_cutoff_day_is_train() {
        let rows = derived(ymd(2022, 2, 20), 14);
        let cutoff = ymd(2022, 3, 1);
        let split = TemporalSplit::at_cutoff(&rows, cutoff).unwrap();

        for &i in &split.train {
            assert!(rows[i].service_date <= cutoff);
        }
        for &i in &split.test {
            assert!(rows[i].service_date > cutoff);
        }
        assert!(split.train.iter().any(|&i| rows[i].service_date == cutoff));
        assert!(split.test.iter().any(|&i| rows[i].service_date == ymd(2022, 3, 2)));
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let rows = derived(ymd(2022, 2, 20), 14);
        let split = TemporalSplit::at_cutoff(&rows, ymd(2022, 3, 1)).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..rows.len()).collect::<Vec<_>>());
        assert!(split.train.windows(2).all(|w| w[0] < w[1]));
        assert!(split.test.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_test_partition() {
        let rows = derived(ymd(2022, 2, 1), 14);
        let err = TemporalSplit::at_cutoff(&rows, ymd(2022, 3, 1)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptySplit {
                partition: "test partition",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_train_partition() {
        let rows = derived(ymd(2022, 3, 5), 14);
        assert!(matches!(
            TemporalSplit::at_cutoff(&rows, ymd(2022, 3, 1)),
            Err(PipelineError::EmptySplit {
                partition: "train partition",
                ..
            })
        ));
    }
}
