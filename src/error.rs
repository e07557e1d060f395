//! Error taxonomy for the forecasting pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Pipeline stage an error originated from, used in user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Load,
    Features,
    Split,
    Train,
    Evaluate,
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::Features => "feature engineering",
            Stage::Split => "train/test split",
            Stage::Train => "training",
            Stage::Evaluate => "evaluation",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("input schema error: {0}")]
    InputSchema(String),

    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("too few training rows: {0}")]
    TooFewTrainingRows(String),

    #[error("degenerate feature columns (zero variance in training rows): {}", columns.join(", "))]
    DegenerateFeature { columns: Vec<String> },

    #[error("empty {partition} for cutoff {cutoff}")]
    EmptySplit {
        partition: &'static str,
        cutoff: NaiveDate,
    },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        stage: Stage,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        stage: Stage,
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Returns the stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidConfig(_) => Stage::Config,
            PipelineError::InputSchema(_) => Stage::Load,
            PipelineError::InsufficientHistory(_) => Stage::Features,
            PipelineError::DegenerateFeature { .. } => Stage::Train,
            PipelineError::EmptySplit { partition, .. } => {
                if *partition == "evaluation window" {
                    Stage::Evaluate
                } else {
                    Stage::Split
                }
            }
            PipelineError::TooFewTrainingRows(_) | PipelineError::Numerical(_) => Stage::Train,
            PipelineError::Io { stage, .. } | PipelineError::Csv { stage, .. } => *stage,
            PipelineError::Json { .. } => Stage::Output,
        }
    }

    pub(crate) fn io(stage: Stage, path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        PipelineError::Io {
            stage,
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(stage: Stage, path: impl AsRef<std::path::Path>, source: csv::Error) -> Self {
        PipelineError::Csv {
            stage,
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_message_lists_columns() {
        let err = PipelineError::DegenerateFeature {
            columns: vec!["is_covid_period".into(), "lag1 is_holiday".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("is_covid_period, lag1 is_holiday"));
        assert_eq!(err.stage(), Stage::Train);
    }

    #[test]
    fn test_empty_window_is_evaluation_stage() {
        let cutoff = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
        let err = PipelineError::EmptySplit {
            partition: "evaluation window",
            cutoff,
        };
        assert_eq!(err.stage(), Stage::Evaluate);

        let err = PipelineError::EmptySplit {
            partition: "test partition",
            cutoff,
        };
        assert_eq!(err.stage(), Stage::Split);
        assert_eq!(err.to_string(), "empty test partition for cutoff 2022-03-01");
    }

    #[test]
    fn test_file_errors_keep_their_stage() {
        let missing = || std::io::Error::new(std::io::ErrorKind::NotFound, "gone");

        let err = PipelineError::io(Stage::Load, "merged.csv", missing());
        assert_eq!(err.stage(), Stage::Load);
        assert_eq!(err.to_string(), "I/O error on merged.csv: gone");

        let err = PipelineError::io(Stage::Output, "predictions.csv", missing());
        assert_eq!(err.stage(), Stage::Output);
    }

    #[test]
    fn test_short_training_set_is_training_stage() {
        let err = PipelineError::TooFewTrainingRows("need 6, got 5".into());
        assert_eq!(err.stage(), Stage::Train);
        assert_eq!(
            PipelineError::InsufficientHistory("none".into()).stage(),
            Stage::Features
        );
    }
}
