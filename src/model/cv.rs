//! Chronological cross-validation for the ridge penalty.
//!
//! Fold construction, the candidate loop and the selection rule are kept
//! separate so each can be checked on its own.

use ndarray::{Array1, Array2, s};
use serde::Serialize;
use std::ops::Range;
use tracing::debug;

use super::ridge::Ridge;
use crate::error::{PipelineError, Result};

/// One expanding-window fold: fit on `train`, score on `validation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

/// Expanding-window splitter over rows already in chronological order.
///
/// With `n` rows and `k` splits the validation size is `n / (k + 1)`; the last
/// fold ends at `n` and every fold fits only on rows before its validation
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesFolds {
    n_splits: usize,
}

impl TimeSeriesFolds {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "cross-validation needs at least 2 folds, got {k}"
            )));
        }
        if n_samples < k + 1 {
            return Err(PipelineError::TooFewTrainingRows(format!(
                "{k}-fold time-series cross-validation needs at least {} training rows, got {n_samples}",
                k + 1
            )));
        }

        let size = n_samples / (k + 1);
        let first = n_samples - k * size;
        Ok((0..k)
            .map(|i| {
                let start = first + i * size;
                Fold {
                    train: 0..start,
                    validation: start..start + size,
                }
            })
            .collect())
    }
}

/// Validation error of one candidate penalty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlphaScore {
    pub alpha: f64,
    pub mean_mse: f64,
    pub fold_mse: Vec<f64>,
}

/// Fits every candidate on every fold and records its validation MSE.
pub fn score_alphas(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alphas: &[f64],
    folds: &[Fold],
) -> Result<Vec<AlphaScore>> {
    let mut scores = Vec::with_capacity(alphas.len());

    for &alpha in alphas {
        let mut fold_mse = Vec::with_capacity(folds.len());
        for fold in folds {
            let model = Ridge::fit(
                x.slice(s![fold.train.clone(), ..]),
                y.slice(s![fold.train.clone()]),
                alpha,
            )?;
            let pred = model.predict(x.slice(s![fold.validation.clone(), ..]));
            let actual = y.slice(s![fold.validation.clone()]);
            let mse = pred
                .iter()
                .zip(actual.iter())
                .map(|(p, a)| (p - a).powi(2))
                .sum::<f64>()
                / actual.len().max(1) as f64;
            fold_mse.push(mse);
        }

        let mean_mse = fold_mse.iter().sum::<f64>() / fold_mse.len().max(1) as f64;
        debug!(alpha, mean_mse, "Scored ridge penalty");
        scores.push(AlphaScore {
            alpha,
            mean_mse,
            fold_mse,
        });
    }

    Ok(scores)
}

/// Lowest finite mean MSE wins; ties keep the earlier candidate.
pub fn select_alpha(scores: &[AlphaScore]) -> Option<&AlphaScore> {
    let mut best: Option<&AlphaScore> = None;
    for score in scores.iter().filter(|s| s.mean_mse.is_finite()) {
        match best {
            Some(b) if score.mean_mse >= b.mean_mse => {}
            _ => best = Some(score),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(alpha: f64, mean_mse: f64) -> AlphaScore {
        AlphaScore {
            alpha,
            mean_mse,
            fold_mse: vec![mean_mse],
        }
    }

    #[test]
    fn test_folds_expanding_window() {
        let folds = TimeSeriesFolds::new(5).split(12).unwrap();

        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0], Fold { train: 0..2, validation: 2..4 });
        assert_eq!(folds[4], Fold { train: 0..10, validation: 10..12 });
    }

    #[test]
    fn test_folds_uneven_length() {
        // size = 13 / 6 = 2, first validation block starts at 13 - 10 = 3
        let folds = TimeSeriesFolds::new(5).split(13).unwrap();

        assert_eq!(folds[0].train, 0..3);
        assert_eq!(folds[4].validation, 11..13);
    }

    #[test]
    fn test_folds_never_validate_on_earlier_rows() {
        for n in 6..60 {
            for fold in TimeSeriesFolds::new(5).split(n).unwrap() {
                assert!(!fold.train.is_empty());
                assert_eq!(fold.train.end, fold.validation.start);
                assert!(fold.validation.end <= n);
            }
        }
    }

    #[test]
    fn test_folds_need_enough_rows() {
        assert!(matches!(
            TimeSeriesFolds::new(5).split(5),
            Err(PipelineError::TooFewTrainingRows(_))
        ));
    }

    #[test]
    fn test_select_minimum() {
        let scores = vec![score(0.1, 4.0), score(1.0, 2.0), score(10.0, 3.0)];
        assert_eq!(select_alpha(&scores).unwrap().alpha, 1.0);
    }

    #[test]
    fn test_select_tie_keeps_first_candidate() {
        let scores = vec![score(10.0, 2.0), score(0.1, 2.0), score(1.0, 5.0)];
        assert_eq!(select_alpha(&scores).unwrap().alpha, 10.0);
    }

    #[test]
    fn test_select_skips_non_finite() {
        let scores = vec![score(0.1, f64::NAN), score(1.0, 7.0)];
        assert_eq!(select_alpha(&scores).unwrap().alpha, 1.0);
        assert!(select_alpha(&[score(0.1, f64::INFINITY)]).is_none());
    }

    #[test]
    fn test_score_prefers_small_penalty_on_noiseless_data() {
        let n = 30;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 2)) % 7) as f64 + i as f64 * 0.1);
        let y = Array1::from_shape_fn(n, |i| 3.0 * x[[i, 0]] - x[[i, 1]] + 1.0);
        let folds = TimeSeriesFolds::new(5).split(n).unwrap();

        let scores = score_alphas(&x, &y, &[0.001, 100.0], &folds).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].fold_mse.len(), 5);
        assert_eq!(select_alpha(&scores).unwrap().alpha, 0.001);
    }
}
