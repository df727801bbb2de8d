//! K-fold cross-validation for the random forest.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::columns::ColumnSpec;
use crate::error::RfError;
use crate::forest::ForestConfig;
use crate::matrix::Matrix;
use crate::split::TaskKind;

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if
/// desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of k-fold cross-validation.
#[derive(Debug)]
pub struct CvResult {
    /// Score for each fold: fraction correct (classification) or R²
    /// (regression).
    pub fold_scores: Vec<f64>,
    /// Arithmetic mean of the fold scores.
    pub mean_score: f64,
    /// Standard deviation of the fold scores.
    pub std_score: f64,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of rows evaluated.
    pub n_samples: usize,
}

impl CvResult {
    /// Return the mean score as a rounded percentage.
    #[must_use]
    pub fn mean_score_percent(&self) -> f64 {
        (self.mean_score * 100.0).round()
    }
}

impl CrossValidation {
    /// Create a new cross-validation config with the given fold count.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2. The upper
    /// bound (`n_folds <= rows`) is checked against the matrix in
    /// [`CrossValidation::evaluate`].
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run k-fold cross-validation and return the aggregated scores.
    ///
    /// Rows are shuffled once with the configured seed and dealt
    /// round-robin into folds, so fold sizes differ by at most one and
    /// every row is held out exactly once. Each fold trains a fresh forest
    /// (seeded `seed + fold`) on the remaining rows and scores it on the
    /// held-out rows. No state crosses folds; a fold failure aborts the
    /// whole evaluation.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::FoldCountExceedsRows`] | `n_folds > matrix.rows()` |
    /// | [`RfError::ColumnOutOfRange`] | `columns` address columns the matrix lacks |
    /// | Training errors | Propagated from [`ForestConfig::fit`] |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_rows = matrix.rows()))]
    pub fn evaluate(
        &self,
        config: &ForestConfig,
        matrix: &Matrix,
        columns: &ColumnSpec,
    ) -> Result<CvResult, RfError> {
        let n_samples = matrix.rows();
        if self.n_folds > n_samples {
            return Err(RfError::FoldCountExceedsRows {
                n_folds: self.n_folds,
                n_samples,
            });
        }
        if columns.min_cols() > matrix.cols() {
            return Err(RfError::ColumnOutOfRange {
                index: (columns.min_cols() - 1) as i64,
                n_cols: matrix.cols(),
            });
        }

        let assignments = fold_assignments(n_samples, self.n_folds, self.seed);

        let mut fold_scores = Vec::with_capacity(self.n_folds);

        for fold in 0..self.n_folds {
            let mut train_rows = Vec::with_capacity(n_samples);
            let mut test_rows = Vec::with_capacity(n_samples / self.n_folds + 1);
            for (row, &assigned) in assignments.iter().enumerate() {
                if assigned == fold {
                    test_rows.push(row);
                } else {
                    train_rows.push(row);
                }
            }

            // Fresh forest per fold, seeded off the CV seed.
            let fold_config = config
                .clone()
                .with_seed(self.seed.wrapping_add(fold as u64));
            let forest = fold_config.fit(matrix, columns, &train_rows)?;

            let predictions = forest.predict_rows(matrix, &test_rows)?;
            let score = match config.task() {
                TaskKind::Classification => {
                    fraction_correct(matrix, columns.target_column(), &test_rows, &predictions)
                }
                TaskKind::Regression => {
                    r_squared(matrix, columns.target_column(), &test_rows, &predictions)
                }
            };
            fold_scores.push(score);

            info!(fold, score, n_test = test_rows.len(), "fold completed");
        }

        let mean_score = fold_scores.iter().sum::<f64>() / self.n_folds as f64;
        let std_score = {
            let variance = fold_scores
                .iter()
                .map(|&s| (s - mean_score).powi(2))
                .sum::<f64>()
                / self.n_folds as f64;
            variance.sqrt()
        };

        info!(mean_score, std_score, "cross-validation complete");

        Ok(CvResult {
            fold_scores,
            mean_score,
            std_score,
            n_folds: self.n_folds,
            n_samples,
        })
    }
}

/// Assign each row to a fold: seeded shuffle, then round-robin.
///
/// Fold sizes differ by at most one, and the assignment is a pure
/// function of `(n_samples, n_folds, seed)`.
fn fold_assignments(n_samples: usize, n_folds: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n_samples).collect();
    order.shuffle(&mut rng);

    let mut assignments = vec![0usize; n_samples];
    for (position, &row) in order.iter().enumerate() {
        assignments[row] = position % n_folds;
    }
    assignments
}

/// Fraction of predictions equal to the target value.
fn fraction_correct(
    matrix: &Matrix,
    target_column: usize,
    test_rows: &[usize],
    predictions: &[f64],
) -> f64 {
    let correct = test_rows
        .iter()
        .zip(predictions)
        .filter(|&(&row, &pred)| matrix.get(row, target_column) == pred)
        .count();
    correct as f64 / test_rows.len() as f64
}

/// Coefficient of determination: `1 - SS_res / SS_tot`.
///
/// Returns 1.0 for a perfect fit on a constant target (SS_tot of zero),
/// 0.0 otherwise.
fn r_squared(
    matrix: &Matrix,
    target_column: usize,
    test_rows: &[usize],
    predictions: &[f64],
) -> f64 {
    let n = test_rows.len() as f64;
    let mean: f64 = test_rows
        .iter()
        .map(|&row| matrix.get(row, target_column))
        .sum::<f64>()
        / n;

    let mut ss_res = 0.0f64;
    let mut ss_tot = 0.0f64;
    for (&row, &pred) in test_rows.iter().zip(predictions) {
        let actual = matrix.get(row, target_column);
        ss_res += (actual - pred).powi(2);
        ss_tot += (actual - mean).powi(2);
    }

    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}
