//! Random forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::columns::ColumnSpec;
use crate::error::RfError;
use crate::matrix::Matrix;
use crate::split::{SplitCriterion, TaskKind};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Strategy for the number of candidate columns drawn at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    /// All feature columns (the "auto" sentinel: no subsampling).
    All,
    /// Square root of the feature count, rounded up.
    Sqrt,
    /// A fixed count in `[1, n_features]`.
    Fixed(usize),
}

/// Resolve a [`MaxFeatures`] strategy to a concrete count.
pub(crate) fn resolve_max_features(
    max_features: MaxFeatures,
    n_features: usize,
) -> Result<usize, RfError> {
    let resolved = match max_features {
        MaxFeatures::All => n_features,
        MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
        MaxFeatures::Fixed(n) => n,
    };
    if resolved == 0 || resolved > n_features {
        return Err(RfError::InvalidMaxFeatures {
            max_features: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Configuration for random forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default          |
/// |--------------------|------------------|
/// | `task`             | `Classification` |
/// | `criterion`        | derived from task|
/// | `max_features`     | `All`            |
/// | `max_depth`        | `None`           |
/// | `min_samples_leaf` | 1                |
/// | `seed`             | 42               |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) task: TaskKind,
    pub(crate) criterion: Option<SplitCriterion>,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) seed: u64,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            task: TaskKind::Classification,
            criterion: None,
            max_features: MaxFeatures::All,
            max_depth: None,
            min_samples_leaf: 1,
            seed: 42,
        })
    }

    /// Set the task type.
    #[must_use]
    pub fn with_task(mut self, task: TaskKind) -> Self {
        self.task = task;
        self
    }

    /// Set the split criterion. `None` derives it from the task.
    #[must_use]
    pub fn with_criterion(mut self, criterion: Option<SplitCriterion>) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the leaf size threshold.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the task type.
    #[must_use]
    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a forest over the given training rows.
    ///
    /// Each tree is built over a bootstrap draw of `train_rows.len()` row
    /// indices sampled with replacement from `train_rows`. Only index sets
    /// are materialized; the matrix is shared by every tree. Trees are
    /// built in parallel, with per-tree seeds drawn up-front from a master
    /// RNG so the result does not depend on the thread count.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `train_rows` is empty |
    /// | [`RfError::RowOutOfRange`] | a training row exceeds the matrix |
    /// | [`RfError::ColumnOutOfRange`] | `columns` address columns the matrix lacks |
    /// | [`RfError::InvalidMaxFeatures`] | strategy resolves outside `[1, n_features]` |
    /// | [`RfError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`RfError::InvalidMinSamplesLeaf`] | `min_samples_leaf` is 0 |
    /// | [`RfError::CriterionTaskMismatch`] | criterion does not fit the task |
    #[instrument(skip_all, fields(n_trees = self.n_trees, n_train = train_rows.len()))]
    pub fn fit(
        &self,
        matrix: &Matrix,
        columns: &ColumnSpec,
        train_rows: &[usize],
    ) -> Result<Forest, RfError> {
        // All validation happens here, before any tree is built.
        if train_rows.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if let Some(&row) = train_rows.iter().find(|&&r| r >= matrix.rows()) {
            return Err(RfError::RowOutOfRange {
                row,
                n_rows: matrix.rows(),
            });
        }
        if columns.min_cols() > matrix.cols() {
            return Err(RfError::ColumnOutOfRange {
                index: (columns.min_cols() - 1) as i64,
                n_cols: matrix.cols(),
            });
        }
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        let criterion = self.criterion.unwrap_or_else(|| self.task.default_criterion());
        if !criterion.fits_task(self.task) {
            return Err(RfError::CriterionTaskMismatch {
                criterion,
                task: self.task,
            });
        }
        let max_features = resolve_max_features(self.max_features, columns.n_features())?;

        info!(
            n_trees = self.n_trees,
            n_train = train_rows.len(),
            n_features = columns.n_features(),
            max_features,
            "training forest"
        );

        // Per-tree seeds from the master RNG keep parallel training
        // deterministic for a fixed config seed.
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..self.n_trees).map(|_| master_rng.r#gen()).collect();

        let tree_config = DecisionTreeConfig::new()
            .with_task(self.task)
            .with_criterion(Some(criterion))
            .with_max_depth(self.max_depth)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(Some(max_features));

        let trees: Vec<DecisionTree> = tree_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let bootstrap = bootstrap_rows(train_rows, &mut rng);
                // Inputs are pre-validated, so fit cannot fail here.
                tree_config
                    .clone()
                    .with_seed(rng.r#gen())
                    .fit(matrix, columns, &bootstrap)
                    .expect("tree fit should not fail on pre-validated data")
            })
            .collect();

        debug!(n_trees_trained = trees.len(), "forest training complete");

        Ok(Forest {
            trees,
            task: self.task,
            min_cols: columns.min_cols(),
        })
    }
}

/// Draw a bootstrap sample: `train_rows.len()` rows with replacement.
fn bootstrap_rows(train_rows: &[usize], rng: &mut impl Rng) -> Vec<usize> {
    (0..train_rows.len())
        .map(|_| train_rows[rng.gen_range(0..train_rows.len())])
        .collect()
}

/// A fitted random forest ensemble.
///
/// Owns its trees; constructed fresh per training call and carries no
/// state beyond them.
#[derive(Debug, Clone)]
pub struct Forest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) task: TaskKind,
    pub(crate) min_cols: usize,
}

impl Forest {
    /// Predict the value for one matrix row.
    ///
    /// Every tree votes by walking to a leaf; votes aggregate by majority
    /// (ties to the smallest class value) for classification, or by mean
    /// for regression.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::RowOutOfRange`] | `row >= matrix.rows()` |
    /// | [`RfError::PredictionColumnsMismatch`] | the matrix is narrower than the training columns |
    pub fn predict(&self, matrix: &Matrix, row: usize) -> Result<f64, RfError> {
        self.check_bounds(matrix, row)?;
        Ok(self.predict_unchecked(matrix, row))
    }

    /// Predict values for a batch of matrix rows in parallel.
    ///
    /// Each row is evaluated independently against immutable tree
    /// structure, so rows parallelize without synchronization.
    ///
    /// # Errors
    ///
    /// Same as [`Forest::predict`], for the first offending row.
    pub fn predict_rows(&self, matrix: &Matrix, rows: &[usize]) -> Result<Vec<f64>, RfError> {
        for &row in rows {
            self.check_bounds(matrix, row)?;
        }
        Ok(rows
            .par_iter()
            .map(|&row| self.predict_unchecked(matrix, row))
            .collect())
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the task type this forest was trained for.
    #[must_use]
    pub fn task(&self) -> TaskKind {
        self.task
    }

    fn check_bounds(&self, matrix: &Matrix, row: usize) -> Result<(), RfError> {
        if row >= matrix.rows() {
            return Err(RfError::RowOutOfRange {
                row,
                n_rows: matrix.rows(),
            });
        }
        if matrix.cols() < self.min_cols {
            return Err(RfError::PredictionColumnsMismatch {
                expected: self.min_cols,
                got: matrix.cols(),
            });
        }
        Ok(())
    }

    fn predict_unchecked(&self, matrix: &Matrix, row: usize) -> f64 {
        let votes: Vec<f64> = self
            .trees
            .iter()
            .map(|t| t.traverse(matrix, row))
            .collect();
        match self.task {
            TaskKind::Regression => votes.iter().sum::<f64>() / votes.len() as f64,
            TaskKind::Classification => majority_vote(votes),
        }
    }
}

/// Majority vote over class values; ties go to the smallest value.
fn majority_vote(mut votes: Vec<f64>) -> f64 {
    votes.sort_unstable_by(f64::total_cmp);

    let mut best_value = votes[0];
    let mut best_count = 0usize;
    let mut i = 0usize;
    while i < votes.len() {
        let value = votes[i];
        let mut run = i;
        while run < votes.len() && votes[run].total_cmp(&value).is_eq() {
            run += 1;
        }
        // Strictly greater keeps the smallest value on ties (ascending scan).
        if run - i > best_count {
            best_count = run - i;
            best_value = value;
        }
        i = run;
    }
    best_value
}
