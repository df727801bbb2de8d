use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::columns::ColumnSpec;
use crate::error::RfError;
use crate::matrix::Matrix;
use crate::node::{Node, NodeIndex};
use crate::split::{SplitCriterion, TaskKind, Targets, find_best_split};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default                      |
/// |--------------------|------------------------------|
/// | `task`             | `Classification`             |
/// | `criterion`        | derived from task            |
/// | `max_depth`        | `None` (unlimited)           |
/// | `min_samples_leaf` | 1                            |
/// | `max_features`     | `None` (all feature columns) |
/// | `seed`             | 42                           |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) task: TaskKind,
    pub(crate) criterion: Option<SplitCriterion>,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            task: TaskKind::Classification,
            criterion: None,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
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

    /// Set the maximum tree depth.
    ///
    /// `None` means grow until the leaf criteria stop the recursion.
    /// `Some(d)` limits depth to `d` levels (root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the leaf size threshold: nodes with at most this many samples
    /// become leaves, and no split may leave fewer on either side.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the number of candidate columns drawn at each split search.
    ///
    /// `None` means consider every feature column.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build one decision tree over the given sample rows.
    ///
    /// `samples` are row indices into `matrix`; the matrix itself is never
    /// copied. Duplicate rows (bootstrap draws) are fine.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `samples` is empty |
    /// | [`RfError::RowOutOfRange`] | a sample row exceeds the matrix |
    /// | [`RfError::ColumnOutOfRange`] | `columns` address columns the matrix lacks |
    /// | [`RfError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`RfError::InvalidMinSamplesLeaf`] | `min_samples_leaf` is 0 |
    /// | [`RfError::InvalidMaxFeatures`] | `max_features` outside `[1, n_features]` |
    /// | [`RfError::CriterionTaskMismatch`] | criterion does not fit the task |
    #[instrument(skip(self, matrix, columns, samples), fields(n_samples = samples.len()))]
    pub fn fit(
        &self,
        matrix: &Matrix,
        columns: &ColumnSpec,
        samples: &[usize],
    ) -> Result<DecisionTree, RfError> {
        let params = self.validate(matrix, columns, samples)?;
        let targets = Targets::extract(matrix, columns.target_column(), samples, self.task);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();
        let ctx = BuildContext {
            matrix,
            columns,
            targets: &targets,
            criterion: params.criterion,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            max_features: params.max_features,
        };
        let root = build_node(&ctx, samples, 0, &mut rng, &mut arena);

        debug!(
            root_index = root.index(),
            n_nodes = arena.len(),
            "decision tree built"
        );

        Ok(DecisionTree {
            nodes: arena,
            min_cols: columns.min_cols(),
        })
    }

    /// Check config and inputs, returning the resolved knobs.
    fn validate(
        &self,
        matrix: &Matrix,
        columns: &ColumnSpec,
        samples: &[usize],
    ) -> Result<ResolvedParams, RfError> {
        if samples.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if let Some(&row) = samples.iter().find(|&&r| r >= matrix.rows()) {
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

        let n_features = columns.n_features();
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        Ok(ResolvedParams {
            criterion,
            max_features,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct ResolvedParams {
    criterion: SplitCriterion,
    max_features: usize,
}

/// Shared inputs for the recursive build.
struct BuildContext<'a> {
    matrix: &'a Matrix,
    columns: &'a ColumnSpec,
    targets: &'a Targets,
    criterion: SplitCriterion,
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    max_features: usize,
}

/// Recursively build the arena-based decision tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
fn build_node(
    ctx: &BuildContext<'_>,
    samples: &[usize],
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    assert!(!samples.is_empty(), "empty sample set reached a tree node");
    let n_samples = samples.len();

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let value = leaf_value(ctx, samples);
        let idx = arena.len();
        arena.push(Node::Leaf { value, n_samples });
        NodeIndex::new(idx)
    };

    // Leaf criteria: depth cap, leaf size, pure node.
    let depth_exceeded = ctx.max_depth.is_some_and(|max_d| depth >= max_d);
    let too_few = n_samples <= ctx.min_samples_leaf;
    let pure = targets_identical(ctx, samples);

    if depth_exceeded || too_few || pure {
        return make_leaf(arena);
    }

    // Leaf when no candidate split strictly improves the criterion.
    let split = match find_best_split(
        ctx.matrix,
        ctx.columns.feature_columns(),
        ctx.columns.target_column(),
        ctx.targets,
        samples,
        ctx.criterion,
        ctx.max_features,
        ctx.min_samples_leaf,
        rng,
    ) {
        Some(s) => s,
        None => return make_leaf(arena),
    };

    // Arena pattern: reserve the index, recurse, then overwrite.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        value: 0.0,
        n_samples,
    });

    let left = build_node(ctx, &split.left_rows, depth + 1, rng, arena);
    let right = build_node(ctx, &split.right_rows, depth + 1, rng, arena);

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        n_samples,
    };

    NodeIndex::new(node_idx)
}

/// Majority class value (ties to the smallest value) or mean target.
fn leaf_value(ctx: &BuildContext<'_>, samples: &[usize]) -> f64 {
    match ctx.targets {
        Targets::Classes {
            labels,
            class_values,
        } => {
            let mut counts = vec![0usize; class_values.len()];
            for &r in samples {
                counts[labels[r]] += 1;
            }
            // Strict comparison keeps the lowest class index on ties, and
            // class indices are ordered by value.
            let mut best = 0usize;
            for (idx, &count) in counts.iter().enumerate() {
                if count > counts[best] {
                    best = idx;
                }
            }
            class_values[best]
        }
        Targets::Reals => {
            let sum: f64 = samples
                .iter()
                .map(|&r| ctx.matrix.get(r, ctx.columns.target_column()))
                .sum();
            sum / samples.len() as f64
        }
    }
}

/// `true` when every target value in the sample set is identical.
fn targets_identical(ctx: &BuildContext<'_>, samples: &[usize]) -> bool {
    match ctx.targets {
        Targets::Classes { labels, .. } => {
            let first = labels[samples[0]];
            samples.iter().all(|&r| labels[r] == first)
        }
        Targets::Reals => {
            let col = ctx.columns.target_column();
            let first = ctx.matrix.get(samples[0], col);
            samples
                .iter()
                .all(|&r| ctx.matrix.get(r, col).total_cmp(&first).is_eq())
        }
    }
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node>` rooted at index 0, with children
/// referenced by [`NodeIndex`].
#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) min_cols: usize,
}

impl DecisionTree {
    /// Predict the value for one matrix row.
    ///
    /// Traverses from the root: at each split, goes left when
    /// `row[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::RowOutOfRange`] | `row >= matrix.rows()` |
    /// | [`RfError::PredictionColumnsMismatch`] | the matrix is narrower than the training columns |
    pub fn predict(&self, matrix: &Matrix, row: usize) -> Result<f64, RfError> {
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
        Ok(self.traverse(matrix, row))
    }

    /// Return the total number of nodes (splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-leaf tree has depth 0. Uses an iterative BFS.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => {
                    if d > max_depth {
                        max_depth = d;
                    }
                }
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    /// Walk from the root to a leaf and return its value.
    ///
    /// Bounds are the caller's responsibility; [`DecisionTree::predict`]
    /// checks them once.
    pub(crate) fn traverse(&self, matrix: &Matrix, row: usize) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if matrix.get(row, feature.index()) <= *threshold {
                        idx = left.index();
                    } else {
                        idx = right.index();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_from_rows(rows: &[&[f64]]) -> Matrix {
        let cols = rows[0].len();
        let data: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Matrix::from_vec(data, rows.len(), cols).unwrap()
    }

    fn two_feature_spec(matrix: &Matrix) -> ColumnSpec {
        ColumnSpec::resolve(&[0, 1], -1, matrix.cols()).unwrap()
    }

    #[test]
    fn empty_sample_set_error() {
        let m = matrix_from_rows(&[&[1.0, 2.0, 0.0]]);
        let spec = two_feature_spec(&m);
        let err = DecisionTreeConfig::new().fit(&m, &spec, &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let m = matrix_from_rows(&[
            &[1.0, 2.0, 0.0],
            &[3.0, 4.0, 0.0],
            &[5.0, 6.0, 0.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..3).collect();
        let tree = DecisionTreeConfig::new().fit(&m, &spec, &samples).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&m, 1).unwrap(), 0.0);
    }

    #[test]
    fn linearly_separable_correct_split() {
        let m = matrix_from_rows(&[
            &[1.0, 0.0, 0.0],
            &[2.0, 0.0, 0.0],
            &[3.0, 0.0, 0.0],
            &[10.0, 0.0, 1.0],
            &[11.0, 0.0, 1.0],
            &[12.0, 0.0, 1.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..6).collect();
        let tree = DecisionTreeConfig::new()
            .with_seed(42)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert_eq!(tree.predict(&m, 1).unwrap(), 0.0);
        assert_eq!(tree.predict(&m, 4).unwrap(), 1.0);
    }

    #[test]
    fn min_samples_leaf_above_sample_count_forces_single_leaf() {
        let m = matrix_from_rows(&[
            &[1.0, 0.0, 0.0],
            &[2.0, 0.0, 1.0],
            &[10.0, 0.0, 0.0],
            &[11.0, 0.0, 1.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..4).collect();
        let tree = DecisionTreeConfig::new()
            .with_min_samples_leaf(10)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.nodes[0].is_leaf());
    }

    /// Four 1-class clusters along one feature: needs depth >= 2 to
    /// separate fully.
    fn four_class_matrix() -> Matrix {
        matrix_from_rows(&[
            &[1.0, 0.0, 0.0],
            &[2.0, 0.0, 1.0],
            &[10.0, 0.0, 2.0],
            &[11.0, 0.0, 3.0],
        ])
    }

    #[test]
    fn max_depth_one_allows_at_most_one_split() {
        let m = four_class_matrix();
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..4).collect();
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .with_seed(42)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert!(tree.depth() <= 1);
        assert_eq!(tree.nodes.iter().filter(|n| !n.is_leaf()).count(), 1);
    }

    #[test]
    fn four_classes_need_depth_at_least_two() {
        let m = four_class_matrix();
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..4).collect();
        let tree = DecisionTreeConfig::new()
            .with_seed(42)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert!(tree.depth() >= 2);
        for row in 0..4 {
            assert_eq!(tree.predict(&m, row).unwrap(), m.get(row, 2));
        }
    }

    #[test]
    fn xor_has_no_single_improving_split() {
        // Every axis-aligned split of XOR leaves both children at the
        // parent's impurity, so the root becomes a leaf.
        let m = matrix_from_rows(&[
            &[0.0, 0.0, 0.0],
            &[0.0, 1.0, 1.0],
            &[1.0, 0.0, 1.0],
            &[1.0, 1.0, 0.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..4).collect();
        let tree = DecisionTreeConfig::new()
            .with_seed(42)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        // 2-2 vote: the leaf predicts the smaller class value.
        assert_eq!(tree.predict(&m, 0).unwrap(), 0.0);
    }

    #[test]
    fn majority_tie_breaks_to_smallest_class_value() {
        // Constant feature: no split improves, so the root is a leaf with
        // a 2-2 vote between classes 3.0 and 7.0.
        let m = matrix_from_rows(&[
            &[1.0, 0.0, 7.0],
            &[1.0, 0.0, 3.0],
            &[1.0, 0.0, 7.0],
            &[1.0, 0.0, 3.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..4).collect();
        let tree = DecisionTreeConfig::new().fit(&m, &spec, &samples).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&m, 0).unwrap(), 3.0);
    }

    #[test]
    fn regression_leaf_predicts_mean() {
        let m = matrix_from_rows(&[
            &[1.0, 0.0, 2.0],
            &[2.0, 0.0, 4.0],
            &[3.0, 0.0, 6.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..3).collect();
        let tree = DecisionTreeConfig::new()
            .with_task(TaskKind::Regression)
            .with_min_samples_leaf(3)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert!((tree.predict(&m, 0).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn regression_splits_step_function() {
        let m = matrix_from_rows(&[
            &[1.0, 0.0, 5.0],
            &[2.0, 0.0, 5.0],
            &[10.0, 0.0, 20.0],
            &[11.0, 0.0, 20.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..4).collect();
        let tree = DecisionTreeConfig::new()
            .with_task(TaskKind::Regression)
            .with_seed(42)
            .fit(&m, &spec, &samples)
            .unwrap();
        assert!((tree.predict(&m, 0).unwrap() - 5.0).abs() < 1e-12);
        assert!((tree.predict(&m, 3).unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let m = matrix_from_rows(&[
            &[1.0, 5.0, 0.0],
            &[2.0, 6.0, 0.0],
            &[3.0, 7.0, 0.0],
            &[10.0, 15.0, 1.0],
            &[11.0, 16.0, 1.0],
            &[12.0, 17.0, 1.0],
        ]);
        let spec = two_feature_spec(&m);
        let samples: Vec<usize> = (0..6).collect();
        let tree1 = DecisionTreeConfig::new()
            .with_max_features(Some(1))
            .with_seed(123)
            .fit(&m, &spec, &samples)
            .unwrap();
        let tree2 = DecisionTreeConfig::new()
            .with_max_features(Some(1))
            .with_seed(123)
            .fit(&m, &spec, &samples)
            .unwrap();
        for row in 0..m.rows() {
            assert_eq!(
                tree1.predict(&m, row).unwrap(),
                tree2.predict(&m, row).unwrap()
            );
        }
    }

    #[test]
    fn invalid_max_depth_error() {
        let m = matrix_from_rows(&[&[1.0, 2.0, 0.0]]);
        let spec = two_feature_spec(&m);
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&m, &spec, &[0])
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidMaxDepth { max_depth: 0 }));
    }

    #[test]
    fn invalid_max_features_error() {
        let m = matrix_from_rows(&[&[1.0, 2.0, 0.0]]);
        let spec = two_feature_spec(&m);
        let err = DecisionTreeConfig::new()
            .with_max_features(Some(5))
            .fit(&m, &spec, &[0])
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::InvalidMaxFeatures {
                max_features: 5,
                n_features: 2,
            }
        ));
    }

    #[test]
    fn criterion_task_mismatch_error() {
        let m = matrix_from_rows(&[&[1.0, 2.0, 0.0]]);
        let spec = two_feature_spec(&m);
        let err = DecisionTreeConfig::new()
            .with_task(TaskKind::Regression)
            .with_criterion(Some(SplitCriterion::Gini))
            .fit(&m, &spec, &[0])
            .unwrap_err();
        assert!(matches!(err, RfError::CriterionTaskMismatch { .. }));
    }

    #[test]
    fn sample_row_out_of_range_error() {
        let m = matrix_from_rows(&[&[1.0, 2.0, 0.0]]);
        let spec = two_feature_spec(&m);
        let err = DecisionTreeConfig::new().fit(&m, &spec, &[0, 5]).unwrap_err();
        assert!(matches!(err, RfError::RowOutOfRange { row: 5, n_rows: 1 }));
    }
}
