use rand::Rng;

use crate::matrix::Matrix;
use crate::node::FeatureIndex;

/// Prediction task type: drives the split criterion and leaf aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Target values are class labels; leaves predict the majority value.
    Classification,
    /// Target values are continuous; leaves predict the mean value.
    Regression,
}

impl TaskKind {
    /// Return the default split criterion for this task.
    #[must_use]
    pub fn default_criterion(self) -> SplitCriterion {
        match self {
            TaskKind::Classification => SplitCriterion::Gini,
            TaskKind::Regression => SplitCriterion::Variance,
        }
    }
}

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²). Classification only.
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i)). Classification only.
    Entropy,
    /// Variance of the target values. Regression only.
    Variance,
}

impl SplitCriterion {
    /// Return `true` if this criterion applies to the given task.
    #[must_use]
    pub fn fits_task(self, task: TaskKind) -> bool {
        match self {
            SplitCriterion::Gini | SplitCriterion::Entropy => task == TaskKind::Classification,
            SplitCriterion::Variance => task == TaskKind::Regression,
        }
    }

    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns `0.0` when `n_samples` is zero.
    #[must_use]
    pub(crate) fn class_impurity(self, class_counts: &[usize], n_samples: usize) -> f64 {
        if n_samples == 0 {
            return 0.0;
        }
        let n = n_samples as f64;
        match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => {
                -class_counts
                    .iter()
                    .filter(|&&c| c > 0)
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p.ln()
                    })
                    .sum::<f64>()
            }
            SplitCriterion::Variance => {
                unreachable!("variance impurity is computed from running sums")
            }
        }
    }
}

/// Target values of a sample set, in the representation the scan needs.
///
/// For classification, the distinct target values are mapped once to dense
/// class indices (ascending value order, so class index order equals value
/// order). `labels` is matrix-row-indexed and only meaningful at the rows
/// the targets were extracted from.
#[derive(Debug, Clone)]
pub(crate) enum Targets {
    /// Dense class indices plus the class value each index stands for.
    Classes {
        labels: Vec<usize>,
        class_values: Vec<f64>,
    },
    /// Continuous targets, read straight from the matrix.
    Reals,
}

impl Targets {
    /// Extract targets for `rows` from the matrix's target column.
    pub(crate) fn extract(
        matrix: &Matrix,
        target_column: usize,
        rows: &[usize],
        task: TaskKind,
    ) -> Self {
        match task {
            TaskKind::Regression => Targets::Reals,
            TaskKind::Classification => {
                let mut class_values: Vec<f64> =
                    rows.iter().map(|&r| matrix.get(r, target_column)).collect();
                class_values.sort_unstable_by(f64::total_cmp);
                class_values.dedup_by(|a, b| a.total_cmp(b).is_eq());

                let mut labels = vec![0usize; matrix.rows()];
                for &r in rows {
                    let value = matrix.get(r, target_column);
                    let idx = class_values
                        .binary_search_by(|probe| probe.total_cmp(&value))
                        .expect("class value present in mapping");
                    labels[r] = idx;
                }
                Targets::Classes {
                    labels,
                    class_values,
                }
            }
        }
    }

    /// Return the number of distinct classes (zero for regression targets).
    pub(crate) fn n_classes(&self) -> usize {
        match self {
            Targets::Classes { class_values, .. } => class_values.len(),
            Targets::Reals => 0,
        }
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Matrix column used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value (one of the values present in the node's samples).
    pub(crate) threshold: f64,
    /// Sample rows going to the left child (`value <= threshold`).
    pub(crate) left_rows: Vec<usize>,
    /// Sample rows going to the right child (`value > threshold`).
    pub(crate) right_rows: Vec<usize>,
}

/// Find the best split among a random subset of the candidate columns.
///
/// Draws up to `max_features` columns without replacement (re-drawn at
/// every node), then scans each drawn column in ascending column order:
/// the `(value, row)` pairs are sorted and swept left-to-right with
/// incremental statistics, evaluating every distinct value present as a
/// `<= threshold` boundary. The best split is kept only on a strict
/// improvement, so ties resolve to the lowest column index and then the
/// lowest threshold.
///
/// Returns `None` when no split strictly reduces the weighted impurity or
/// none satisfies `min_samples_leaf` on both sides.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    matrix: &Matrix,
    feature_columns: &[usize],
    target_column: usize,
    targets: &Targets,
    samples: &[usize],
    criterion: SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_samples = samples.len();
    if n_samples < 2 || feature_columns.is_empty() {
        return None;
    }

    // Partial Fisher-Yates: draw `max_features` candidate positions.
    let mut order: Vec<usize> = feature_columns.to_vec();
    let take = max_features.min(order.len());
    for i in 0..take {
        let j = rng.gen_range(i..order.len());
        order.swap(i, j);
    }
    let mut candidates = order[..take].to_vec();
    // Ascending column order makes the tie-break deterministic.
    candidates.sort_unstable();

    let mut best_decrease = 0.0f64;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &col in &candidates {
        let mut sorted: Vec<(f64, usize)> = samples
            .iter()
            .map(|&r| (matrix.get(r, col), r))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let scanned = match targets {
            Targets::Classes { labels, .. } => scan_classification(
                &sorted,
                labels,
                targets.n_classes(),
                criterion,
                min_samples_leaf,
            ),
            Targets::Reals => scan_regression(
                matrix,
                target_column,
                &sorted,
                min_samples_leaf,
            ),
        };

        if let Some((threshold, decrease)) = scanned
            && decrease > best_decrease
        {
            best_decrease = decrease;
            best = Some((FeatureIndex::new(col), threshold));
        }
    }

    let (feature, threshold) = best?;

    // Partition the samples, preserving their order.
    let mut left_rows = Vec::with_capacity(n_samples / 2);
    let mut right_rows = Vec::with_capacity(n_samples / 2);
    for &r in samples {
        if matrix.get(r, feature.index()) <= threshold {
            left_rows.push(r);
        } else {
            right_rows.push(r);
        }
    }

    Some(SplitResult {
        feature,
        threshold,
        left_rows,
        right_rows,
    })
}

/// Sweep one sorted column with incremental class counts.
///
/// Returns the best `(threshold, weighted impurity decrease)` for this
/// column, or `None` when no boundary is valid. Ties within the column
/// keep the lowest threshold (strict improvement, ascending sweep).
fn scan_classification(
    sorted: &[(f64, usize)],
    labels: &[usize],
    n_classes: usize,
    criterion: SplitCriterion,
    min_samples_leaf: usize,
) -> Option<(f64, f64)> {
    let n_samples = sorted.len();

    let mut right_counts = vec![0usize; n_classes];
    for &(_, r) in sorted {
        right_counts[labels[r]] += 1;
    }
    let parent_impurity = criterion.class_impurity(&right_counts, n_samples);

    let mut left_counts = vec![0usize; n_classes];
    let mut best: Option<(f64, f64)> = None;

    for i in 0..(n_samples - 1) {
        let (val, r) = sorted[i];
        let class = labels[r];
        left_counts[class] += 1;
        right_counts[class] -= 1;

        // A boundary only exists where the next value differs.
        if val == sorted[i + 1].0 {
            continue;
        }

        let n_left = i + 1;
        let n_right = n_samples - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }

        let left_impurity = criterion.class_impurity(&left_counts, n_left);
        let right_impurity = criterion.class_impurity(&right_counts, n_right);
        let decrease = (n_samples as f64) * parent_impurity
            - (n_left as f64) * left_impurity
            - (n_right as f64) * right_impurity;

        if best.is_none_or(|(_, d)| decrease > d) {
            best = Some((val, decrease));
        }
    }

    best
}

/// Sweep one sorted column with incremental sums for variance reduction.
fn scan_regression(
    matrix: &Matrix,
    target_column: usize,
    sorted: &[(f64, usize)],
    min_samples_leaf: usize,
) -> Option<(f64, f64)> {
    let n_samples = sorted.len();

    let mut right_sum = 0.0f64;
    let mut right_sum_sq = 0.0f64;
    for &(_, r) in sorted {
        let y = matrix.get(r, target_column);
        right_sum += y;
        right_sum_sq += y * y;
    }
    let parent_impurity = variance(right_sum, right_sum_sq, n_samples);

    let mut left_sum = 0.0f64;
    let mut left_sum_sq = 0.0f64;
    let mut best: Option<(f64, f64)> = None;

    for i in 0..(n_samples - 1) {
        let (val, r) = sorted[i];
        let y = matrix.get(r, target_column);
        left_sum += y;
        left_sum_sq += y * y;
        right_sum -= y;
        right_sum_sq -= y * y;

        if val == sorted[i + 1].0 {
            continue;
        }

        let n_left = i + 1;
        let n_right = n_samples - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }

        let left_impurity = variance(left_sum, left_sum_sq, n_left);
        let right_impurity = variance(right_sum, right_sum_sq, n_right);
        let decrease = (n_samples as f64) * parent_impurity
            - (n_left as f64) * left_impurity
            - (n_right as f64) * right_impurity;

        if best.is_none_or(|(_, d)| decrease > d) {
            best = Some((val, decrease));
        }
    }

    best
}

/// Population variance from running sums, clamped against rounding noise.
fn variance(sum: f64, sum_sq: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
