use crate::split::{SplitCriterion, TaskKind};

/// Errors from matrix construction, column resolution, training, and
/// cross-validation.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when a matrix is constructed with zero rows or columns.
    #[error("matrix must have at least one row and one column, got {rows}x{cols}")]
    EmptyMatrix {
        /// The requested row count.
        rows: usize,
        /// The requested column count.
        cols: usize,
    },

    /// Returned when a matrix buffer does not match the declared dimensions.
    #[error("matrix buffer has {len} values, expected {rows}x{cols} = {expected}")]
    DimensionMismatch {
        /// The declared row count.
        rows: usize,
        /// The declared column count.
        cols: usize,
        /// The actual buffer length.
        len: usize,
        /// The expected buffer length (`rows * cols`).
        expected: usize,
    },

    /// Returned when a column index resolves outside `[0, n_cols)`.
    #[error("column index {index} resolves outside [0, {n_cols})")]
    ColumnOutOfRange {
        /// The raw (possibly negative) index as given.
        index: i64,
        /// The total number of columns in the matrix.
        n_cols: usize,
    },

    /// Returned when the resolved feature set is empty.
    #[error("no feature columns selected")]
    NoFeatureColumns,

    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds the feature count.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of selected feature columns.
        n_features: usize,
    },

    /// Returned when the split criterion does not fit the task type.
    #[error("split criterion {criterion:?} cannot be used for {task:?}")]
    CriterionTaskMismatch {
        /// The requested criterion.
        criterion: SplitCriterion,
        /// The configured task type.
        task: TaskKind,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when n_folds exceeds the number of rows.
    #[error("n_folds is {n_folds}, but the dataset has only {n_samples} rows")]
    FoldCountExceedsRows {
        /// The requested number of folds.
        n_folds: usize,
        /// The number of rows available.
        n_samples: usize,
    },

    /// Returned when training is attempted over zero rows.
    #[error("training sample set is empty")]
    EmptyDataset,

    /// Returned when a prediction row index is out of range.
    #[error("row {row} is out of range for a matrix with {n_rows} rows")]
    RowOutOfRange {
        /// The requested row index.
        row: usize,
        /// The number of rows in the matrix.
        n_rows: usize,
    },

    /// Returned when a prediction matrix is too narrow for the trained trees.
    #[error("prediction matrix has {got} columns, model requires at least {expected}")]
    PredictionColumnsMismatch {
        /// The minimum column count required by the model.
        expected: usize,
        /// The actual column count of the prediction matrix.
        got: usize,
    },
}
