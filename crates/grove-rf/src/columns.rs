//! Resolution of raw (possibly negative) column indices against a matrix.

use crate::error::RfError;

/// Resolved feature and target column selection.
///
/// All indices are non-negative and lie in `[0, n_cols)` for the column
/// count they were resolved against. Duplicates in the feature set are
/// permitted, and the target column is not auto-excluded from the features:
/// overlap only happens when the user asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    feature_columns: Vec<usize>,
    target_column: usize,
}

impl ColumnSpec {
    /// Resolve raw indices against a total column count.
    ///
    /// A negative index `i` resolves to `n_cols + i` (so `-1` is the last
    /// column); non-negative indices pass through unchanged, which makes
    /// resolution idempotent.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::NoFeatureColumns`] | `raw_features` is empty |
    /// | [`RfError::ColumnOutOfRange`] | any index resolves outside `[0, n_cols)` |
    pub fn resolve(
        raw_features: &[i64],
        raw_target: i64,
        n_cols: usize,
    ) -> Result<Self, RfError> {
        if raw_features.is_empty() {
            return Err(RfError::NoFeatureColumns);
        }
        let feature_columns = raw_features
            .iter()
            .map(|&raw| resolve_index(raw, n_cols))
            .collect::<Result<Vec<usize>, RfError>>()?;
        let target_column = resolve_index(raw_target, n_cols)?;
        Ok(Self {
            feature_columns,
            target_column,
        })
    }

    /// Return the resolved feature column indices, in selection order.
    #[must_use]
    pub fn feature_columns(&self) -> &[usize] {
        &self.feature_columns
    }

    /// Return the resolved target column index.
    #[must_use]
    pub fn target_column(&self) -> usize {
        self.target_column
    }

    /// Return the number of selected feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_columns.len()
    }

    /// Return the minimum matrix width this spec addresses.
    #[must_use]
    pub fn min_cols(&self) -> usize {
        self.feature_columns
            .iter()
            .copied()
            .chain(std::iter::once(self.target_column))
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Resolve one raw index: `n_cols + i` for negative `i`, no-op otherwise.
fn resolve_index(raw: i64, n_cols: usize) -> Result<usize, RfError> {
    let resolved = if raw < 0 { n_cols as i64 + raw } else { raw };
    if resolved < 0 || resolved >= n_cols as i64 {
        return Err(RfError::ColumnOutOfRange { index: raw, n_cols });
    }
    Ok(resolved as usize)
}
