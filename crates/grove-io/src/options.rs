//! Options-file parsing: `key=value` hyperparameters for a training run.

use std::path::Path;

use grove_rf::MaxFeatures;
use tracing::debug;

use crate::IoError;

/// Maximum number of feature columns an `include_columns` line may expand
/// to.
pub const MAX_INCLUDE_COLUMNS: usize = 64;

/// Raw training options read from a `key=value` text file.
///
/// Column indices are kept raw (possibly negative); they resolve against
/// the matrix's column count later, via
/// [`ColumnSpec::resolve`](grove_rf::ColumnSpec::resolve).
///
/// File format:
/// - one `key=value` pair per line;
/// - `#`-prefixed and blank lines are skipped, as are lines without `=`;
/// - unknown keys are ignored;
/// - `include_columns` takes comma-separated indices and inclusive
///   `start:end` ranges (either direction), e.g. `0:3,-3:-1,7`;
/// - `max_depth=0` means unbounded;
/// - `max_features` is `auto` (all columns), `sqrt`, or a count.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Number of trees in the forest.
    pub n_estimators: usize,
    /// Maximum tree depth; `None` is unbounded.
    pub max_depth: Option<usize>,
    /// Minimum samples per leaf.
    pub min_samples_leaf: usize,
    /// Feature subsampling strategy per split.
    pub max_features: MaxFeatures,
    /// Raw (possibly negative) feature column indices, ranges expanded.
    pub include_columns: Vec<i64>,
    /// Raw (possibly negative) target column index.
    pub target_column: i64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            include_columns: Vec::new(),
            target_column: -1,
        }
    }
}

impl Options {
    /// Parse an options file, starting from the defaults.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::OptionsRead`] | File cannot be read |
    /// | [`IoError::OptionsParse`] | A value fails to parse |
    /// | [`IoError::TooManyIncludeColumns`] | `include_columns` expands past [`MAX_INCLUDE_COLUMNS`] |
    pub fn from_file(path: &Path) -> Result<Self, IoError> {
        let content = std::fs::read_to_string(path).map_err(|e| IoError::OptionsRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, IoError> {
        let mut opts = Self::default();

        for (index, raw_line) in content.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "n_estimators" => {
                    opts.n_estimators = parse_value(value, path, line, "n_estimators")?;
                }
                "max_depth" => {
                    let depth: usize = parse_value(value, path, line, "max_depth")?;
                    opts.max_depth = if depth == 0 { None } else { Some(depth) };
                }
                "min_samples_leaf" => {
                    opts.min_samples_leaf = parse_value(value, path, line, "min_samples_leaf")?;
                }
                "max_features" => {
                    opts.max_features = parse_max_features(value, path, line)?;
                }
                "include_columns" => {
                    opts.include_columns = parse_include_columns(value, path, line)?;
                }
                "target_column" => {
                    opts.target_column = parse_value(value, path, line, "target_column")?;
                }
                other => {
                    debug!(key = other, line, "ignoring unknown options key");
                }
            }
        }

        Ok(opts)
    }
}

fn parse_value<T: std::str::FromStr>(
    value: &str,
    path: &Path,
    line: usize,
    key: &str,
) -> Result<T, IoError> {
    value.parse().map_err(|_| IoError::OptionsParse {
        path: path.to_path_buf(),
        line,
        reason: format!("{key} must be a number, got \"{value}\""),
    })
}

fn parse_max_features(value: &str, path: &Path, line: usize) -> Result<MaxFeatures, IoError> {
    match value {
        "auto" => Ok(MaxFeatures::All),
        "sqrt" => Ok(MaxFeatures::Sqrt),
        other => {
            let n: usize = other.parse().map_err(|_| IoError::OptionsParse {
                path: path.to_path_buf(),
                line,
                reason: format!("max_features must be \"auto\", \"sqrt\", or a count, got \"{other}\""),
            })?;
            Ok(MaxFeatures::Fixed(n))
        }
    }
}

/// Expand a comma-separated list of indices and inclusive `start:end`
/// ranges into raw indices, preserving order.
fn parse_include_columns(value: &str, path: &Path, line: usize) -> Result<Vec<i64>, IoError> {
    let mut out = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.split_once(':') {
            None => out.push(parse_value::<i64>(token, path, line, "include_columns")?),
            Some((start, end)) => {
                let start: i64 = parse_value(start.trim(), path, line, "include_columns")?;
                let end: i64 = parse_value(end.trim(), path, line, "include_columns")?;
                // Inclusive expansion in the direction start implies.
                if start <= end {
                    out.extend(start..=end);
                } else {
                    out.extend((end..=start).rev());
                }
            }
        }
        if out.len() > MAX_INCLUDE_COLUMNS {
            return Err(IoError::TooManyIncludeColumns {
                count: out.len(),
                max: MAX_INCLUDE_COLUMNS,
            });
        }
    }
    Ok(out)
}
