//! CSV matrix reader with full input validation.

use std::path::{Path, PathBuf};

use grove_rf::Matrix;
use tracing::{debug, info, instrument, warn};

use crate::IoError;

/// Dimensions of a CSV dataset: data rows (header excluded) and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim {
    /// Number of data rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

/// What to do with tokens that fail numeric parsing.
///
/// `Lenient` preserves the original best-effort ingestion behavior;
/// `Strict` turns every malformed token into a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Malformed tokens degrade to `0.0` (logged with `warn!`).
    #[default]
    Lenient,
    /// Malformed tokens are fatal [`IoError::InvalidNumeric`].
    Strict,
}

/// Reads a numeric matrix from a comma-delimited text file.
///
/// Expected format:
/// - One header line (discarded).
/// - Every remaining line has the same number of comma-separated numeric
///   tokens. No quoting or escaping.
///
/// When dimensions are not supplied up-front, [`MatrixReader::read`] makes
/// two passes: one to count rows and columns (validating rectangularity),
/// one to parse values. With [`MatrixReader::with_dims`] a single parse
/// pass suffices; token counts are still verified per line.
///
/// Tokens parsing to NaN or infinity are treated as malformed, subject to
/// the configured [`ParsePolicy`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::EmptyDataset`] | Zero data rows or zero columns |
/// | [`IoError::RaggedRow`] | Line with a divergent token count |
/// | [`IoError::RowCountMismatch`] | Pre-supplied row count doesn't match the file |
/// | [`IoError::InvalidNumeric`] | Malformed token under `Strict` |
pub struct MatrixReader {
    path: PathBuf,
    dims: Option<Dim>,
    policy: ParsePolicy,
}

impl MatrixReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            dims: None,
            policy: ParsePolicy::default(),
        }
    }

    /// Supply externally-known dimensions, skipping the counting pass.
    #[must_use]
    pub fn with_dims(mut self, dims: Dim) -> Self {
        self.dims = Some(dims);
        self
    }

    /// Set the malformed-token policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Count data rows and columns without parsing values.
    ///
    /// The column count comes from the first data line; every later line
    /// must match it exactly.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_dims(&self) -> Result<Dim, IoError> {
        let mut rdr = self.open()?;

        let mut rows = 0usize;
        let mut cols = 0usize;
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if row_index == 0 {
                cols = record.len();
            } else if record.len() != cols {
                return Err(IoError::RaggedRow {
                    path: self.path.clone(),
                    line: row_index + 2,
                    expected: cols,
                    got: record.len(),
                });
            }
            rows += 1;
        }

        if rows == 0 || cols == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        debug!(rows, cols, "counted CSV dimensions");
        Ok(Dim { rows, cols })
    }

    /// Read and validate the full matrix.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Matrix, IoError> {
        let dims = match self.dims {
            Some(d) => d,
            None => self.read_dims()?,
        };
        if dims.rows == 0 || dims.cols == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let mut rdr = self.open()?;
        let mut data = Vec::with_capacity(dims.rows * dims.cols);
        let mut rows_read = 0usize;

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            let line = row_index + 2;

            if record.len() != dims.cols {
                return Err(IoError::RaggedRow {
                    path: self.path.clone(),
                    line,
                    expected: dims.cols,
                    got: record.len(),
                });
            }

            for (column, raw) in record.iter().enumerate() {
                let token = raw.trim();
                match token.parse::<f64>() {
                    Ok(value) if value.is_finite() => data.push(value),
                    _ => match self.policy {
                        ParsePolicy::Lenient => {
                            warn!(line, column, raw = token, "malformed token, using 0");
                            data.push(0.0);
                        }
                        ParsePolicy::Strict => {
                            return Err(IoError::InvalidNumeric {
                                path: self.path.clone(),
                                line,
                                column,
                                raw: token.to_string(),
                            });
                        }
                    },
                }
            }
            rows_read += 1;
        }

        if rows_read != dims.rows {
            return Err(IoError::RowCountMismatch {
                path: self.path.clone(),
                expected: dims.rows,
                got: rows_read,
            });
        }

        info!(
            rows = dims.rows,
            cols = dims.cols,
            "matrix loaded"
        );

        // Counts were validated above, so construction cannot fail.
        Ok(Matrix::from_vec(data, dims.rows, dims.cols)
            .expect("validated dimensions match the buffer"))
    }

    /// Open the file behind a header-skipping, length-tolerant CSV reader.
    ///
    /// `flexible(true)` lets our own ragged-row check fire with a line
    /// number instead of a low-level CSV error.
    fn open(&self) -> Result<csv::Reader<std::fs::File>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
