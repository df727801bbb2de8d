//! I/O error types for grove-io.

use std::path::PathBuf;

/// Errors from file I/O, CSV parsing, and options-file parsing.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file has zero data rows or zero columns.
    #[error("empty dataset (no data rows or columns) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different token count than the first
    /// data row.
    #[error("ragged row in {path}: line {line} has {got} columns, expected {expected}")]
    RaggedRow {
        /// Path to the CSV file.
        path: PathBuf,
        /// One-based file line number (the header is line 1).
        line: usize,
        /// Expected number of columns (from the first data row).
        expected: usize,
        /// Actual number of columns on this line.
        got: usize,
    },

    /// Returned when the file's data row count differs from pre-supplied
    /// dimensions.
    #[error("{path} has {got} data rows, expected {expected}")]
    RowCountMismatch {
        /// Path to the CSV file.
        path: PathBuf,
        /// Expected number of data rows.
        expected: usize,
        /// Actual number of data rows.
        got: usize,
    },

    /// Returned under [`ParsePolicy::Strict`](crate::ParsePolicy) when a
    /// token does not parse as a finite number.
    #[error("invalid numeric token \"{raw}\" in {path}: line {line}, column {column}")]
    InvalidNumeric {
        /// Path to the CSV file.
        path: PathBuf,
        /// One-based file line number (the header is line 1).
        line: usize,
        /// Zero-based column index.
        column: usize,
        /// The raw token that failed to parse.
        raw: String,
    },

    /// Returned when the options file cannot be read.
    #[error("cannot read options file {path}")]
    OptionsRead {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an options-file value does not parse.
    #[error("invalid options value in {path} at line {line}: {reason}")]
    OptionsParse {
        /// Path to the options file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// Returned when include_columns expands past the supported maximum.
    #[error("include_columns expands to {count} columns, maximum is {max}")]
    TooManyIncludeColumns {
        /// The number of columns the include list expanded to.
        count: usize,
        /// The supported maximum.
        max: usize,
    },
}
