//! File I/O for the grove pipeline: CSV matrix loading and options-file
//! parsing.

mod error;
mod options;
mod reader;

pub use error::IoError;
pub use options::{MAX_INCLUDE_COLUMNS, Options};
pub use reader::{Dim, MatrixReader, ParsePolicy};
