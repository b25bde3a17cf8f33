//! Common error types for apc-merge

use thiserror::Error;

/// Common result type for apc-merge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types across the merge pipeline
///
/// Fatal conditions abort the run before the master file is written.
/// Recoverable conditions are absorbed where they occur and surface in the
/// end-of-run summary instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Two rows normalize to the same non-empty DOI within one source
    #[error("Duplicate DOI '{doi}' in {location}")]
    DuplicateDoi { doi: String, location: String },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text read/write error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input file is not usable for processing
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
