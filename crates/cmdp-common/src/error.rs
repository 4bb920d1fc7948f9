//! Error types shared by the CMD publishing crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Main error type for shared functionality
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(u64),

    #[error("{total_size} bytes in chunks of {chunk_size} needs more than {} chunks", u32::MAX)]
    TooManyChunks { total_size: u64, chunk_size: u64 },

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
