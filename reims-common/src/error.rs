//! Common error types for REIMS

use thiserror::Error;

/// Common result type for REIMS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across REIMS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Object storage failure (put/get/list)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Text or table extraction failed for a file
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Rent roll rejected by validation; carries every blocking message
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
