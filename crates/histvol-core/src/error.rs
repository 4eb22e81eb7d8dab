//! Error types for histogram volume processing
//!
//! Provides a unified error type for all histvol crates.

use thiserror::Error;

/// Core error type for histogram volume operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Insufficient data for the requested operation
    #[error("Insufficient data: expected at least {expected} items, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    /// A named histogram family, timestep, or file was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Structural invariant violation across domains or histograms
    #[error("Inconsistent data: {0}")]
    InconsistentData(String),

    /// A file parsed but its contents are malformed
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error patterns

impl Error {
    /// Create an error for empty input
    pub fn empty_input(_operation: &str) -> Self {
        Self::InsufficientData {
            expected: 1,
            actual: 0,
        }
    }

    /// Create an error for a missing histogram family or file
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an error for a structural mismatch between domains
    pub fn inconsistent(context: impl Into<String>) -> Self {
        Self::InconsistentData(context.into())
    }

    /// Create an error for size mismatch
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::InvalidInput(format!(
            "Size mismatch in {context}: expected {expected}, got {actual}"
        ))
    }

    /// Create an error for an interval outside [0, 1]
    pub fn invalid_interval(lo: f64, hi: f64) -> Self {
        Self::InvalidParameter(format!("Interval [{lo}, {hi}] must lie within [0, 1]"))
    }
}
