//! # AppError
//!
//! Centralized error handling for the portfolio server core.
//! Maps collaborator failures to actionable error types.

use thiserror::Error;

/// The primary error type for all folio-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Persistence failure (connection refused, query error)
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Upstream API failure (stream, search)
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Anything else that should surface as a server error
    #[error("internal service error: {0}")]
    Internal(String),
}

/// A specialized Result type for folio-core logic.
pub type Result<T> = std::result::Result<T, AppError>;
