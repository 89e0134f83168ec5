//! Error types for airlist-rc
//!
//! Module-specific error types using thiserror for clear error propagation.

use crate::catalog::CatalogError;
use crate::feed::FeedError;
use thiserror::Error;

/// Main error type for the reconciler service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Classified catalog API errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Metadata feed errors
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Snapshot persistence errors
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using airlist-rc Error
pub type Result<T> = std::result::Result<T, Error>;
