//! Domain error types
//!
//! Errors for domain operations: validation failures, invalid lifecycle
//! transitions, and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid content digest (expected 64 lowercase hex chars)
    #[error("Invalid content digest: {0}")]
    InvalidDigest(String),

    /// Invalid lifecycle transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Referenced tree node does not exist in the arena
    #[error("Unknown tree node: {0}")]
    UnknownNode(u64),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
