//! Error types for the rule engine

use thiserror::Error;

/// Errors that can occur while parsing or compiling exclusion rules
#[derive(Debug, Error)]
pub enum RuleError {
    /// Invalid glob pattern in a wildcard rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A rule file line that could not be parsed
    #[error("invalid rule at line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    /// Invalid size range specification
    #[error("invalid size range: {0}")]
    InvalidSizeRange(String),

    /// Rule file IO failure
    #[error("rule file error: {0}")]
    Io(#[from] std::io::Error),
}
