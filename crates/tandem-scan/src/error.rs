//! Error types for scanning

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a scan pass
///
/// Per-entry problems (unreadable directories, special files,
/// fingerprint failures) never abort; they travel as anomalies in the
/// change set. Only failures of the root itself are errors.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The sync root itself does not exist or cannot be opened
    #[error("sync root unavailable: {path}: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata for an entry could not be read at all
    #[error("cannot stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
