//! Local tree scanning for tandem
//!
//! Walks a sync root on disk, fingerprints regular files, and diffs
//! the resulting snapshot against the stored baseline into a change
//! set. Exclusion rules are consulted during the walk; anything the
//! engine cannot yet answer for is deferred and, if still unanswered
//! when the walk finishes, reported as a pending-rule anomaly rather
//! than guessed at.

pub mod collector;
pub mod error;
pub mod fingerprint;
pub mod fs;
pub mod scanner;

pub use collector::collect_changes;
pub use error::ScanError;
pub use fingerprint::Fingerprinter;
pub use fs::LocalFs;
pub use scanner::{ScanSnapshot, Scanner};
