//! Change-event contract between scanner and classifier
//!
//! The scanner (local walk) and the remote feed both emit [`ChangeSet`]s
//! in this shape, decoupled from whatever OS watcher or wire protocol
//! produced them. Records are ordered within a root; no ordering is
//! guaranteed across roots.

use serde::{Deserialize, Serialize};

use super::newtypes::RootId;
use super::tree::{EntryKind, Identity};

/// Which side of a sync root an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// What happened to a path since the last common state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    /// Detected by identity-matching a Removed/Added pair, not by path diff
    Moved {
        /// Relative path the entry previously occupied
        from: String,
    },
}

/// A single observed change, relative to the sync root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// `/`-separated path relative to the root
    pub path: String,
    /// File or folder
    pub kind: EntryKind,
    /// Identity at observation time (digest may be None if unreadable)
    pub identity: Identity,
    /// The change itself
    pub change: ChangeKind,
}

/// A filesystem condition the scanner must report rather than skip
///
/// Silently dropping any of these would break the no-data-loss
/// guarantee, so they travel alongside ordinary change records and the
/// classifier turns them into stall categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Symlink,
    HardLink,
    Fifo,
    Socket,
    Device,
    /// Entry or directory could not be read; carries the IO detail
    Unreadable(String),
    /// Nesting exceeds the supported maximum; carries the observed depth
    ExceedsTreeDepth(usize),
    /// Exclusion verdict still pending at the end of the scan pass
    RulePending,
}

/// An anomaly observation tied to a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAnomaly {
    /// `/`-separated path relative to the root
    pub path: String,
    pub anomaly: AnomalyKind,
}

/// Ordered changes plus anomalies for one side of one root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub root: RootId,
    pub side: Side,
    pub records: Vec<ChangeRecord>,
    pub anomalies: Vec<ScanAnomaly>,
}

impl ChangeSet {
    /// An empty change set for the given root and side
    #[must_use]
    pub fn empty(root: RootId, side: Side) -> Self {
        Self {
            root,
            side,
            records: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    /// True if nothing was observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.anomalies.is_empty()
    }

    /// Find the record for a given relative path
    #[must_use]
    pub fn record_for(&self, path: &str) -> Option<&ChangeRecord> {
        self.records.iter().find(|r| r.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::Identity;
    use chrono::Utc;

    #[test]
    fn test_empty_change_set() {
        let set = ChangeSet::empty(RootId::new(), Side::Local);
        assert!(set.is_empty());
        assert!(set.record_for("a.txt").is_none());
    }

    #[test]
    fn test_record_lookup() {
        let mut set = ChangeSet::empty(RootId::new(), Side::Remote);
        set.records.push(ChangeRecord {
            path: "docs/a.txt".to_string(),
            kind: EntryKind::File,
            identity: Identity {
                digest: None,
                size: 3,
                mtime: Utc::now(),
            },
            change: ChangeKind::Added,
        });

        assert!(set.record_for("docs/a.txt").is_some());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_change_kind_serde() {
        let moved = ChangeKind::Moved {
            from: "old/place.txt".to_string(),
        };
        let json = serde_json::to_string(&moved).unwrap();
        let back: ChangeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, moved);
    }
}
