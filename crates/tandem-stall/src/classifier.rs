//! Stall classification
//!
//! Compares the local and remote change sets of a root against each
//! other and sorts every discrepancy into either a mergeable operation
//! or a stalled issue. Classification never fails on a discrepancy:
//! every observed path comes out the other end as exactly one of the
//! two, so the caller can act on the output without a second pass.
//!
//! Classification for a single root is serialized behind a per-root
//! async mutex; distinct roots classify concurrently.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use tandem_core::domain::change::{
    AnomalyKind, ChangeKind, ChangeRecord, ChangeSet, ScanAnomaly, Side,
};
use tandem_core::domain::issue::{LinkFlavor, StallCategory, StalledIssue};
use tandem_core::domain::newtypes::RootId;
use tandem_core::domain::sync_root::{SyncMode, SyncRoot};
use tandem_core::domain::tree::EntryKind;

// ============================================================================
// Classification output
// ============================================================================

/// A one-sided change that can be propagated without a decision
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOp {
    /// `/`-separated path relative to the root
    pub path: String,
    /// The side the change originated on; it propagates to the other
    pub source: Side,
    pub kind: EntryKind,
    pub change: ChangeKind,
}

/// Complete classification of one root's pending discrepancies
#[derive(Debug, Default)]
pub struct Classification {
    pub merges: Vec<MergeOp>,
    pub issues: Vec<StalledIssue>,
}

// ============================================================================
// Classifier
// ============================================================================

/// Sorts change sets into merge operations and stalled issues
pub struct Classifier {
    /// Per-root classification guards; one logical writer per root
    guards: DashMap<RootId, Arc<Mutex<()>>>,
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            guards: DashMap::new(),
        }
    }

    /// Classify one root's pending local and remote changes
    ///
    /// `applying_paths` holds the path sets of issues currently in
    /// `Applying`; overlapping records are dropped because the
    /// in-flight application is authoritative for those paths.
    pub async fn classify(
        &self,
        root: &SyncRoot,
        local: &ChangeSet,
        remote: &ChangeSet,
        applying_paths: &HashSet<String>,
    ) -> Classification {
        let guard = self
            .guards
            .entry(root.id())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _lock = guard.lock().await;

        let mut out = Classification::default();

        for anomaly in local.anomalies.iter().chain(remote.anomalies.iter()) {
            if applying_paths.contains(&anomaly.path) {
                continue;
            }
            out.issues
                .push(StalledIssue::new(root.id(), categorize_anomaly(anomaly)));
        }

        // Pair the two sides' records per path
        let mut by_path: BTreeMap<String, SidePair> = BTreeMap::new();
        for record in &local.records {
            if applying_paths.contains(&record.path) {
                debug!(path = %record.path, "Ignoring change under an in-flight application");
                continue;
            }
            by_path.entry(record.path.clone()).or_default().local = Some(record.clone());
        }
        for record in &remote.records {
            if applying_paths.contains(&record.path) {
                debug!(path = %record.path, "Ignoring change under an in-flight application");
                continue;
            }
            by_path.entry(record.path.clone()).or_default().remote = Some(record.clone());
        }

        // Case-insensitive collision grouping comes first; a clashing
        // path must not also produce a merge op.
        let mut consumed = extract_name_conflicts(root.id(), &by_path, &mut out.issues);
        extract_move_conflicts(root, &by_path, &mut consumed, &mut out.issues);

        for (path, pair) in by_path {
            if consumed.contains(&path) {
                continue;
            }
            classify_pair(root, &path, pair, &mut out);
        }

        info!(
            root = %root.id(),
            merges = out.merges.len(),
            issues = out.issues.len(),
            "Classification complete"
        );
        out
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct SidePair {
    local: Option<ChangeRecord>,
    remote: Option<ChangeRecord>,
}

fn categorize_anomaly(anomaly: &ScanAnomaly) -> StallCategory {
    let path = anomaly.path.clone();
    match &anomaly.anomaly {
        AnomalyKind::Symlink => StallCategory::SpecialOrHardLink {
            path,
            flavor: LinkFlavor::Symlink,
        },
        AnomalyKind::HardLink => StallCategory::SpecialOrHardLink {
            path,
            flavor: LinkFlavor::HardLink,
        },
        AnomalyKind::Fifo => StallCategory::SpecialOrHardLink {
            path,
            flavor: LinkFlavor::Fifo,
        },
        AnomalyKind::Socket => StallCategory::SpecialOrHardLink {
            path,
            flavor: LinkFlavor::Socket,
        },
        AnomalyKind::Device => StallCategory::SpecialOrHardLink {
            path,
            flavor: LinkFlavor::Device,
        },
        AnomalyKind::Unreadable(detail) => StallCategory::FilesystemErrorDuringOperation {
            path,
            detail: detail.clone(),
        },
        AnomalyKind::ExceedsTreeDepth(depth) => StallCategory::ExceedsTreeDepth {
            path,
            depth: *depth,
        },
        AnomalyKind::RulePending => StallCategory::UnknownTemporary { path },
    }
}

/// Group names case-insensitively per parent directory; any group with
/// more than one distinct spelling becomes exactly one `NameConflict`
/// carrying every colliding path.
fn extract_name_conflicts(
    root: RootId,
    by_path: &BTreeMap<String, SidePair>,
    issues: &mut Vec<StalledIssue>,
) -> HashSet<String> {
    // (parent dir, lowercased name) -> paths present per side
    let mut groups: BTreeMap<(String, String), (Vec<String>, Vec<String>)> = BTreeMap::new();

    for (path, pair) in by_path {
        let (parent, name) = split_path(path);
        let key = (parent.to_string(), name.to_lowercase());
        let entry = groups.entry(key).or_default();
        if pair
            .local
            .as_ref()
            .is_some_and(|r| r.change != ChangeKind::Removed)
        {
            entry.0.push(path.clone());
        }
        if pair
            .remote
            .as_ref()
            .is_some_and(|r| r.change != ChangeKind::Removed)
        {
            entry.1.push(path.clone());
        }
    }

    let mut clashing = HashSet::new();
    for ((_, clash_name), (local_paths, remote_paths)) in groups {
        let mut distinct: Vec<&String> = local_paths.iter().chain(remote_paths.iter()).collect();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < 2 {
            continue;
        }
        for path in &distinct {
            clashing.insert((*path).clone());
        }
        debug!(clash = %clash_name, paths = distinct.len(), "Case-insensitive name collision");
        issues.push(StalledIssue::new(
            root,
            StallCategory::NameConflict {
                clash_name,
                local_paths,
                remote_paths,
            },
        ));
    }
    clashing
}

/// Detect the same origin moved to different destinations on the two
/// sides; per-path pairing cannot see this because each destination is
/// its own path.
fn extract_move_conflicts(
    root: &SyncRoot,
    by_path: &BTreeMap<String, SidePair>,
    consumed: &mut HashSet<String>,
    issues: &mut Vec<StalledIssue>,
) {
    // origin -> (local destination, remote destination)
    let mut origins: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for (path, pair) in by_path {
        if let Some(ChangeKind::Moved { from }) = pair.local.as_ref().map(|r| r.change.clone()) {
            origins.entry(from).or_default().0 = Some(path.clone());
        }
        if let Some(ChangeKind::Moved { from }) = pair.remote.as_ref().map(|r| r.change.clone()) {
            origins.entry(from).or_default().1 = Some(path.clone());
        }
    }

    for (original, targets) in origins {
        let (Some(local_target), Some(remote_target)) = targets else {
            continue;
        };
        if local_target == remote_target {
            continue;
        }
        debug!(
            %original,
            %local_target,
            %remote_target,
            "Conflicting concurrent moves"
        );
        consumed.insert(local_target.clone());
        consumed.insert(remote_target.clone());
        issues.push(StalledIssue::new(
            root.id(),
            StallCategory::MoveOrRenameCannotOccur {
                original,
                local_target,
                remote_target,
            },
        ));
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn classify_pair(root: &SyncRoot, path: &str, pair: SidePair, out: &mut Classification) {
    match (pair.local, pair.remote) {
        (Some(local), None) => {
            out.merges.push(MergeOp {
                path: path.to_string(),
                source: Side::Local,
                kind: local.kind,
                change: local.change,
            });
        }
        (None, Some(remote)) => {
            // On a Backup root the remote is a read-only mirror; an
            // external remote change is never merged back into local.
            if root.mode() == SyncMode::Backup {
                out.issues.push(StalledIssue::new(
                    root.id(),
                    StallCategory::BackupExternallyModified {
                        path: path.to_string(),
                        remote: remote.identity,
                    },
                ));
                return;
            }
            out.merges.push(MergeOp {
                path: path.to_string(),
                source: Side::Remote,
                kind: remote.kind,
                change: remote.change,
            });
        }
        (Some(local), Some(remote)) => {
            classify_two_sided(root, path, local, remote, out);
        }
        (None, None) => {}
    }
}

fn classify_two_sided(
    root: &SyncRoot,
    path: &str,
    local: ChangeRecord,
    remote: ChangeRecord,
    out: &mut Classification,
) {
    if root.mode() == SyncMode::Backup {
        // Local stays canonical; the remote change alone is the issue
        out.issues.push(StalledIssue::new(
            root.id(),
            StallCategory::BackupExternallyModified {
                path: path.to_string(),
                remote: remote.identity,
            },
        ));
        return;
    }

    // Both removed: the sides agree, nothing to do
    if local.change == ChangeKind::Removed && remote.change == ChangeKind::Removed {
        return;
    }

    if local.kind != remote.kind {
        out.issues.push(StalledIssue::new(
            root.id(),
            StallCategory::FolderMatchedAgainstFile {
                path: path.to_string(),
                local_kind: local.kind,
                remote_kind: remote.kind,
            },
        ));
        return;
    }

    // Concurrent content changes. This also covers different origins
    // moved onto one destination: two contents claiming one path.
    // Converged content is not a stall.
    if local.identity.same_content(&remote.identity) {
        return;
    }
    if !local.identity.is_verifiable() {
        out.issues.push(StalledIssue::new(
            root.id(),
            StallCategory::FingerprintMissing {
                path: path.to_string(),
                side: Side::Local,
            },
        ));
        return;
    }
    if !remote.identity.is_verifiable() {
        out.issues.push(StalledIssue::new(
            root.id(),
            StallCategory::FingerprintMissing {
                path: path.to_string(),
                side: Side::Remote,
            },
        ));
        return;
    }
    out.issues.push(StalledIssue::new(
        root.id(),
        StallCategory::LocalAndRemoteChanged {
            path: path.to_string(),
            local: local.identity,
            remote: remote.identity,
        },
    ));
}

// ============================================================================
// Unit tests
// ============================================================================
