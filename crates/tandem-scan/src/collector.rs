//! Change collection: baseline vs snapshot diffing
//!
//! Turns two tree arenas (the stored last-common-state baseline and a
//! fresh scan snapshot) into an ordered [`ChangeSet`]. Moves are
//! detected by matching content identities across a Removed/Added
//! pair, never by path diffing, so a rename of a large file does not
//! masquerade as a delete plus a new upload.

use tracing::debug;

use tandem_core::domain::change::{ChangeKind, ChangeRecord, ChangeSet, ScanAnomaly, Side};
use tandem_core::domain::newtypes::RootId;
use tandem_core::domain::tree::{EntryKind, TreeArena};

/// Diff a snapshot against the baseline for one side of one root
#[must_use]
pub fn collect_changes(
    root: RootId,
    side: Side,
    baseline: &TreeArena,
    current: &TreeArena,
    anomalies: Vec<ScanAnomaly>,
) -> ChangeSet {
    let mut records: Vec<ChangeRecord> = Vec::new();

    // Added / Modified: walk the current snapshot
    for (id, node) in current.iter() {
        let Some(path) = current.path_of(id) else {
            continue;
        };
        match baseline.lookup(&path) {
            None => {
                records.push(ChangeRecord {
                    path,
                    kind: node.kind,
                    identity: node.identity.clone(),
                    change: ChangeKind::Added,
                });
            }
            Some(base_id) => {
                let Some(base) = baseline.get(base_id) else {
                    continue;
                };
                if base.kind != node.kind {
                    // Kind change on one side is a remove plus an add;
                    // the cross-side kind mismatch is the classifier's
                    // concern.
                    records.push(ChangeRecord {
                        path: path.clone(),
                        kind: base.kind,
                        identity: base.identity.clone(),
                        change: ChangeKind::Removed,
                    });
                    records.push(ChangeRecord {
                        path,
                        kind: node.kind,
                        identity: node.identity.clone(),
                        change: ChangeKind::Added,
                    });
                } else if node.kind == EntryKind::File && file_changed(base, node) {
                    records.push(ChangeRecord {
                        path,
                        kind: node.kind,
                        identity: node.identity.clone(),
                        change: ChangeKind::Modified,
                    });
                }
            }
        }
    }

    // Removed: anything in the baseline with no current counterpart
    for (id, node) in baseline.iter() {
        let Some(path) = baseline.path_of(id) else {
            continue;
        };
        if current.lookup(&path).is_none() {
            records.push(ChangeRecord {
                path,
                kind: node.kind,
                identity: node.identity.clone(),
                change: ChangeKind::Removed,
            });
        }
    }

    pair_moves(&mut records);
    records.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(%root, %side, changes = records.len(), "Change set collected");
    ChangeSet {
        root,
        side,
        records,
        anomalies,
    }
}

fn file_changed(
    base: &tandem_core::domain::tree::TreeNode,
    node: &tandem_core::domain::tree::TreeNode,
) -> bool {
    // An unverifiable current identity counts as changed: the
    // classifier must see it to raise FingerprintMissing.
    !node.identity.is_verifiable() || !base.identity.same_content(&node.identity)
}

/// Collapse Removed/Added pairs with matching content into Moved
fn pair_moves(records: &mut Vec<ChangeRecord>) {
    let mut moved: Vec<(usize, usize)> = Vec::new(); // (added idx, removed idx)
    let mut used_removed: Vec<usize> = Vec::new();

    for (ai, added) in records.iter().enumerate() {
        if added.change != ChangeKind::Added || added.kind != EntryKind::File {
            continue;
        }
        if !added.identity.is_verifiable() {
            continue;
        }
        let candidate = records.iter().enumerate().find(|(ri, r)| {
            r.change == ChangeKind::Removed
                && r.kind == EntryKind::File
                && !used_removed.contains(ri)
                && r.identity.same_content(&added.identity)
        });
        if let Some((ri, _)) = candidate {
            moved.push((ai, ri));
            used_removed.push(ri);
        }
    }

    for (ai, ri) in &moved {
        let from = records[*ri].path.clone();
        records[*ai].change = ChangeKind::Moved { from };
    }
    let drop_set: Vec<usize> = moved.iter().map(|(_, ri)| *ri).collect();
    let mut idx = 0;
    records.retain(|_| {
        let keep = !drop_set.contains(&idx);
        idx += 1;
        keep
    });
}
