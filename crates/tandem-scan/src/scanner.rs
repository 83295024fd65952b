//! Local tree walker
//!
//! Walks a sync root breadth-first with an explicit work queue,
//! applying exclusion rules, fingerprinting included files, and
//! building a [`TreeArena`] snapshot of what is on disk.
//!
//! Nothing is skipped silently: entries that cannot be synced
//! (symlinks, hard links, special files, unreadable directories,
//! over-deep paths) are reported as anomalies so the classifier can
//! raise the corresponding stall category.
//!
//! Rule-`Unknown` paths are deferred, not guessed at: they are retried
//! at the end of the pass and surface as `RulePending` anomalies if the
//! verdict is still not available. A deferred path is never
//! depth-checked or otherwise classified before its verdict is known.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use tandem_core::domain::change::{AnomalyKind, ScanAnomaly};
use tandem_core::domain::newtypes::{LocalPath, RootId};
use tandem_core::domain::tree::{EntryKind, Identity, NodeId, TreeArena};
use tandem_core::MAX_TREE_DEPTH;
use tandem_rules::{RuleEngine, Verdict};

use crate::error::ScanError;
use crate::fingerprint::Fingerprinter;

/// Result of one scan pass: the on-disk tree plus anomalies
#[derive(Debug)]
pub struct ScanSnapshot {
    pub arena: TreeArena,
    pub anomalies: Vec<ScanAnomaly>,
}

/// A queued directory entry awaiting processing
struct WorkItem {
    abs: PathBuf,
    rel: String,
    parent: NodeId,
    depth: usize,
}

/// Walks one sync root's local tree
pub struct Scanner {
    root: RootId,
    local_root: LocalPath,
    rules: Arc<RuleEngine>,
}

impl Scanner {
    pub fn new(root: RootId, local_root: LocalPath, rules: Arc<RuleEngine>) -> Self {
        Self {
            root,
            local_root,
            rules,
        }
    }

    /// Scan the root, producing a snapshot
    ///
    /// # Errors
    ///
    /// Fails only if the root directory itself is unavailable;
    /// per-entry problems become anomalies.
    pub async fn scan(&self) -> Result<ScanSnapshot, ScanError> {
        let mut arena = TreeArena::new();
        let mut anomalies = Vec::new();
        let mut deferred: Vec<WorkItem> = Vec::new();

        let mut queue = self
            .enqueue_children(self.local_root.as_path(), "", NodeId::ROOT, 0)
            .await
            .map_err(|source| ScanError::RootUnavailable {
                path: self.local_root.as_path().to_path_buf(),
                source,
            })?;

        self.drain_queue(&mut queue, &mut arena, &mut anomalies, &mut deferred)
            .await;

        // Retry deferred paths until the rule engine settles or no
        // progress is made; Unknown is resolved strictly before any
        // terminal classification.
        loop {
            if deferred.is_empty() {
                break;
            }
            let retry: Vec<WorkItem> = std::mem::take(&mut deferred);
            let before = retry.len();
            let mut queue: VecDeque<WorkItem> = VecDeque::new();
            for item in retry {
                match self.verdict_for(&item).await {
                    Verdict::Unknown => deferred.push(item),
                    _ => queue.push_back(item),
                }
            }
            if deferred.len() == before {
                break;
            }
            self.drain_queue(&mut queue, &mut arena, &mut anomalies, &mut deferred)
                .await;
        }

        for item in deferred {
            debug!(path = %item.rel, "Rule verdict still pending at end of pass");
            anomalies.push(ScanAnomaly {
                path: item.rel,
                anomaly: AnomalyKind::RulePending,
            });
        }

        info!(
            root = %self.root,
            entries = arena.len() - 1,
            anomalies = anomalies.len(),
            "Scan pass complete"
        );
        Ok(ScanSnapshot { arena, anomalies })
    }

    async fn drain_queue(
        &self,
        queue: &mut VecDeque<WorkItem>,
        arena: &mut TreeArena,
        anomalies: &mut Vec<ScanAnomaly>,
        deferred: &mut Vec<WorkItem>,
    ) {
        while let Some(item) = queue.pop_front() {
            let meta = match tokio::fs::symlink_metadata(&item.abs).await {
                Ok(m) => m,
                Err(e) => {
                    anomalies.push(ScanAnomaly {
                        path: item.rel,
                        anomaly: AnomalyKind::Unreadable(e.to_string()),
                    });
                    continue;
                }
            };

            if let Some(anomaly) = special_kind(&meta) {
                anomalies.push(ScanAnomaly {
                    path: item.rel,
                    anomaly,
                });
                continue;
            }

            // Unknown is checked before anything terminal, including depth
            match self.verdict_for(&item).await {
                Verdict::Unknown => {
                    deferred.push(item);
                    continue;
                }
                Verdict::Excluded => continue,
                Verdict::Included => {}
            }

            if item.depth > MAX_TREE_DEPTH {
                anomalies.push(ScanAnomaly {
                    path: item.rel,
                    anomaly: AnomalyKind::ExceedsTreeDepth(item.depth),
                });
                continue;
            }

            if meta.is_dir() {
                let node = match arena.insert(
                    item.parent,
                    name_of(&item.rel),
                    EntryKind::Folder,
                    Identity::folder(
                        meta.modified()
                            .map(chrono::DateTime::from)
                            .unwrap_or_else(|_| chrono::Utc::now()),
                    ),
                ) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(path = %item.rel, error = %e, "Cannot place folder in snapshot");
                        continue;
                    }
                };
                match self
                    .enqueue_children(&item.abs, &item.rel, node, item.depth)
                    .await
                {
                    Ok(children) => queue.extend(children),
                    Err(e) => anomalies.push(ScanAnomaly {
                        path: item.rel.clone(),
                        anomaly: AnomalyKind::Unreadable(e.to_string()),
                    }),
                }
            } else {
                let identity = match Fingerprinter::identity_of(&item.abs).await {
                    Ok(identity) => identity,
                    Err(e) => {
                        anomalies.push(ScanAnomaly {
                            path: item.rel,
                            anomaly: AnomalyKind::Unreadable(e.to_string()),
                        });
                        continue;
                    }
                };
                if let Err(e) = arena.insert(item.parent, name_of(&item.rel), EntryKind::File, identity)
                {
                    warn!(path = %item.rel, error = %e, "Cannot place file in snapshot");
                }
            }
        }
    }

    async fn verdict_for(&self, item: &WorkItem) -> Verdict {
        let (kind, size) = match tokio::fs::symlink_metadata(&item.abs).await {
            Ok(m) if m.is_dir() => (EntryKind::Folder, None),
            Ok(m) => (EntryKind::File, Some(m.len())),
            Err(_) => (EntryKind::File, None),
        };
        self.rules.evaluate(self.root, &item.rel, kind, size)
    }

    async fn enqueue_children(
        &self,
        dir: &Path,
        rel: &str,
        parent: NodeId,
        depth: usize,
    ) -> std::io::Result<VecDeque<WorkItem>> {
        let mut out = VecDeque::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            out.push_back(WorkItem {
                abs: entry.path(),
                rel: child_rel,
                parent,
                depth: depth + 1,
            });
        }
        // Deterministic order regardless of readdir ordering
        let mut items: Vec<WorkItem> = out.into_iter().collect();
        items.sort_by(|a, b| a.rel.cmp(&b.rel));
        Ok(items.into())
    }
}

fn name_of(rel: &str) -> String {
    rel.rsplit('/').next().unwrap_or(rel).to_string()
}

#[cfg(unix)]
fn special_kind(meta: &std::fs::Metadata) -> Option<AnomalyKind> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let ft = meta.file_type();
    if ft.is_symlink() {
        return Some(AnomalyKind::Symlink);
    }
    if ft.is_fifo() {
        return Some(AnomalyKind::Fifo);
    }
    if ft.is_socket() {
        return Some(AnomalyKind::Socket);
    }
    if ft.is_block_device() || ft.is_char_device() {
        return Some(AnomalyKind::Device);
    }
    if ft.is_file() && meta.nlink() > 1 {
        return Some(AnomalyKind::HardLink);
    }
    None
}

#[cfg(not(unix))]
fn special_kind(meta: &std::fs::Metadata) -> Option<AnomalyKind> {
    if meta.file_type().is_symlink() {
        return Some(AnomalyKind::Symlink);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_rules::{ExclusionRule, Predicate, RuleTarget};

    async fn scan_dir(dir: &Path, rules: Arc<RuleEngine>, root: RootId) -> ScanSnapshot {
        let scanner = Scanner::new(
            root,
            LocalPath::new(dir.to_path_buf()).unwrap(),
            rules,
        );
        scanner.scan().await.unwrap()
    }

    #[tokio::test]
    async fn test_scan_builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("docs")).await.unwrap();
        tokio::fs::write(dir.path().join("docs/a.txt"), b"hello")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("top.txt"), b"top").await.unwrap();

        let snapshot = scan_dir(dir.path(), Arc::new(RuleEngine::new()), RootId::new()).await;

        assert!(snapshot.arena.lookup("docs").is_some());
        assert!(snapshot.arena.lookup("docs/a.txt").is_some());
        assert!(snapshot.arena.lookup("top.txt").is_some());
        assert!(snapshot.anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_subtree_not_scanned() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("cache")).await.unwrap();
        tokio::fs::write(dir.path().join("cache/x.bin"), b"x")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("keep.txt"), b"k").await.unwrap();

        let root = RootId::new();
        let rules = Arc::new(RuleEngine::new());
        rules.install(
            root,
            vec![ExclusionRule::exclude(
                RuleTarget::Folder,
                Predicate::Equals {
                    value: "cache".to_string(),
                },
            )],
        );

        let snapshot = scan_dir(dir.path(), rules, root).await;

        assert!(snapshot.arena.lookup("cache").is_none());
        assert!(snapshot.arena.lookup("cache/x.bin").is_none());
        assert!(snapshot.arena.lookup("keep.txt").is_some());
    }

    #[tokio::test]
    async fn test_pending_rules_defer_not_exclude() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"a").await.unwrap();

        let root = RootId::new();
        let rules = Arc::new(RuleEngine::new());
        rules.install(root, vec![]);
        rules.begin_update(root);

        let snapshot = scan_dir(dir.path(), rules, root).await;

        // Not in the tree, but loudly deferred rather than dropped
        assert!(snapshot.arena.lookup("a.txt").is_none());
        assert_eq!(snapshot.anomalies.len(), 1);
        assert_eq!(snapshot.anomalies[0].anomaly, AnomalyKind::RulePending);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_reported_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("target.txt"), b"t")
            .await
            .unwrap();
        tokio::fs::symlink(dir.path().join("target.txt"), dir.path().join("link.txt"))
            .await
            .unwrap();

        let snapshot = scan_dir(dir.path(), Arc::new(RuleEngine::new()), RootId::new()).await;

        assert!(snapshot.arena.lookup("link.txt").is_none());
        assert!(snapshot
            .anomalies
            .iter()
            .any(|a| a.path == "link.txt" && a.anomaly == AnomalyKind::Symlink));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hard_link_reported() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("orig.txt");
        tokio::fs::write(&original, b"o").await.unwrap();
        tokio::fs::hard_link(&original, dir.path().join("hard.txt"))
            .await
            .unwrap();

        let snapshot = scan_dir(dir.path(), Arc::new(RuleEngine::new()), RootId::new()).await;

        // Both names now have nlink == 2; both are reported
        let hard_links = snapshot
            .anomalies
            .iter()
            .filter(|a| a.anomaly == AnomalyKind::HardLink)
            .count();
        assert_eq!(hard_links, 2);
    }

    #[tokio::test]
    async fn test_depth_limit_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        // Build a chain one level past the maximum
        let mut path = dir.path().to_path_buf();
        for i in 0..=MAX_TREE_DEPTH {
            path = path.join(format!("d{i}"));
        }
        tokio::fs::create_dir_all(&path).await.unwrap();

        let snapshot = scan_dir(dir.path(), Arc::new(RuleEngine::new()), RootId::new()).await;

        let deep: Vec<_> = snapshot
            .anomalies
            .iter()
            .filter(|a| matches!(a.anomaly, AnomalyKind::ExceedsTreeDepth(_)))
            .collect();
        assert_eq!(deep.len(), 1);
        assert!(matches!(
            deep[0].anomaly,
            AnomalyKind::ExceedsTreeDepth(d) if d == MAX_TREE_DEPTH + 1
        ));
        // The node at the limit is still in the tree; the one past it is not
        assert_eq!(snapshot.arena.len() - 1, MAX_TREE_DEPTH);
    }

    #[tokio::test]
    async fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nothere");
        let scanner = Scanner::new(
            RootId::new(),
            LocalPath::new(gone).unwrap(),
            Arc::new(RuleEngine::new()),
        );
        assert!(matches!(
            scanner.scan().await,
            Err(ScanError::RootUnavailable { .. })
        ));
    }
}
