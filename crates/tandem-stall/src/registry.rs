//! Issue registry
//!
//! Holds the live set of stalled issues, deduplicated by identity key
//! (root, category label, sorted path set): a re-scan that observes the
//! same condition re-finds the existing issue instead of raising a
//! duplicate. Issues whose condition is no longer observed are
//! invalidated. All mutations are written through to the state
//! repository.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use tandem_core::domain::issue::{IssueState, StalledIssue};
use tandem_core::domain::newtypes::{IssueId, RootId};
use tandem_core::ports::state_repository::{IStateRepository, IssueFilter};

/// Live issue set with write-through persistence
pub struct IssueRegistry {
    repository: Arc<dyn IStateRepository>,
    issues: DashMap<IssueId, StalledIssue>,
    by_key: DashMap<String, IssueId>,
}

impl IssueRegistry {
    pub fn new(repository: Arc<dyn IStateRepository>) -> Self {
        Self {
            repository,
            issues: DashMap::new(),
            by_key: DashMap::new(),
        }
    }

    /// Hydrate the registry from persisted state
    ///
    /// Corruption errors from the repository propagate unchanged so the
    /// caller can escalate (a corrupted state database disables the
    /// root rather than risking wrong resolutions).
    pub async fn load(&self) -> anyhow::Result<usize> {
        let stored = self.repository.load_issues(&IssueFilter::new()).await?;
        let count = stored.len();
        for issue in stored {
            self.by_key.insert(issue.identity_key(), issue.id());
            self.issues.insert(issue.id(), issue);
        }
        info!(count, "Issue registry hydrated");
        Ok(count)
    }

    /// Register freshly classified issues, deduplicating by identity
    ///
    /// Returns the ids of issues that are genuinely new. A classified
    /// issue whose identity key matches a live issue is dropped; the
    /// existing issue (with its state and history) stays authoritative.
    pub async fn absorb(&self, fresh: Vec<StalledIssue>) -> anyhow::Result<Vec<IssueId>> {
        let mut new_ids = Vec::new();
        for issue in fresh {
            let key = issue.identity_key();
            if let Some(existing) = self.by_key.get(&key) {
                if self
                    .issues
                    .get(existing.value())
                    .is_some_and(|i| !i.state().is_terminal())
                {
                    debug!(key, "Re-observed existing issue, not duplicating");
                    continue;
                }
            }
            debug!(issue = %issue.id(), category = issue.category().label(), "New issue registered");
            self.repository.save_issue(&issue).await?;
            self.by_key.insert(key, issue.id());
            new_ids.push(issue.id());
            self.issues.insert(issue.id(), issue);
        }
        Ok(new_ids)
    }

    /// Invalidate issues of a root whose condition was not re-observed
    ///
    /// `observed_keys` is the identity-key set of the latest
    /// classification. Issues mid-apply are left alone; the in-flight
    /// application decides their fate.
    pub async fn invalidate_missing(
        &self,
        root: RootId,
        observed_keys: &HashSet<String>,
    ) -> anyhow::Result<u32> {
        let stale: Vec<IssueId> = self
            .issues
            .iter()
            .filter(|entry| {
                let issue = entry.value();
                issue.root() == root
                    && !issue.state().is_terminal()
                    && issue.state() != IssueState::Applying
                    && !observed_keys.contains(&issue.identity_key())
            })
            .map(|entry| *entry.key())
            .collect();

        let mut count = 0;
        for id in stale {
            if let Some(mut entry) = self.issues.get_mut(&id) {
                match entry.transition_to(IssueState::Invalidated) {
                    Ok(()) => {
                        self.repository.save_issue(entry.value()).await?;
                        count += 1;
                    }
                    Err(err) => {
                        warn!(issue = %id, error = %err, "Could not invalidate issue");
                    }
                }
            }
        }
        if count > 0 {
            info!(%root, count, "Invalidated issues no longer observed");
        }
        Ok(count)
    }

    /// Paths of issues currently mid-apply for a root
    ///
    /// Change events touching these paths are suppressed during
    /// classification.
    #[must_use]
    pub fn applying_paths(&self, root: RootId) -> HashSet<String> {
        self.issues
            .iter()
            .filter(|e| e.value().root() == root && e.value().state() == IssueState::Applying)
            .flat_map(|e| e.value().category().paths())
            .collect()
    }

    /// Snapshot of one issue
    #[must_use]
    pub fn get(&self, id: IssueId) -> Option<StalledIssue> {
        self.issues.get(&id).map(|e| e.value().clone())
    }

    /// Replace an issue after mutation and persist it
    pub async fn update(&self, issue: StalledIssue) -> anyhow::Result<()> {
        self.repository.save_issue(&issue).await?;
        self.issues.insert(issue.id(), issue);
        Ok(())
    }

    /// All issues matching a filter, newest first
    #[must_use]
    pub fn list(&self, filter: &IssueFilter) -> Vec<StalledIssue> {
        let mut out: Vec<StalledIssue> = self
            .issues
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.detected_at().cmp(&a.detected_at()));
        out
    }
}
