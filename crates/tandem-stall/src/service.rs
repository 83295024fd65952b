//! Issue API facade
//!
//! [`StallService`] is the surface a UI or CLI talks to: list and
//! inspect issues, apply or ignore resolutions, switch solve modes.
//! It owns the routing of fresh issues (straight to auto-resolution in
//! Smart mode when a safe default exists, to the decision queue
//! otherwise) and hides transient issues until they have outlived the
//! patience window.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tandem_core::domain::issue::{ActionKind, IssueState, Outcome, Severity, StalledIssue};
use tandem_core::domain::newtypes::{IssueId, RootId};
use tandem_core::domain::sync_root::{SolveMode, SyncRoot};
use tandem_core::ports::state_repository::{CorruptedStateError, IssueFilter};

use crate::classifier::Classification;
use crate::error::StallError;
use crate::registry::IssueRegistry;
use crate::resolver::{list_actions, smart_default, StallResolver};

/// One row of the issue list
#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    pub id: IssueId,
    pub root: RootId,
    pub category: &'static str,
    pub paths: Vec<String>,
    pub state: IssueState,
    pub severity: Severity,
    pub detected_at: chrono::DateTime<Utc>,
}

impl From<&StalledIssue> for IssueView {
    fn from(issue: &StalledIssue) -> Self {
        Self {
            id: issue.id(),
            root: issue.root(),
            category: issue.category().label(),
            paths: issue.category().paths(),
            state: issue.state(),
            severity: issue.category().severity(),
            detected_at: issue.detected_at(),
        }
    }
}

/// Full detail of one issue, including its applicable actions
#[derive(Debug, Clone, Serialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub view: IssueView,
    pub actions: Vec<ActionKind>,
    pub suggested: Option<ActionKind>,
    pub chosen_action: Option<ActionKind>,
    pub outcome: Option<Outcome>,
    pub last_error: Option<String>,
}

/// The stall engine's user-facing API
pub struct StallService {
    registry: Arc<IssueRegistry>,
    resolver: Arc<StallResolver>,
    roots: DashMap<RootId, SyncRoot>,
    /// Transient issues younger than this stay hidden
    patience: Duration,
}

impl StallService {
    pub fn new(
        registry: Arc<IssueRegistry>,
        resolver: Arc<StallResolver>,
        patience_secs: u32,
    ) -> Self {
        Self {
            registry,
            resolver,
            roots: DashMap::new(),
            patience: Duration::seconds(i64::from(patience_secs)),
        }
    }

    /// Register (or replace) a sync root
    pub fn register_root(&self, root: SyncRoot) {
        self.roots.insert(root.id(), root);
    }

    /// Snapshot of a registered root
    #[must_use]
    pub fn root(&self, id: RootId) -> Option<SyncRoot> {
        self.roots.get(&id).map(|r| r.value().clone())
    }

    /// Paths currently under an in-flight application for a root
    ///
    /// Feed this to the classifier so overlapping events are ignored.
    #[must_use]
    pub fn applying_paths(&self, root: RootId) -> HashSet<String> {
        self.registry.applying_paths(root)
    }

    /// Absorb a classification: register new issues, route them, and
    /// invalidate issues the scan no longer observes
    ///
    /// Returns the ids of newly raised issues. In Smart mode, issues
    /// whose category has a safe default move to `AutoResolving`; call
    /// [`auto_resolve`](Self::auto_resolve) to run them.
    pub async fn ingest(
        &self,
        root_id: RootId,
        classification: Classification,
    ) -> anyhow::Result<Vec<IssueId>> {
        let observed: HashSet<String> = classification
            .issues
            .iter()
            .map(StalledIssue::identity_key)
            .collect();
        let new_ids = match self.registry.absorb(classification.issues).await {
            Ok(ids) => ids,
            Err(err) => {
                self.escalate_if_corrupted(root_id, &err);
                return Err(err);
            }
        };
        if let Err(err) = self.registry.invalidate_missing(root_id, &observed).await {
            self.escalate_if_corrupted(root_id, &err);
            return Err(err);
        }

        let solve_mode = self
            .roots
            .get(&root_id)
            .map(|r| r.solve_mode())
            .unwrap_or(SolveMode::Advanced);

        for id in &new_ids {
            let Some(mut issue) = self.registry.get(*id) else {
                continue;
            };
            if issue.category().is_transient() {
                // Transient issues stay Detected; they usually clear on
                // their own before the patience window elapses
                continue;
            }
            let next = if solve_mode == SolveMode::Smart
                && smart_default(issue.category()).is_some()
            {
                IssueState::AutoResolving
            } else {
                IssueState::AwaitingDecision
            };
            issue.transition_to(next)?;
            self.registry.update(issue).await?;
        }
        Ok(new_ids)
    }

    /// A corrupted state store is fatal for the owning root: disable it
    /// rather than retry a doomed operation
    fn escalate_if_corrupted(&self, root_id: RootId, err: &anyhow::Error) {
        if err.downcast_ref::<CorruptedStateError>().is_none() {
            return;
        }
        if let Some(mut root) = self.roots.get_mut(&root_id) {
            root.disable("local state store corrupted");
        }
        error!(root = %root_id, "State store corruption detected, root disabled");
    }

    /// Apply the safe default to every issue waiting in `AutoResolving`
    pub async fn auto_resolve(&self, root_id: RootId, token: &CancellationToken) -> u32 {
        let waiting = self.registry.list(
            &IssueFilter::new()
                .with_root(root_id)
                .with_state(IssueState::AutoResolving),
        );
        let mut resolved = 0;
        for issue in waiting {
            let Some(action) = smart_default(issue.category()) else {
                continue;
            };
            match self.apply(issue.id(), action, false, token).await {
                Ok(_) => resolved += 1,
                Err(err) => {
                    warn!(issue = %issue.id(), error = %err, "Auto-resolution failed");
                }
            }
        }
        if resolved > 0 {
            info!(root = %root_id, resolved, "Auto-resolved issues");
        }
        resolved
    }

    /// Issues matching a filter, hiding young transients
    #[must_use]
    pub fn list_issues(&self, filter: &IssueFilter) -> Vec<IssueView> {
        let now = Utc::now();
        self.registry
            .list(filter)
            .iter()
            .filter(|issue| {
                !issue.category().is_transient() || now - issue.detected_at() >= self.patience
            })
            .map(IssueView::from)
            .collect()
    }

    /// Full detail of one issue
    pub fn describe(&self, id: IssueId) -> Result<IssueDetail, StallError> {
        let issue = self.registry.get(id).ok_or(StallError::UnknownIssue(id))?;
        let mode = self
            .roots
            .get(&issue.root())
            .map(|r| r.mode())
            .unwrap_or(tandem_core::domain::sync_root::SyncMode::Sync);
        Ok(IssueDetail {
            view: IssueView::from(&issue),
            actions: list_actions(issue.category(), mode),
            suggested: smart_default(issue.category()),
            chosen_action: issue.chosen_action(),
            outcome: issue.outcome().cloned(),
            last_error: issue.last_error().map(String::from),
        })
    }

    /// Apply an action to an issue (and optionally to all similar ones)
    pub async fn apply(
        &self,
        id: IssueId,
        action: ActionKind,
        apply_to_all: bool,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        let outcome = self.apply_one(id, action, token).await?;

        if apply_to_all {
            let Some(target) = self.registry.get(id) else {
                return Ok(outcome);
            };
            let similar = self.registry.list(
                &IssueFilter::new()
                    .with_root(target.root())
                    .with_category(target.category().label()),
            );
            for issue in similar {
                if issue.id() == id || issue.state().is_terminal() {
                    continue;
                }
                if let Err(err) = self.apply_one(issue.id(), action, token).await {
                    debug!(issue = %issue.id(), error = %err, "Apply-to-all-similar skipped issue");
                }
            }
        }
        Ok(outcome)
    }

    async fn apply_one(
        &self,
        id: IssueId,
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        let mut issue = self.registry.get(id).ok_or(StallError::UnknownIssue(id))?;
        let mut root = self
            .roots
            .get(&issue.root())
            .map(|r| r.value().clone())
            .ok_or_else(|| {
                StallError::ResolutionFailed(format!("root {} is not registered", issue.root()))
            })?;

        // A Detected issue must pass through the decision queue first
        if issue.state() == IssueState::Detected {
            issue.transition_to(IssueState::AwaitingDecision)?;
        }

        let result = self.resolver.apply(&mut issue, &mut root, action, token).await;

        // Persist whatever state the apply left behind, success or not
        if let Err(err) = self.registry.update(issue).await {
            warn!(issue = %id, error = %err, "Failed to persist issue after apply");
        }
        // The resolver only ever disables the root; write back exactly
        // that, through the live entry, so a concurrent solve-mode
        // change is not clobbered by this stale clone
        if !root.is_active() {
            if let Some(mut live) = self.roots.get_mut(&root.id()) {
                if live.is_active() {
                    let reason = root.disabled_reason().unwrap_or("disabled by resolution");
                    live.disable(reason);
                }
            }
        }
        result
    }

    /// Ignore an issue; its path set stays out of classification until
    /// external state changes
    pub async fn ignore(&self, id: IssueId, token: &CancellationToken) -> Result<(), StallError> {
        self.apply(id, ActionKind::Ignore, false, token).await?;
        Ok(())
    }

    /// Switch a root's solve mode; affects only future routing
    pub fn set_solve_mode(&self, root_id: RootId, mode: SolveMode) -> Result<(), StallError> {
        let mut root = self.roots.get_mut(&root_id).ok_or_else(|| {
            StallError::ResolutionFailed(format!("root {root_id} is not registered"))
        })?;
        info!(root = %root_id, %mode, "Solve mode changed");
        root.set_solve_mode(mode);
        Ok(())
    }
}
