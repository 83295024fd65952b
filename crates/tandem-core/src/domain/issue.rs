//! Stalled issue entity and the closed stall taxonomy
//!
//! A stalled issue is a discrepancy between the local and remote trees
//! that cannot be merged automatically. Categories form a closed sum
//! type with category-specific payloads: adding a category is a
//! deliberate, auditable change, never silent subclassing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::Side;
use super::newtypes::{DebrisId, IssueId, RootId, TaskId};
use super::tree::{EntryKind, Identity};
use super::errors::DomainError;

/// Flavor of an unsupported filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFlavor {
    Symlink,
    HardLink,
    Fifo,
    Socket,
    Device,
}

/// The closed taxonomy of stall categories
///
/// Each variant carries exactly the data its resolution contract needs.
/// The set of involved paths (the issue's identity, together with root
/// and category) is derived from the payload by [`StallCategory::paths`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum StallCategory {
    /// Multiple names on one side collapse to one name on the other
    /// (case-insensitivity, escaping). One issue per clash group,
    /// referencing all colliding paths.
    NameConflict {
        /// The name the colliding entries normalize to
        clash_name: String,
        local_paths: Vec<String>,
        remote_paths: Vec<String>,
    },
    /// Same object modified on both sides since the last common state
    LocalAndRemoteChanged {
        path: String,
        local: Identity,
        remote: Identity,
    },
    /// Concurrent moves/renames to conflicting locations
    MoveOrRenameCannotOccur {
        /// Path at the last common state
        original: String,
        local_target: String,
        remote_target: String,
    },
    /// Entry changed kind (file↔folder) across sides under one name
    FolderMatchedAgainstFile {
        path: String,
        local_kind: EntryKind,
        remote_kind: EntryKind,
    },
    /// Local folder creation failed persistently
    CannotCreateFolder { path: String, detail: String },
    /// Local deletion failed persistently
    CannotPerformDeletion { path: String, detail: String },
    /// Some other local IO failure during an operation
    FilesystemErrorDuringOperation { path: String, detail: String },
    /// Content could not be fingerprinted, so it cannot be verified
    FingerprintMissing { path: String, side: Side },
    /// Deletion provisionally blocked by an in-flight scan
    DeleteOrMoveWaitingOnScan { path: String },
    /// Deletion provisionally blocked by an in-flight move
    DeleteWaitingOnMove {
        path: String,
        blocking_move: String,
    },
    /// Nesting exceeds the supported maximum
    ExceedsTreeDepth { path: String, depth: usize },
    /// Symlink, hard link, or special file; excluded until moved
    SpecialOrHardLink { path: String, flavor: LinkFlavor },
    /// Exclusion verdict still pending for this path
    UnknownTemporary { path: String },
    /// Remote side of a Backup root changed; local is canonical
    BackupExternallyModified { path: String, remote: Identity },
}

/// Error-handling class of a category (spec taxonomy: transient /
/// user-actionable / structural)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Retried automatically; surfaced only past a patience threshold
    Transient,
    /// Requires a user decision (or a Smart-mode safe default)
    UserActionable,
    /// Only an out-of-band filesystem change clears it
    Structural,
}

impl StallCategory {
    /// Stable label used for the issue identity key and for storage
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            StallCategory::NameConflict { .. } => "name_conflict",
            StallCategory::LocalAndRemoteChanged { .. } => "local_and_remote_changed",
            StallCategory::MoveOrRenameCannotOccur { .. } => "move_or_rename_cannot_occur",
            StallCategory::FolderMatchedAgainstFile { .. } => "folder_matched_against_file",
            StallCategory::CannotCreateFolder { .. } => "cannot_create_folder",
            StallCategory::CannotPerformDeletion { .. } => "cannot_perform_deletion",
            StallCategory::FilesystemErrorDuringOperation { .. } => {
                "filesystem_error_during_operation"
            }
            StallCategory::FingerprintMissing { .. } => "fingerprint_missing",
            StallCategory::DeleteOrMoveWaitingOnScan { .. } => "delete_or_move_waiting_on_scan",
            StallCategory::DeleteWaitingOnMove { .. } => "delete_waiting_on_move",
            StallCategory::ExceedsTreeDepth { .. } => "exceeds_tree_depth",
            StallCategory::SpecialOrHardLink { .. } => "special_or_hard_link",
            StallCategory::UnknownTemporary { .. } => "unknown_temporary",
            StallCategory::BackupExternallyModified { .. } => "backup_externally_modified",
        }
    }

    /// All involved paths, sorted; part of the issue identity
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut out = match self {
            StallCategory::NameConflict {
                local_paths,
                remote_paths,
                ..
            } => local_paths
                .iter()
                .chain(remote_paths.iter())
                .cloned()
                .collect(),
            StallCategory::LocalAndRemoteChanged { path, .. }
            | StallCategory::FolderMatchedAgainstFile { path, .. }
            | StallCategory::CannotCreateFolder { path, .. }
            | StallCategory::CannotPerformDeletion { path, .. }
            | StallCategory::FilesystemErrorDuringOperation { path, .. }
            | StallCategory::FingerprintMissing { path, .. }
            | StallCategory::DeleteOrMoveWaitingOnScan { path }
            | StallCategory::ExceedsTreeDepth { path, .. }
            | StallCategory::SpecialOrHardLink { path, .. }
            | StallCategory::UnknownTemporary { path }
            | StallCategory::BackupExternallyModified { path, .. } => vec![path.clone()],
            StallCategory::DeleteWaitingOnMove {
                path,
                blocking_move,
            } => vec![path.clone(), blocking_move.clone()],
            StallCategory::MoveOrRenameCannotOccur {
                original,
                local_target,
                remote_target,
            } => vec![
                original.clone(),
                local_target.clone(),
                remote_target.clone(),
            ],
        };
        out.sort();
        out.dedup();
        out
    }

    /// Error-handling class of this category
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            StallCategory::DeleteOrMoveWaitingOnScan { .. }
            | StallCategory::DeleteWaitingOnMove { .. }
            | StallCategory::UnknownTemporary { .. } => Severity::Transient,
            StallCategory::ExceedsTreeDepth { .. } | StallCategory::SpecialOrHardLink { .. } => {
                Severity::Structural
            }
            _ => Severity::UserActionable,
        }
    }

    /// True if the category is hidden until a patience threshold elapses
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.severity() == Severity::Transient
    }
}

/// A resolution action a user (or Smart mode) can apply to an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    KeepLocal,
    KeepRemote,
    KeepBoth,
    KeepMostRecent,
    RenameAll,
    MergeFolders,
    RemoveDuplicates,
    ChooseLocal,
    ChooseRemote,
    Retry,
    DownloadAndVerify,
    Ignore,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::KeepLocal => "keep_local",
            ActionKind::KeepRemote => "keep_remote",
            ActionKind::KeepBoth => "keep_both",
            ActionKind::KeepMostRecent => "keep_most_recent",
            ActionKind::RenameAll => "rename_all",
            ActionKind::MergeFolders => "merge_folders",
            ActionKind::RemoveDuplicates => "remove_duplicates",
            ActionKind::ChooseLocal => "choose_local",
            ActionKind::ChooseRemote => "choose_remote",
            ActionKind::Retry => "retry",
            ActionKind::DownloadAndVerify => "download_and_verify",
            ActionKind::Ignore => "ignore",
        };
        write!(f, "{s}")
    }
}

/// What applying an action did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Human-readable one-liner for the issue list
    pub summary: String,
    /// Transfer tasks this resolution enqueued
    pub tasks: Vec<TaskId>,
    /// Debris entries this resolution created
    pub debris: Vec<DebrisId>,
    /// True if applying the action disabled the owning root
    /// (keep-local on a Backup root)
    pub root_disabled: bool,
}

impl Outcome {
    /// An outcome with just a summary
    #[must_use]
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            tasks: Vec::new(),
            debris: Vec::new(),
            root_disabled: false,
        }
    }
}

/// Lifecycle state of a stalled issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// Raised by the classifier, not yet routed
    Detected,
    /// Smart mode is applying the category's safe default
    AutoResolving,
    /// Waiting for an explicit user decision
    AwaitingDecision,
    /// An action is executing; overlapping watch events are ignored
    Applying,
    /// Action completed; terminal
    Resolved,
    /// Action failed; retryable, keeps the error detail
    Failed,
    /// User ignored; path set excluded until external state changes
    Ignored,
    /// Underlying state changed externally; terminal, view must refresh
    Invalidated,
}

impl IssueState {
    /// True if the issue no longer participates in classification
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueState::Resolved | IssueState::Invalidated)
    }

    fn can_transition_to(self, next: IssueState) -> bool {
        use IssueState::*;
        matches!(
            (self, next),
            (Detected, AutoResolving)
                | (Detected, AwaitingDecision)
                | (Detected, Invalidated)
                | (AutoResolving, Applying)
                | (AutoResolving, AwaitingDecision)
                | (AwaitingDecision, Applying)
                | (AwaitingDecision, Ignored)
                | (AwaitingDecision, Invalidated)
                | (Applying, Resolved)
                | (Applying, Failed)
                | (Applying, Detected) // cancellation mid-apply
                | (Failed, Applying)
                | (Failed, Ignored)
                | (Failed, Invalidated)
                | (Ignored, Invalidated)
        )
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueState::Detected => "detected",
            IssueState::AutoResolving => "auto_resolving",
            IssueState::AwaitingDecision => "awaiting_decision",
            IssueState::Applying => "applying",
            IssueState::Resolved => "resolved",
            IssueState::Failed => "failed",
            IssueState::Ignored => "ignored",
            IssueState::Invalidated => "invalidated",
        };
        write!(f, "{s}")
    }
}

/// A tracked discrepancy that could not be merged automatically
///
/// Uniquely identified by (root, category label, sorted path set), so a
/// re-scan that observes the same condition re-finds the existing issue
/// instead of raising a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StalledIssue {
    id: IssueId,
    root: RootId,
    category: StallCategory,
    state: IssueState,
    detected_at: DateTime<Utc>,
    /// The action that was (or is being) applied
    chosen_action: Option<ActionKind>,
    /// Set once the action completed
    outcome: Option<Outcome>,
    /// Error detail for Failed issues
    last_error: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
}

impl StalledIssue {
    /// Raise a new issue in `Detected` state
    pub fn new(root: RootId, category: StallCategory) -> Self {
        Self {
            id: IssueId::new(),
            root,
            category,
            state: IssueState::Detected,
            detected_at: Utc::now(),
            chosen_action: None,
            outcome: None,
            last_error: None,
            resolved_at: None,
        }
    }

    pub fn id(&self) -> IssueId {
        self.id
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn category(&self) -> &StallCategory {
        &self.category
    }

    pub fn state(&self) -> IssueState {
        self.state
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn chosen_action(&self) -> Option<ActionKind> {
        self.chosen_action
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// Identity key: (root, category label, sorted path set)
    ///
    /// Stable across re-scans so the registry can deduplicate.
    #[must_use]
    pub fn identity_key(&self) -> String {
        let paths = self.category.paths().join("\u{1f}");
        format!("{}|{}|{}", self.root, self.category.label(), paths)
    }

    /// Guarded lifecycle transition
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` for transitions outside the
    /// lifecycle diagram.
    pub fn transition_to(&mut self, next: IssueState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidState {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Record the action currently being applied
    pub fn set_chosen_action(&mut self, action: ActionKind) {
        self.chosen_action = Some(action);
    }

    /// Mark resolved with its outcome; idempotent
    ///
    /// Re-resolving an already-resolved issue keeps the first outcome.
    pub fn mark_resolved(&mut self, outcome: Outcome) {
        if self.state == IssueState::Resolved {
            return;
        }
        self.state = IssueState::Resolved;
        self.outcome = Some(outcome);
        self.resolved_at = Some(Utc::now());
        self.last_error = None;
    }

    /// Mark failed with an error detail; the issue stays retryable
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.state = IssueState::Failed;
        self.last_error = Some(error.into());
    }
}
