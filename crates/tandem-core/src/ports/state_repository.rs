//! State repository port (driven/secondary port)
//!
//! Interface for persisting stalled issues, per-root sync baselines,
//! and the debris index.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//!   The one exception the engine must distinguish is corruption: an
//!   adapter that detects a corrupted store wraps [`CorruptedStateError`]
//!   so callers can downcast and escalate (disable the root) instead of
//!   retrying a doomed operation.
//! - All write operations take references, the caller keeps ownership.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::change::Side;
use crate::domain::debris::DebrisEntry;
use crate::domain::issue::{IssueState, StalledIssue};
use crate::domain::newtypes::{DebrisId, IssueId, RootId};
use crate::domain::tree::TreeArena;

/// Marker error for a corrupted local state store
///
/// Fatal: the engine responds by disabling the owning sync root rather
/// than looping on retries.
#[derive(Debug, Error)]
#[error("local state store is corrupted: {0}")]
pub struct CorruptedStateError(pub String);

/// Filter criteria for querying stalled issues
///
/// All fields are optional; `None` applies no filtering for that field.
/// Multiple filters combine with AND.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Filter by owning root
    pub root: Option<RootId>,
    /// Filter by lifecycle state
    pub state: Option<IssueState>,
    /// Filter by category label (see `StallCategory::label`)
    pub category: Option<String>,
}

impl IssueFilter {
    /// An empty filter (matches all issues)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one root
    #[must_use]
    pub fn with_root(mut self, root: RootId) -> Self {
        self.root = Some(root);
        self
    }

    /// Restrict to one lifecycle state
    #[must_use]
    pub fn with_state(mut self, state: IssueState) -> Self {
        self.state = Some(state);
        self
    }

    /// Restrict to one category label
    #[must_use]
    pub fn with_category(mut self, label: impl Into<String>) -> Self {
        self.category = Some(label.into());
        self
    }

    /// True if the issue passes every set criterion
    #[must_use]
    pub fn matches(&self, issue: &StalledIssue) -> bool {
        if let Some(root) = self.root {
            if issue.root() != root {
                return false;
            }
        }
        if let Some(state) = self.state {
            if issue.state() != state {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if issue.category().label() != category {
                return false;
            }
        }
        true
    }
}

/// Persistent storage for engine state
#[async_trait]
pub trait IStateRepository: Send + Sync {
    /// Insert or update a stalled issue
    async fn save_issue(&self, issue: &StalledIssue) -> anyhow::Result<()>;

    /// Load issues matching the filter
    async fn load_issues(&self, filter: &IssueFilter) -> anyhow::Result<Vec<StalledIssue>>;

    /// Delete an issue (after invalidation cleanup)
    async fn delete_issue(&self, id: IssueId) -> anyhow::Result<()>;

    /// Persist the last-common-state tree for one side of a root
    async fn save_baseline(
        &self,
        root: RootId,
        side: Side,
        arena: &TreeArena,
    ) -> anyhow::Result<()>;

    /// Load the last-common-state tree for one side of a root
    async fn load_baseline(&self, root: RootId, side: Side) -> anyhow::Result<Option<TreeArena>>;

    /// Record a debris relocation
    async fn save_debris(&self, entry: &DebrisEntry) -> anyhow::Result<()>;

    /// Load the full debris index
    async fn load_debris(&self) -> anyhow::Result<Vec<DebrisEntry>>;

    /// Remove a debris record (purged or emptied)
    async fn delete_debris(&self, id: DebrisId) -> anyhow::Result<()>;
}
