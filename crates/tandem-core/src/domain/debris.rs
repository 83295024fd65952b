//! Debris entry entity
//!
//! Anything a resolution would destructively remove is moved to a
//! holding area instead, with enough provenance to be user-recoverable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::change::Side;
use super::newtypes::{DebrisId, RootId};

/// A relocated copy of an object that would otherwise have been removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebrisEntry {
    id: DebrisId,
    root: RootId,
    /// The side the object lived on before relocation
    side: Side,
    /// `/`-separated path relative to the root at removal time
    original_path: String,
    /// Path inside the debris area
    relocated_to: String,
    moved_at: DateTime<Utc>,
}

impl DebrisEntry {
    pub fn new(
        root: RootId,
        side: Side,
        original_path: impl Into<String>,
        relocated_to: impl Into<String>,
    ) -> Self {
        Self {
            id: DebrisId::new(),
            root,
            side,
            original_path: original_path.into(),
            relocated_to: relocated_to.into(),
            moved_at: Utc::now(),
        }
    }

    pub fn id(&self) -> DebrisId {
        self.id
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn original_path(&self) -> &str {
        &self.original_path
    }

    pub fn relocated_to(&self) -> &str {
        &self.relocated_to
    }

    pub fn moved_at(&self) -> DateTime<Utc> {
        self.moved_at
    }

    /// True if the entry is older than the retention window
    #[must_use]
    pub fn is_expired(&self, retention_days: u32, now: DateTime<Utc>) -> bool {
        now - self.moved_at > Duration::days(i64::from(retention_days))
    }
}
