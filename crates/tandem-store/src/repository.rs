//! SQLite implementation of IStateRepository
//!
//! This module provides the concrete SQLite-based implementation of the
//! state repository port defined in tandem-core. It handles all domain
//! type serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                    |
//! |----------------|----------|---------------------------------------------|
//! | IssueId, RootId, DebrisId | TEXT | UUID string via `.to_string()` / serde |
//! | Side           | TEXT     | serde string (`local` / `remote`)           |
//! | IssueState     | TEXT     | serde string via `.to_string()`             |
//! | DateTime<Utc>  | TEXT     | ISO 8601 via `to_rfc3339()`                 |
//! | StalledIssue   | TEXT     | serde_json payload (filter columns lifted)  |
//! | TreeArena      | TEXT     | serde_json payload                          |
//!
//! A payload that fails to deserialize is reported as
//! [`CorruptedStateError`] so the engine can disable the owning root
//! instead of retrying.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use tandem_core::domain::change::Side;
use tandem_core::domain::debris::DebrisEntry;
use tandem_core::domain::issue::StalledIssue;
use tandem_core::domain::newtypes::{DebrisId, IssueId, RootId};
use tandem_core::domain::tree::TreeArena;
use tandem_core::ports::state_repository::{CorruptedStateError, IStateRepository, IssueFilter};

use crate::StoreError;

const SCHEMA: &str = include_str!("migrations/20260601_initial.sql");

/// SQLite-based implementation of the state repository port
///
/// Owns its connection pool; [`open`](Self::open) sets up the file,
/// WAL journaling, and the schema in one step, so callers hold nothing
/// but the repository itself.
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    /// Open the state database at `path`, creating the file, its parent
    /// directories, and the schema as needed
    ///
    /// # Errors
    ///
    /// [`StoreError::ConnectionFailed`] when the file cannot be opened,
    /// [`StoreError::MigrationFailed`] when the schema cannot be applied.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::ConnectionFailed(format!("creating {}: {e}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("{}: {e}", path.display())))?;
        let repo = Self::from_pool(pool).await?;
        info!(path = %path.display(), "State database ready");
        Ok(repo)
    }

    /// Open a throwaway in-memory store
    ///
    /// Limited to a single connection; sqlite keeps an in-memory
    /// database alive only as long as the connection that made it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        debug!("State schema applied");
        Ok(Self { pool })
    }

    /// The underlying pool, for maintenance queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection, flushing outstanding writes
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Report a payload that no longer deserializes as store corruption
fn corrupted(what: &str, detail: impl std::fmt::Display) -> anyhow::Error {
    anyhow::Error::new(CorruptedStateError(format!("{what}: {detail}")))
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupted("timestamp", format!("'{s}': {e}")))
}

/// Parse a Side from its stored serde string form
fn side_from_string(s: &str) -> anyhow::Result<Side> {
    serde_json::from_str(&format!("\"{s}\"")).map_err(|e| corrupted("side", format!("'{s}': {e}")))
}

/// Serialize a Side to its bare serde string form
fn side_to_string(side: Side) -> String {
    serde_json::to_string(&side)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a StalledIssue from its stored JSON payload
fn issue_from_row(row: &SqliteRow) -> anyhow::Result<StalledIssue> {
    let id: String = row.get("id");
    let payload: String = row.get("payload");
    serde_json::from_str(&payload).map_err(|e| corrupted("issue payload", format!("{id}: {e}")))
}

/// Reconstruct a DebrisEntry from a database row
///
/// Uses serde JSON deserialization to reconstruct the entry since the
/// struct has private fields that can only be set through constructors
/// or deserialization.
fn debris_from_row(row: &SqliteRow) -> anyhow::Result<DebrisEntry> {
    let id: String = row.get("id");
    let root: String = row.get("root");
    let side: String = row.get("side");
    let original_path: String = row.get("original_path");
    let relocated_to: String = row.get("relocated_to");
    let moved_at: String = row.get("moved_at");

    // Validated up front so a bad row names the offending column
    parse_datetime(&moved_at)?;
    side_from_string(&side)?;

    let entry_json = serde_json::json!({
        "id": id,
        "root": root,
        "side": side,
        "original_path": original_path,
        "relocated_to": relocated_to,
        "moved_at": moved_at,
    });

    serde_json::from_value(entry_json)
        .map_err(|e| corrupted("debris entry", format!("{id}: {e}")))
}

// ============================================================================
// IStateRepository implementation
// ============================================================================

#[async_trait]
impl IStateRepository for SqliteStateRepository {
    // --- Issue operations ---

    async fn save_issue(&self, issue: &StalledIssue) -> anyhow::Result<()> {
        let id = issue.id().to_string();
        let root = issue.root().to_string();
        let category = issue.category().label();
        let state = issue.state().to_string();
        let detected_at = issue.detected_at().to_rfc3339();
        let payload = serde_json::to_string(issue)
            .map_err(|e| anyhow::anyhow!("Failed to serialize issue: {}", e))?;

        sqlx::query(
            "INSERT OR REPLACE INTO issues \
             (id, root, category, state, detected_at, payload) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&root)
        .bind(category)
        .bind(&state)
        .bind(&detected_at)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        tracing::trace!(issue_id = %id, %state, "Saved issue");
        Ok(())
    }

    async fn load_issues(&self, filter: &IssueFilter) -> anyhow::Result<Vec<StalledIssue>> {
        let mut sql = String::from("SELECT id, payload FROM issues WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(root) = filter.root {
            sql.push_str(" AND root = ?");
            binds.push(root.to_string());
        }

        if let Some(state) = filter.state {
            sql.push_str(" AND state = ?");
            binds.push(state.to_string());
        }

        if let Some(ref category) = filter.category {
            sql.push_str(" AND category = ?");
            binds.push(category.clone());
        }

        sql.push_str(" ORDER BY detected_at DESC");

        // Build the query dynamically
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut issues = Vec::with_capacity(rows.len());
        for row in &rows {
            issues.push(issue_from_row(row)?);
        }

        Ok(issues)
    }

    async fn delete_issue(&self, id: IssueId) -> anyhow::Result<()> {
        let id_str = id.to_string();

        sqlx::query("DELETE FROM issues WHERE id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;

        tracing::trace!(issue_id = %id_str, "Deleted issue");
        Ok(())
    }

    // --- Baseline operations ---

    async fn save_baseline(
        &self,
        root: RootId,
        side: Side,
        arena: &TreeArena,
    ) -> anyhow::Result<()> {
        let root_str = root.to_string();
        let side_str = side_to_string(side);
        let payload = serde_json::to_string(arena)
            .map_err(|e| anyhow::anyhow!("Failed to serialize baseline: {}", e))?;
        let saved_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO baselines (root, side, arena, saved_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&root_str)
        .bind(&side_str)
        .bind(&payload)
        .bind(&saved_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(root = %root_str, side = %side_str, nodes = arena.len(), "Saved baseline");
        Ok(())
    }

    async fn load_baseline(&self, root: RootId, side: Side) -> anyhow::Result<Option<TreeArena>> {
        let root_str = root.to_string();
        let side_str = side_to_string(side);

        let row = sqlx::query("SELECT arena FROM baselines WHERE root = ? AND side = ?")
            .bind(&root_str)
            .bind(&side_str)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let payload: String = r.get("arena");
                let arena = serde_json::from_str(&payload).map_err(|e| {
                    corrupted("baseline payload", format!("{root_str}/{side_str}: {e}"))
                })?;
                Ok(Some(arena))
            }
            None => Ok(None),
        }
    }

    // --- Debris operations ---

    async fn save_debris(&self, entry: &DebrisEntry) -> anyhow::Result<()> {
        let id = entry.id().to_string();
        let root = entry.root().to_string();
        let side = side_to_string(entry.side());
        let moved_at = entry.moved_at().to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO debris \
             (id, root, side, original_path, relocated_to, moved_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&root)
        .bind(&side)
        .bind(entry.original_path())
        .bind(entry.relocated_to())
        .bind(&moved_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(debris_id = %id, "Saved debris entry");
        Ok(())
    }

    async fn load_debris(&self) -> anyhow::Result<Vec<DebrisEntry>> {
        let rows = sqlx::query("SELECT * FROM debris ORDER BY moved_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(debris_from_row(row)?);
        }

        Ok(entries)
    }

    async fn delete_debris(&self, id: DebrisId) -> anyhow::Result<()> {
        let id_str = id.to_string();

        sqlx::query("DELETE FROM debris WHERE id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await?;

        tracing::trace!(debris_id = %id_str, "Deleted debris entry");
        Ok(())
    }
}
