//! Domain entities and value types
//!
//! Pure business logic with no IO: newtypes, the tree arena, the stall
//! taxonomy and issue lifecycle, sync root configuration, debris and
//! transfer entities, and the scanner/classifier change contract.

pub mod change;
pub mod debris;
pub mod errors;
pub mod issue;
pub mod newtypes;
pub mod sync_root;
pub mod transfer;
pub mod tree;

pub use change::{AnomalyKind, ChangeKind, ChangeRecord, ChangeSet, ScanAnomaly, Side};
pub use debris::DebrisEntry;
pub use errors::DomainError;
pub use issue::{
    ActionKind, IssueState, LinkFlavor, Outcome, Severity, StallCategory, StalledIssue,
};
pub use newtypes::{ContentDigest, DebrisId, IssueId, LocalPath, RemotePath, RootId, TaskId};
pub use sync_root::{SolveMode, SyncMode, SyncRoot};
pub use transfer::{TaskState, TransferOp, TransferTask};
pub use tree::{EntryKind, Identity, NodeId, TreeArena, TreeNode};
