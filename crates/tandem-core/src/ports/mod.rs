//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the trait boundaries the domain core depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalFileSystem`] - local file operations used during resolution
//! - [`IRemoteStore`] - remote change feed and remote mutations
//! - [`IStateRepository`] - persistent issues, baselines, debris index
//! - [`ITransferQueue`] - transfer admission, completion, cancellation

pub mod local_filesystem;
pub mod remote_store;
pub mod state_repository;
pub mod transfer_queue;

pub use local_filesystem::{FsEntryState, ILocalFileSystem};
pub use remote_store::{IRemoteStore, RemoteEntry};
pub use state_repository::{CorruptedStateError, IStateRepository, IssueFilter};
pub use transfer_queue::ITransferQueue;
