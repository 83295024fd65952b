//! Transfer queue and debris management for tandem
//!
//! Provides the concrete [`TransferQueue`] behind the
//! `ITransferQueue` port, plus the [`DebrisManager`] that relocates
//! would-be deletions into recoverable holding areas.

pub mod debris;
pub mod error;
pub mod queue;

pub use debris::{DebrisManager, LOCAL_DEBRIS_DIR};
pub use error::TransferError;
pub use queue::TransferQueue;
