//! Stall classification and resolution for tandem
//!
//! The engine that turns un-mergeable discrepancies between a local
//! and a remote tree into tracked, resolvable issues: a classifier
//! sorting change sets into merges and stalls, a deduplicating issue
//! registry, a resolution executor that routes every discard through
//! debris, and the [`StallService`] facade a UI talks to.

pub mod classifier;
pub mod error;
pub mod namer;
pub mod registry;
pub mod resolver;
pub mod service;

pub use classifier::{Classification, Classifier, MergeOp};
pub use error::StallError;
pub use namer::StallNamer;
pub use registry::IssueRegistry;
pub use resolver::{list_actions, smart_default, BatchOutcome, StallResolver};
pub use service::{IssueDetail, IssueView, StallService};
