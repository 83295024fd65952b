//! Stall engine errors

use tandem_core::domain::issue::ActionKind;
use tandem_core::domain::newtypes::IssueId;
use thiserror::Error;

/// Errors from classification and resolution
#[derive(Debug, Error)]
pub enum StallError {
    /// No issue with this id is registered
    #[error("unknown issue: {0}")]
    UnknownIssue(IssueId),

    /// The action is not offered for the issue's category/mode
    #[error("action {action} is not applicable to issue {issue}")]
    ActionNotApplicable { issue: IssueId, action: ActionKind },

    /// The issue's lifecycle state does not permit the operation
    #[error(transparent)]
    Domain(#[from] tandem_core::domain::errors::DomainError),

    /// The apply was cancelled before any side effect was committed
    #[error("resolution of issue {0} was cancelled")]
    Cancelled(IssueId),

    /// An underlying port operation failed
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),
}
