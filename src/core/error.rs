//! Error taxonomy for the reindexing engine.
//!
//! Public entry points never hand these to callers as `Err`; the orchestrator
//! folds them into structured failure results. They exist so each pipeline
//! stage can use `?` internally and so results can carry the original cause.

use serde::Serialize;

/// Failures of the external editor capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum EditorError {
    /// The editor is gone (closed, detached, torn down)
    #[error("editor unavailable")]
    Unavailable,

    /// The editor refused a content write
    #[error("editor rejected write: {0}")]
    WriteRejected(String),

    /// Reading editor state failed
    #[error("editor read failed: {0}")]
    ReadFailed(String),
}

/// Stage-level failures inside one reindexing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ReindexError {
    /// Unusable input (bad marker token, offset outside the buffer)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Planner produced nothing usable or an inconsistent plan
    #[error("planning failed: {0}")]
    Planning(String),

    /// Content rewrite did not succeed
    #[error("rewrite failed: {0}")]
    Rewrite(String),

    /// Pushing rewritten content into the editor failed
    #[error("apply failed: {0}")]
    Apply(#[from] EditorError),

    /// Reference mapping synchronization failed
    #[error("mapping update failed: {0}")]
    Remap(String),

    /// Post-apply validation reported hard errors
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Restoring the backup did not fully succeed
    #[error("rollback incomplete: {}", .0.join("; "))]
    Rollback(Vec<String>),

    /// A panic caught at the orchestrator boundary
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReindexError {
    /// Short stage tag used in logs and reports
    pub fn stage(&self) -> &'static str {
        match self {
            ReindexError::InvalidInput(_) => "input",
            ReindexError::Planning(_) => "plan",
            ReindexError::Rewrite(_) => "rewrite",
            ReindexError::Apply(_) => "apply",
            ReindexError::Remap(_) => "remap",
            ReindexError::Validation(_) => "validate",
            ReindexError::Rollback(_) => "rollback",
            ReindexError::Internal(_) => "internal",
        }
    }
}
