//! Errors - エラー型と分類
//!
//! Every fallible operation in the crate returns [`CirrusError`]. Port-level
//! errors keep their own enums and convert with `#[from]`.

use thiserror::Error;

use crate::ports::{BlobError, HistoryError, StoreError};

pub type Result<T, E = CirrusError> = std::result::Result<T, E>;

/// Expected business failures that end a single step without failing the
/// whole workflow.
///
/// The orchestrator reports these as an `exception` field on a successful
/// result so the state machine can branch on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowErrorKind {
    /// The step had nothing to do.
    NotNeeded,
    /// The step made partial progress and can be re-run.
    Incomplete,
    /// A shared resource (connection budget, lock) is saturated.
    ResourcesLocked,
    /// A task-defined kind. The name is reported verbatim.
    Other(String),
}

impl WorkflowErrorKind {
    pub fn name(&self) -> &str {
        match self {
            WorkflowErrorKind::NotNeeded => "NotNeededWorkflowError",
            WorkflowErrorKind::Incomplete => "IncompleteWorkflowError",
            WorkflowErrorKind::ResourcesLocked => "ResourcesLockedWorkflowError",
            WorkflowErrorKind::Other(name) => name,
        }
    }
}

impl std::fmt::Display for WorkflowErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CirrusError {
    /// Unknown or missing `message_source`, missing task name, bad settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A remote pointer could not be dereferenced (not-found is reported as `Blob`).
    #[error("failed to fetch s3://{bucket}/{key}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: BlobError,
    },

    #[error("semaphore {key} is at its limit of {max}")]
    LimitExceeded { key: String, max: i64 },

    #[error("lock {key} is held by another process")]
    LockContention { key: String },

    #[error("{kind}: {message}")]
    Workflow {
        kind: WorkflowErrorKind,
        message: String,
    },

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("json error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid path expression: {0}")]
    Path(String),

    /// Unclassified failure raised by task code.
    #[error("task failed: {0}")]
    Task(String),
}

impl CirrusError {
    pub fn workflow(kind: WorkflowErrorKind, message: impl Into<String>) -> Self {
        CirrusError::Workflow {
            kind,
            message: message.into(),
        }
    }

    /// The `exception` name reported for workflow errors.
    pub fn workflow_kind_name(&self) -> Option<&str> {
        match self {
            CirrusError::Workflow { kind, .. } => Some(kind.name()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_kinds_report_their_names() {
        let err = CirrusError::workflow(WorkflowErrorKind::NotNeeded, "nothing to sync");
        assert_eq!(err.workflow_kind_name(), Some("NotNeededWorkflowError"));
        assert_eq!(
            err.to_string(),
            "NotNeededWorkflowError: nothing to sync"
        );

        let custom = WorkflowErrorKind::Other("PdrAlreadyProcessedWorkflowError".into());
        assert_eq!(custom.name(), "PdrAlreadyProcessedWorkflowError");
    }

    #[test]
    fn other_errors_are_not_workflow_errors() {
        let err = CirrusError::Task("boom".into());
        assert_eq!(err.workflow_kind_name(), None);
    }
}
