//! ExecutionHistory port - state machine の実行履歴
//!
//! worker は自分がどの step として呼ばれたかを知らないので、
//! 実行中の execution の履歴から「今入った step」を探す。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("execution {0} does not exist")]
    ExecutionNotFound(String),

    /// Rate-limited by the service; the call may be retried.
    #[error("execution history request throttled: {0}")]
    Throttled(String),

    #[error("execution history error: {0}")]
    Backend(String),
}

impl HistoryError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, HistoryError::Throttled(_))
    }
}

/// The subset of history event types step resolution looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HistoryEventKind {
    TaskStateEntered { name: String },
    /// Any `*StateExited` event.
    StateExited { name: String },
    LambdaFunctionScheduled { resource: String },
    ActivityScheduled { resource: String },
    Other { event_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: u64,
    #[serde(default)]
    pub previous_event_id: Option<u64>,
    #[serde(flatten)]
    pub kind: HistoryEventKind,
}

impl HistoryEvent {
    pub fn new(id: u64, previous_event_id: Option<u64>, kind: HistoryEventKind) -> Self {
        Self {
            id,
            previous_event_id,
            kind,
        }
    }

    /// Resource of a scheduled Lambda or activity step.
    pub fn scheduled_resource(&self) -> Option<&str> {
        match &self.kind {
            HistoryEventKind::LambdaFunctionScheduled { resource }
            | HistoryEventKind::ActivityScheduled { resource } => Some(resource),
            _ => None,
        }
    }

    pub fn entered_task_name(&self) -> Option<&str> {
        match &self.kind {
            HistoryEventKind::TaskStateEntered { name } => Some(name),
            _ => None,
        }
    }
}

/// Read access to execution history.
#[async_trait]
pub trait ExecutionHistory: Send + Sync {
    /// Up to `max_results` events of the execution, newest first.
    async fn get_execution_history(
        &self,
        execution_arn: &str,
        max_results: usize,
    ) -> Result<Vec<HistoryEvent>, HistoryError>;
}
