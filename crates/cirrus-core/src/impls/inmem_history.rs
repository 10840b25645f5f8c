//! StaticExecutionHistory - 事前登録した履歴を返す ExecutionHistory

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{ExecutionHistory, HistoryError, HistoryEvent};

#[derive(Debug, Default)]
pub struct StaticExecutionHistory {
    executions: Mutex<HashMap<String, Vec<HistoryEvent>>>,
    throttled: AtomicUsize,
    calls: AtomicUsize,
}

impl StaticExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `events` (oldest first) for `execution_arn`, replacing any earlier record.
    pub async fn record(&self, execution_arn: impl Into<String>, events: Vec<HistoryEvent>) {
        self.executions
            .lock()
            .await
            .insert(execution_arn.into(), events);
    }

    /// Answer the next `n` requests with [`HistoryError::Throttled`].
    pub fn throttle_next(&self, n: usize) {
        self.throttled.store(n, Ordering::SeqCst);
    }

    /// Requests received so far, throttled ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionHistory for StaticExecutionHistory {
    async fn get_execution_history(
        &self,
        execution_arn: &str,
        max_results: usize,
    ) -> Result<Vec<HistoryEvent>, HistoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let throttle = self
            .throttled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttle {
            return Err(HistoryError::Throttled("Rate exceeded".into()));
        }

        let executions = self.executions.lock().await;
        let events = executions
            .get(execution_arn)
            .ok_or_else(|| HistoryError::ExecutionNotFound(execution_arn.to_string()))?;
        Ok(events.iter().rev().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::HistoryEventKind;

    #[tokio::test]
    async fn returns_newest_first_and_truncates() {
        let history = StaticExecutionHistory::new();
        let events = (1..=5)
            .map(|id| {
                HistoryEvent::new(
                    id,
                    id.checked_sub(1),
                    HistoryEventKind::Other {
                        event_type: "Pass".into(),
                    },
                )
            })
            .collect();
        history.record("arn:exec", events).await;

        let page = history.get_execution_history("arn:exec", 3).await.unwrap();
        let ids: Vec<u64> = page.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn throttles_the_requested_number_of_calls() {
        let history = StaticExecutionHistory::new();
        history.record("arn:exec", Vec::new()).await;
        history.throttle_next(2);

        for _ in 0..2 {
            let err = history.get_execution_history("arn:exec", 10).await.unwrap_err();
            assert!(err.is_throttled());
        }
        assert!(history.get_execution_history("arn:exec", 10).await.is_ok());
        assert_eq!(history.calls(), 3);
    }

    #[tokio::test]
    async fn unknown_execution() {
        let history = StaticExecutionHistory::new();
        assert!(matches!(
            history.get_execution_history("nope", 10).await,
            Err(HistoryError::ExecutionNotFound(_))
        ));
    }
}
