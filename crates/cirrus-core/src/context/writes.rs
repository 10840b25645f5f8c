//! WriteTracker - 呼び出し中に発生した blob 書き込みの完了待ち

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::{CirrusError, Result};
use crate::ports::BlobError;

/// Writes started during one invocation.
///
/// Terminal status must not be reported before every tracked write settled,
/// so `complete`/`fail` go through [`WriteTracker::wait`].
#[derive(Clone, Default)]
pub struct WriteTracker {
    pending: Arc<Mutex<Vec<JoinHandle<Result<(), BlobError>>>>>,
}

impl WriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `write` in the background and remember it.
    pub async fn track<F>(&self, write: F)
    where
        F: Future<Output = Result<(), BlobError>> + Send + 'static,
    {
        let handle = tokio::spawn(write);
        self.pending.lock().await.push(handle);
    }

    /// Join every tracked write. All of them settle; the first failure is returned.
    pub async fn wait(&self) -> Result<()> {
        let handles = std::mem::take(&mut *self.pending.lock().await);
        let mut first_error = None;

        for handle in handles {
            let error = match handle.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => CirrusError::Blob(e),
                Err(join) => CirrusError::Task(format!("blob write did not finish: {join}")),
            };
            warn!(%error, "Tracked write failed");
            if first_error.is_none() {
                first_error = Some(error);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
