//! Semaphore - 重み付きの分散カウンタ

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::{CirrusError, Result};
use crate::ports::{Condition, CoordinationStore, Item};

const VALUE: &str = "value";

/// Bounded counter shared by every process that talks to the same store.
///
/// Records are created lazily (`{key, value: 0}`) and never deleted.
#[derive(Clone)]
pub struct Semaphore {
    store: Arc<dyn CoordinationStore>,
}

impl Semaphore {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Add `count` to the counter under `key`, returning the new value.
    ///
    /// When `count > 0` and `max > 0` the increment only happens if the
    /// value before it is at most `max - count`; otherwise it fails with
    /// [`CirrusError::LimitExceeded`]. Decrements are never bounded.
    #[instrument(skip(self))]
    pub async fn add(&self, key: &str, count: i64, max: i64) -> Result<i64> {
        // 作成競合は無視してよい（誰かが作っていれば十分）
        self.store
            .create_if_absent(key, Item::from([(VALUE.to_string(), 0)]))
            .await?;

        let condition = if count > 0 && max > 0 {
            Condition::at_most(VALUE, max - count)
        } else {
            Condition::Always
        };

        match self
            .store
            .conditional_increment(key, VALUE, count, condition)
            .await
        {
            Ok(value) => {
                debug!(value, "Semaphore updated");
                Ok(value)
            }
            Err(e) if e.is_condition_failed() => Err(CirrusError::LimitExceeded {
                key: key.to_string(),
                max,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn up(&self, key: &str, max: i64) -> Result<i64> {
        self.add(key, 1, max).await
    }

    pub async fn down(&self, key: &str) -> Result<i64> {
        self.add(key, -1, 0).await
    }

    /// Current value; 0 when the record does not exist yet.
    pub async fn get(&self, key: &str) -> Result<i64> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|item| item.get(VALUE).copied())
            .unwrap_or(0))
    }

    /// Run `f` while holding `count` units of `key`.
    ///
    /// If the semaphore is full, `on_limit` runs instead of `f`. Once `f`
    /// has started, the units are released whether it succeeds or fails.
    pub async fn checkout<T, F, Fut, L, LFut>(
        &self,
        key: &str,
        count: i64,
        max: i64,
        f: F,
        on_limit: L,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        L: FnOnce() -> LFut,
        LFut: Future<Output = Result<T>>,
    {
        match self.add(key, count, max).await {
            Ok(_) => {}
            Err(CirrusError::LimitExceeded { .. }) => {
                debug!(key, max, "Semaphore full, running fallback");
                return on_limit().await;
            }
            Err(e) => return Err(e),
        }

        let outcome = f().await;
        let released = self.add(key, -count, 0).await;

        match (outcome, released) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(key, error = %release_err, "Failed to release semaphore after task error");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryCoordinationStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn semaphore() -> (Semaphore, Arc<InMemoryCoordinationStore>) {
        let store = Arc::new(InMemoryCoordinationStore::new());
        (Semaphore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn add_at_max_fails_but_decrement_succeeds() {
        let (sem, _) = semaphore();
        sem.add("k", 5, 0).await.unwrap();

        let err = sem.add("k", 1, 5).await.unwrap_err();
        assert!(matches!(err, CirrusError::LimitExceeded { max: 5, .. }));
        assert_eq!(sem.get("k").await.unwrap(), 5);

        assert_eq!(sem.add("k", -1, 0).await.unwrap(), 4);
        assert_eq!(sem.up("k", 5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn weighted_add_respects_max() {
        let (sem, _) = semaphore();
        sem.add("k", 3, 5).await.unwrap();
        assert!(sem.add("k", 3, 5).await.is_err());
        assert_eq!(sem.add("k", 2, 5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unbounded_without_max() {
        let (sem, store) = semaphore();
        for _ in 0..10 {
            sem.up("k", 0).await.unwrap();
        }
        assert_eq!(store.attribute("k", "value").await, Some(10));
        assert_eq!(sem.down("k").await.unwrap(), 9);
        assert_eq!(sem.get("missing").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn checkout_bounds_concurrent_holders() {
        const MAX: i64 = 3;
        let (sem, _) = semaphore();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let fallbacks = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..=MAX {
            let sem = sem.clone();
            let active = active.clone();
            let peak = peak.clone();
            let fallbacks = fallbacks.clone();
            handles.push(tokio::spawn(async move {
                sem.checkout(
                    "provider",
                    1,
                    MAX,
                    move || async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok("ran")
                    },
                    move || async move {
                        fallbacks.fetch_add(1, Ordering::SeqCst);
                        Ok("limited")
                    },
                )
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= MAX as usize);
        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(sem.get("provider").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn checkout_releases_after_failure() {
        let (sem, _) = semaphore();
        let result: Result<()> = sem
            .checkout(
                "k",
                2,
                2,
                || async { Err(CirrusError::Task("boom".into())) },
                || async { Ok(()) },
            )
            .await;
        assert!(matches!(result, Err(CirrusError::Task(_))));
        assert_eq!(sem.get("k").await.unwrap(), 0);
    }
}
