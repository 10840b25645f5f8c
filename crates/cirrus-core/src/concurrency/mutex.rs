//! Mutex - 期限付きの分散ロック
//!
//! 更新（heartbeat）は無い。`timeout` を過ぎたロックは次の呼び出し元に奪われる。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::domain::{CirrusError, Result};
use crate::ports::{Clock, Condition, CoordinationStore, Item};

const EXPIRE: &str = "expire";

#[derive(Clone)]
pub struct Mutex {
    store: Arc<dyn CoordinationStore>,
    clock: Arc<dyn Clock>,
}

impl Mutex {
    pub fn new(store: Arc<dyn CoordinationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Run `f` while holding `key`, then release it regardless of the outcome.
    ///
    /// Acquisition succeeds when no lock exists or the existing one expired
    /// (`expire < now`). A live lock held elsewhere is
    /// [`CirrusError::LockContention`] and `f` does not run.
    pub async fn lock<T, F, Fut>(&self, key: &str, timeout: Duration, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.acquire(key, timeout).await?;

        let outcome = f().await;
        let released = self.unlock(key).await;

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(key, error = %release_err, "Failed to release lock after task error");
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<()> {
        let now = self.clock.now_millis();
        let expire = now.saturating_add(i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX));

        self.store
            .conditional_put(
                key,
                Item::from([(EXPIRE.to_string(), expire)]),
                Condition::NotExists.or(Condition::less_than(EXPIRE, now)),
            )
            .await
            .map_err(|e| {
                if e.is_condition_failed() {
                    CirrusError::LockContention {
                        key: key.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        debug!(expire, "Lock acquired");
        Ok(())
    }

    /// Unconditional release.
    pub async fn unlock(&self, key: &str) -> Result<()> {
        self.store.delete(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryCoordinationStore;
    use crate::ports::FixedClock;
    use chrono::Utc;

    fn mutex() -> (Mutex, Arc<FixedClock>, Arc<InMemoryCoordinationStore>) {
        let store = Arc::new(InMemoryCoordinationStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        (Mutex::new(store.clone(), clock.clone()), clock, store)
    }

    const TIMEOUT: Duration = Duration::from_millis(1000);

    #[tokio::test]
    async fn held_lock_blocks_a_second_caller() {
        let (m, _, _) = mutex();
        let inner = m.clone();
        let result = m
            .lock("pdr", TIMEOUT, || async move {
                let second = inner.lock("pdr", TIMEOUT, || async { Ok("second") }).await;
                assert!(matches!(second, Err(CirrusError::LockContention { .. })));
                Ok("first")
            })
            .await
            .unwrap();
        assert_eq!(result, "first");
    }

    #[tokio::test]
    async fn expired_lock_is_stolen() {
        let (m, clock, _) = mutex();
        let thief = m.clone();
        let result = m
            .lock("pdr", TIMEOUT, || async move {
                // holder stalls past its timeout
                clock.advance(Duration::from_millis(1001));
                thief.lock("pdr", TIMEOUT, || async { Ok("stolen") }).await
            })
            .await
            .unwrap();
        assert_eq!(result, "stolen");
    }

    #[tokio::test]
    async fn lock_is_released_after_error() {
        let (m, _, store) = mutex();
        let result: Result<()> = m
            .lock("pdr", TIMEOUT, || async {
                Err(CirrusError::Task("boom".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(store.attribute("pdr", EXPIRE).await.is_none());

        let again = m.lock("pdr", TIMEOUT, || async { Ok(1) }).await.unwrap();
        assert_eq!(again, 1);
    }

    #[tokio::test]
    async fn crashed_holder_expires() {
        let (m, clock, store) = mutex();
        // simulate a holder that never unlocked
        store
            .conditional_put(
                "pdr",
                Item::from([(EXPIRE.to_string(), clock.now_millis() + 1000)]),
                Condition::NotExists,
            )
            .await
            .unwrap();

        assert!(m.lock("pdr", TIMEOUT, || async { Ok(()) }).await.is_err());
        clock.advance(Duration::from_millis(1001));
        assert!(m.lock("pdr", TIMEOUT, || async { Ok(()) }).await.is_ok());
    }
}
