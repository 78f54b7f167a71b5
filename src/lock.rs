//! Keyed mutual exclusion for in-process hot paths.
//!
//! One lazily-created async mutex per resource key (`"coupon:42"`,
//! `"product:7"`). Serializes every operation sharing a key inside this
//! process, with a bounded wait. Cross-process correctness still comes from
//! the store's conditional writes - this layer only cuts conflict churn on
//! multi-step check-then-act sequences.
//!
//! Locks are never evicted from the registry. A long-running instance that
//! touches many distinct keys grows the map without bound; `lock_count`
//! exposes the growth for monitoring.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::MartError;

/// Keyed lock registry.
///
/// The get-or-create on the underlying map is atomic, so two callers racing
/// on a fresh key always observe the same mutex.
pub struct LockManager {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl LockManager {
    /// Create a registry whose acquisitions wait at most `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Run `action` while holding the lock for `key`, waiting at most the
    /// configured default timeout.
    pub async fn with_lock<T, F, Fut>(&self, key: &str, action: F) -> Result<T, MartError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MartError>>,
    {
        self.with_lock_timeout(key, self.timeout, action).await
    }

    /// Run `action` while holding the lock for `key`.
    ///
    /// Blocks until acquisition or `timeout` elapses; on timeout, fails with
    /// [`MartError::LockTimeout`] naming the key. The guard is released on
    /// every exit path before the outcome propagates.
    pub async fn with_lock_timeout<T, F, Fut>(
        &self,
        key: &str,
        timeout: Duration,
        action: F,
    ) -> Result<T, MartError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MartError>>,
    {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match tokio::time::timeout(timeout, lock.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(key, timeout_ms = timeout.as_millis() as u64, "lock wait timed out");
                return Err(MartError::LockTimeout {
                    key: key.to_string(),
                });
            }
        };

        let result = action().await;
        drop(guard);
        result
    }

    /// Number of keys currently registered (monitoring).
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Drop every registered lock. Test hook.
    pub fn clear(&self) {
        self.locks.clear();
    }
}
