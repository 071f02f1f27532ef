//! Fetch driver with timeout and unmount guard.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{FetchError, LoadState};

// ---------------------------------------------------------------------------
// PageScope
// ---------------------------------------------------------------------------

/// Liveness flag shared by everything a mounted page starts.
///
/// Cloning shares the flag. Once [`PageScope::close`] runs (or the owning
/// [`ScopeGuard`] is dropped) no late result may be applied.
#[derive(Debug, Clone)]
pub struct PageScope {
    alive: Arc<AtomicBool>,
}

impl Default for PageScope {
    fn default() -> Self {
        Self::new()
    }
}

impl PageScope {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Guard that closes the scope when dropped, on every exit path.
    pub fn guard(&self) -> ScopeGuard {
        ScopeGuard {
            scope: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ScopeGuard {
    scope: PageScope,
}

impl ScopeGuard {
    pub fn scope(&self) -> &PageScope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.close();
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Shared handle over one page's [`LoadState`].
///
/// Cloning shares the state. Concurrent [`Loader::reload`] calls are not
/// deduplicated; whichever resolves last is what the page shows.
pub struct Loader<T> {
    state: Arc<RwLock<LoadState<T>>>,
    scope: PageScope,
    timeout: Duration,
}

impl<T> Clone for Loader<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            scope: self.scope.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Send + Sync> Loader<T> {
    pub fn new(scope: PageScope, timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(LoadState::Pending)),
            scope,
            timeout,
        }
    }

    pub fn scope(&self) -> &PageScope {
        &self.scope
    }

    /// Run one fetch and apply its result.
    ///
    /// Returns `false` when the result was discarded because the page
    /// unmounted while the fetch was in flight.
    pub async fn load<Fut>(&self, fetch: Fut) -> bool
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let result = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(r) => r,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "page fetch timed out");
                Err(FetchError::Timeout)
            }
        };

        let mut st = self.state.write().await;
        // Checked under the lock so close() + read cannot interleave with apply.
        if !self.scope.is_alive() {
            debug!("page unmounted; discarding late fetch result");
            return false;
        }
        if let Err(e) = &result {
            warn!(status = ?e.status(), error = %e, "page fetch failed");
        }
        st.resolve(result);
        true
    }

    /// Re-enter `Pending`, then run `fetch`.
    pub async fn reload<Fut>(&self, fetch: Fut) -> bool
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        {
            let mut st = self.state.write().await;
            if !self.scope.is_alive() {
                return false;
            }
            st.reload();
        }
        self.load(fetch).await
    }

    /// Run `f` against the current state.
    pub async fn with_state<R>(&self, f: impl FnOnce(&LoadState<T>) -> R) -> R {
        let st = self.state.read().await;
        f(&st)
    }
}

impl<T: Clone + Send + Sync> Loader<T> {
    pub async fn snapshot(&self) -> LoadState<T> {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_scope_discards_result() {
        let scope = PageScope::new();
        let loader: Loader<u32> = Loader::new(scope.clone(), Duration::from_secs(1));
        scope.close();
        assert!(!loader.load(async { Ok(5) }).await);
        assert_eq!(loader.snapshot().await, LoadState::Pending);
    }

    #[tokio::test]
    async fn guard_drop_closes_scope() {
        let scope = PageScope::new();
        {
            let _g = scope.guard();
            assert!(scope.is_alive());
        }
        assert!(!scope.is_alive());
    }
}
