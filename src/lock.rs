//! Per-key exclusive locks with a draining shutdown.
//!
//! The job manager uses a [`KeyedLockManager`] to serialise operations on the
//! same job (keys are opaque strings such as job ids). [`acquire`] blocks while
//! another [`LockHandle`] for the key is alive; dropping the handle releases it.
//!
//! [`stop`] refuses new acquisitions and waits, up to a timeout, for every
//! outstanding handle to be released. Waiters are woken by each release rather
//! than polling.
//!
//! [`acquire`]: KeyedLockManager::acquire
//! [`stop`]: KeyedLockManager::stop

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::Span;

use crate::error::LockError;

#[derive(Default)]
struct State {
    running: bool,
    held: HashSet<String>,
}

struct Inner {
    state: Mutex<State>,
    released: Condvar,
    span: Span,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Grants exclusive ownership of string keys. Cloning shares the same set of
/// locks.
#[derive(Clone)]
pub struct KeyedLockManager {
    inner: Arc<Inner>,
}

impl Default for KeyedLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedLockManager {
    /// A stopped manager. Call [`start`](Self::start) before acquiring.
    #[must_use]
    pub fn new() -> Self {
        Self::with_span(Span::none())
    }

    #[must_use]
    pub fn with_span(span: Span) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                released: Condvar::new(),
                span,
            }),
        }
    }

    /// Start granting locks. Also re-opens a stopped manager.
    pub fn start(&self) {
        self.inner.lock().running = true;
        tracing::debug!(parent: &self.inner.span, "lock manager started");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Number of live handles.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.inner.lock().held.len()
    }

    /// Block until `key` is free and take it.
    ///
    /// # Errors
    /// Returns [`LockError::NotRunning`] if the manager is stopped, including
    /// when it is stopped while this call is waiting.
    pub fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        let mut state = self.inner.lock();
        loop {
            if !state.running {
                return Err(LockError::NotRunning);
            }
            if !state.held.contains(key) {
                break;
            }
            state = self
                .inner
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(self.grant(&mut state, key))
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    ///
    /// # Errors
    /// - [`LockError::NotRunning`] if the manager is stopped
    /// - [`LockError::AcquireTimeout`] if the key stayed held for `timeout`
    pub fn acquire_timeout(&self, key: &str, timeout: Duration) -> Result<LockHandle, LockError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock();
        loop {
            if !state.running {
                return Err(LockError::NotRunning);
            }
            if !state.held.contains(key) {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LockError::AcquireTimeout {
                    key: key.to_string(),
                    timeout,
                });
            }
            state = self
                .inner
                .released
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(self.grant(&mut state, key))
    }

    /// Refuse new acquisitions and wait for every outstanding handle to be
    /// released.
    ///
    /// # Errors
    /// Returns [`LockError::StopTimeout`] if handles are still held after
    /// `timeout`. The manager stays stopped.
    pub fn stop(&self, timeout: Duration) -> Result<(), LockError> {
        let mut state = self.inner.lock();
        state.running = false;
        // Wake blocked acquirers so they fail with NotRunning.
        self.inner.released.notify_all();
        let (state, _) = self
            .inner
            .released
            .wait_timeout_while(state, timeout, |s| !s.held.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let outstanding = state.held.len();
        if outstanding > 0 {
            tracing::warn!(parent: &self.inner.span, outstanding, ?timeout, "lock manager stop timed out");
            return Err(LockError::StopTimeout {
                outstanding,
                timeout,
            });
        }
        tracing::debug!(parent: &self.inner.span, "lock manager stopped");
        Ok(())
    }

    fn grant(&self, state: &mut State, key: &str) -> LockHandle {
        state.held.insert(key.to_string());
        tracing::trace!(parent: &self.inner.span, key, "lock acquired");
        LockHandle {
            key: key.to_string(),
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Exclusive ownership of one key. Released exactly once, when dropped.
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle {
    key: String,
    inner: Arc<Inner>,
}

impl LockHandle {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock now. Same as dropping the handle.
    pub fn release(self) {}
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.inner.lock().held.remove(&self.key);
        self.inner.released.notify_all();
        tracing::trace!(parent: &self.inner.span, key = %self.key, "lock released");
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle").field("key", &self.key).finish()
    }
}
