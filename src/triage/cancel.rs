//! Cooperative cancellation for analysis jobs.
//!
//! Every suspension point in the pipeline (rate-limit wait, retry backoff,
//! inter-batch pause) sleeps through [`CancellationToken::sleep`], which wakes
//! immediately when the token is cancelled. Child tokens are cancelled with
//! their parent, which lets the orchestrator abort a single job without
//! touching the caller's token. A parent only holds weak references to its
//! children, and a child unregisters itself when its last handle is dropped,
//! so a long-lived token does not accumulate finished jobs.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    cancelled: bool,
    children: Vec<Weak<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    wakeup: Condvar,
    parent: Option<Weak<Inner>>,
}

fn lock_state(inner: &Inner) -> MutexGuard<'_, State> {
    inner
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Drop for Inner {
    fn drop(&mut self) {
        let Some(parent) = self.parent.take().and_then(|p| p.upgrade()) else {
            return;
        };
        let me: *const Inner = self;
        let mut state = lock_state(&parent);
        state.children.retain(|child| !std::ptr::eq(child.as_ptr(), me));
    }
}

/// Shared cancellation flag with interruptible sleeps.
///
/// Cloning yields a handle to the same token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.inner)
    }

    /// Create a token that is cancelled whenever this one is.
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken {
            inner: Arc::new(Inner {
                state: Mutex::default(),
                wakeup: Condvar::new(),
                parent: Some(Arc::downgrade(&self.inner)),
            }),
        };
        let mut state = self.lock();
        if state.cancelled {
            drop(state);
            child.cancel();
        } else {
            state.children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Number of live child tokens registered on this token.
    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.lock()
            .children
            .iter()
            .filter(|child| child.strong_count() > 0)
            .count()
    }

    /// Cancel this token and all of its children, waking any sleepers.
    pub fn cancel(&self) {
        let children = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.children)
        };
        self.inner.wakeup.notify_all();
        for inner in children.iter().filter_map(Weak::upgrade) {
            CancellationToken { inner }.cancel();
        }
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the token was
    /// (or already had been) cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let state = self.lock();
        if state.cancelled {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        let (state, _timeout) = self
            .inner
            .wakeup
            .wait_timeout_while(state, duration, |s| !s.cancelled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        !state.cancelled
    }
}
