//! Rolling-window token rate limiter.
//!
//! Tracks how many tokens were sent to the analysis service in the current
//! one-minute window. When a request would push usage past the per-minute
//! capacity, callers wait until the window resets.
//!
//! # Window semantics
//!
//! - A window starts at the first evaluation after the previous one expired
//! - Expiry resets usage to zero; usage is never decremented
//! - An empty window always admits a request, even one larger than capacity,
//!   so oversized segments cannot deadlock the pipeline
//! - Wait times are rounded up to whole seconds

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use super::cancel::CancellationToken;
use super::clock::{Clock, SystemClock};

/// Length of the rate window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Token usage within the current rate window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateBudget {
    /// When the current window began
    pub window_start: Instant,
    /// Tokens recorded since `window_start`
    pub tokens_used_in_window: usize,
    /// Tokens allowed per window
    pub capacity_per_minute: usize,
}

impl RateBudget {
    fn new(capacity_per_minute: usize, now: Instant) -> Self {
        Self {
            window_start: now,
            tokens_used_in_window: 0,
            capacity_per_minute,
        }
    }

    /// Reset the window if it has expired.
    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= RATE_WINDOW {
            self.tokens_used_in_window = 0;
            self.window_start = now;
        }
    }

    /// Time to wait before `requested` more tokens fit in the window.
    fn wait_time(&self, requested: usize, now: Instant) -> Duration {
        if self.tokens_used_in_window == 0
            || self.tokens_used_in_window.saturating_add(requested) <= self.capacity_per_minute
        {
            return Duration::ZERO;
        }
        let elapsed = now.saturating_duration_since(self.window_start);
        round_up_to_secs(RATE_WINDOW.saturating_sub(elapsed))
    }
}

fn round_up_to_secs(d: Duration) -> Duration {
    let extra = if d.subsec_nanos() > 0 { 1 } else { 0 };
    Duration::from_secs(d.as_secs() + extra)
}

/// Returned when a wait for budget was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireCancelled;

/// Thread-safe rolling-window rate limiter.
pub struct RateLimiter {
    budget: Mutex<RateBudget>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter using the system clock.
    pub fn new(capacity_per_minute: usize) -> Self {
        Self::with_clock(capacity_per_minute, Arc::new(SystemClock))
    }

    /// Create a limiter with a custom clock (for tests).
    pub fn with_clock(capacity_per_minute: usize, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            budget: Mutex::new(RateBudget::new(capacity_per_minute, now)),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateBudget> {
        self.budget.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// How long to wait before sending `requested_tokens`.
    pub fn get_wait_time(&self, requested_tokens: usize) -> Duration {
        let now = self.clock.now();
        let mut budget = self.lock();
        budget.roll(now);
        budget.wait_time(requested_tokens, now)
    }

    /// Record tokens for a request that is about to be sent.
    ///
    /// Call exactly once per request, after any required wait.
    pub fn use_tokens(&self, tokens: usize) {
        let now = self.clock.now();
        let mut budget = self.lock();
        budget.roll(now);
        budget.tokens_used_in_window = budget.tokens_used_in_window.saturating_add(tokens);
    }

    /// Wait until `requested_tokens` fit, then record them.
    ///
    /// The check and the record happen under one lock acquisition, so two
    /// workers cannot both pass the same check. Returns the total time spent
    /// waiting.
    pub fn acquire(
        &self,
        requested_tokens: usize,
        cancel: &CancellationToken,
    ) -> Result<Duration, AcquireCancelled> {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let now = self.clock.now();
                let mut budget = self.lock();
                budget.roll(now);
                let wait = budget.wait_time(requested_tokens, now);
                if wait.is_zero() {
                    budget.tokens_used_in_window =
                        budget.tokens_used_in_window.saturating_add(requested_tokens);
                    return Ok(waited);
                }
                wait
            };

            debug!(
                requested_tokens,
                wait_secs = wait.as_secs(),
                "rate window full, waiting"
            );
            if !cancel.sleep(wait) {
                return Err(AcquireCancelled);
            }
            waited += wait;
        }
    }

    /// Snapshot of the current window.
    pub fn budget(&self) -> RateBudget {
        let now = self.clock.now();
        let mut budget = self.lock();
        budget.roll(now);
        budget.clone()
    }

    /// Tokens allowed per window.
    pub fn capacity(&self) -> usize {
        self.lock().capacity_per_minute
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("budget", &*self.lock())
            .finish()
    }
}
