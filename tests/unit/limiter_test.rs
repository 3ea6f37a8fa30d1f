//! Unit tests for the rolling-window rate limiter

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use logsift::triage::limiter::RATE_WINDOW;
use logsift::triage::{CancellationToken, ManualClock, RateLimiter};

fn frozen_limiter(capacity: usize) -> (Arc<ManualClock>, Arc<RateLimiter>) {
    let clock = Arc::new(ManualClock::new());
    let limiter = Arc::new(RateLimiter::with_clock(capacity, clock.clone()));
    (clock, limiter)
}

#[test]
fn wait_is_rounded_up_to_whole_seconds() {
    let (clock, limiter) = frozen_limiter(1_000);
    limiter.use_tokens(900);
    clock.advance(Duration::from_millis(20_500));

    // 39.5s left in the window
    assert_eq!(limiter.get_wait_time(200), Duration::from_secs(40));
}

#[test]
fn wait_never_exceeds_the_window() {
    let (_, limiter) = frozen_limiter(100);
    limiter.use_tokens(100);
    let wait = limiter.get_wait_time(1);
    assert!(wait > Duration::ZERO);
    assert!(wait <= RATE_WINDOW);
}

#[test]
fn usage_resets_when_the_window_rolls() {
    let (clock, limiter) = frozen_limiter(1_000);
    limiter.use_tokens(1_000);
    clock.advance(RATE_WINDOW);

    assert_eq!(limiter.get_wait_time(1_000), Duration::ZERO);
    assert_eq!(limiter.budget().tokens_used_in_window, 0);
}

#[test]
fn concurrent_acquires_never_oversubscribe_a_window() {
    // Pre-cancelled: any request that would have to wait is refused at once
    let (_, limiter) = frozen_limiter(1_000);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            thread::spawn(move || limiter.acquire(300, &cancel).is_ok())
        })
        .collect();
    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(admitted, 3);
    assert_eq!(limiter.budget().tokens_used_in_window, 900);
}

#[test]
fn acquire_waits_out_a_full_window() {
    // Saturate, then cancel from outside: the waiter must still be blocked
    let limiter = Arc::new(RateLimiter::new(10));
    limiter.use_tokens(10);
    let cancel = CancellationToken::new();

    let waiter = {
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        thread::spawn(move || limiter.acquire(5, &cancel))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    cancel.cancel();
    assert!(waiter.join().unwrap().is_err());
    assert_eq!(limiter.budget().tokens_used_in_window, 10);
}
