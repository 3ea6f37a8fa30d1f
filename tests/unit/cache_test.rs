//! Unit tests for the bounded report cache

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use logsift::triage::{BoundedCache, ManualClock};

const HOUR: Duration = Duration::from_secs(3600);

fn cache_with_clock(max_size: usize) -> (Arc<ManualClock>, BoundedCache<String, String>) {
    let clock = Arc::new(ManualClock::new());
    let cache = BoundedCache::with_clock(max_size, 24 * HOUR, clock.clone());
    (clock, cache)
}

#[test]
fn inserting_past_capacity_evicts_least_recently_used() {
    let (_, cache) = cache_with_clock(3);
    for i in 0..3 {
        cache.set(format!("job-{}", i), format!("report {}", i));
    }
    cache.set("job-3".to_string(), "report 3".to_string());

    assert_eq!(cache.len(), 3);
    assert!(cache.get(&"job-0".to_string()).is_none());
    for i in 1..4 {
        assert_eq!(
            cache.get(&format!("job-{}", i)),
            Some(format!("report {}", i))
        );
    }
}

#[test]
fn reading_an_entry_protects_it_from_eviction() {
    let (_, cache) = cache_with_clock(2);
    cache.set("old".to_string(), "a".to_string());
    cache.set("new".to_string(), "b".to_string());
    assert!(cache.get(&"old".to_string()).is_some());

    cache.set("newest".to_string(), "c".to_string());
    assert!(cache.get(&"old".to_string()).is_some());
    assert!(cache.get(&"new".to_string()).is_none());
}

#[test]
fn entries_expire_after_max_age() {
    let (clock, cache) = cache_with_clock(10);
    cache.set("job".to_string(), "report".to_string());

    clock.advance(24 * HOUR);
    assert!(cache.get(&"job".to_string()).is_some(), "exactly max_age is still fresh");

    clock.advance(Duration::from_secs(1));
    assert!(cache.get(&"job".to_string()).is_none());
    assert!(cache.is_empty());
}

#[test]
fn expired_entries_are_purged_before_evicting_fresh_ones() {
    let (clock, cache) = cache_with_clock(2);
    cache.set("stale".to_string(), "a".to_string());
    clock.advance(12 * HOUR);
    cache.set("fresh".to_string(), "b".to_string());
    clock.advance(13 * HOUR);

    // "stale" is now past max_age and goes first; "fresh" survives
    cache.set("newest".to_string(), "c".to_string());
    assert_eq!(cache.get(&"fresh".to_string()), Some("b".to_string()));
    assert_eq!(cache.get(&"newest".to_string()), Some("c".to_string()));
    assert_eq!(cache.len(), 2);
}

#[test]
fn concurrent_writers_respect_the_bound() {
    let cache = Arc::new(BoundedCache::<String, usize>::new(16, HOUR));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    cache.set(format!("{}-{}", t, i), i);
                    let _ = cache.get(&format!("{}-{}", t, i / 2));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(cache.len() <= 16);
}
