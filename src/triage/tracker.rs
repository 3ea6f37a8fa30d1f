//! Retry policy and usage tracking for segment analysis.
//!
//! This module provides:
//! - `RetryPolicy` - exponential backoff configuration
//! - `UsageTracker` - aggregate metrics across a job's segments
//! - `SegmentUsage` - per-segment usage information
//!
//! # Retry Strategy
//!
//! - Up to `max_retries` retries after the first attempt (default: 3)
//! - Exponential backoff: base -> 2x -> 4x, capped at `max_delay`
//! - Respects service-provided retry-after hints, under the same cap

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (default: 3)
    pub max_retries: u32,
    /// Delay before the first retry (default: 2s)
    pub base_delay: Duration,
    /// Backoff multiplier (default: 2.0)
    pub backoff_multiplier: f64,
    /// Maximum delay between attempts (default: 60s)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default multiplier and cap.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Override the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff before retry number `retry` (0-indexed).
    ///
    /// delay = base * multiplier ^ retry, capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    /// Delay before retry number `retry`, preferring the service's hint.
    pub fn wait_duration(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for_retry(retry),
        }
    }

    /// Whether another retry is allowed after `retries_done` retries.
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }
}

/// Usage information for a single segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentUsage {
    pub segment_number: usize,
    /// Tokens charged against the rate budget (all attempts)
    pub tokens: usize,
    /// Wall time spent on this segment, waits included
    pub duration: Duration,
    /// Time spent waiting for rate budget
    pub rate_wait: Duration,
    pub success: bool,
    /// Number of service calls made
    pub attempts: u32,
}

/// Summary report of a job's usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub segments_processed: usize,
    pub successful_segments: usize,
    pub failed_segments: usize,
    /// Tokens charged against the rate budget
    pub total_tokens: usize,
    /// Retries across all segments
    pub total_retries: u32,
    /// Time spent waiting for rate budget, summed over segments
    pub rate_limit_wait: Duration,
    /// Wall time since tracking started
    pub total_duration: Duration,
    /// Success rate (0.0 - 1.0)
    pub success_rate: f64,
}

/// Tracks token usage and per-segment outcomes.
#[derive(Debug)]
pub struct UsageTracker {
    segments: Vec<SegmentUsage>,
    start_time: Instant,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Record usage for a segment.
    pub fn record(&mut self, usage: SegmentUsage) {
        self.segments.push(usage);
    }

    /// Usage for a specific segment.
    pub fn get(&self, segment_number: usize) -> Option<&SegmentUsage> {
        self.segments
            .iter()
            .find(|u| u.segment_number == segment_number)
    }

    /// All recorded usages, in recording order.
    pub fn all(&self) -> &[SegmentUsage] {
        &self.segments
    }

    /// Time since tracking started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Generate a usage summary.
    pub fn summary(&self) -> UsageSummary {
        let segments_processed = self.segments.len();
        let successful_segments = self.segments.iter().filter(|u| u.success).count();

        let success_rate = if segments_processed > 0 {
            successful_segments as f64 / segments_processed as f64
        } else {
            0.0
        };

        UsageSummary {
            segments_processed,
            successful_segments,
            failed_segments: segments_processed - successful_segments,
            total_tokens: self.segments.iter().map(|u| u.tokens).sum(),
            // First attempt isn't a retry
            total_retries: self
                .segments
                .iter()
                .map(|u| u.attempts.saturating_sub(1))
                .sum(),
            rate_limit_wait: self.segments.iter().map(|u| u.rate_wait).sum(),
            total_duration: self.elapsed(),
            success_rate,
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageSummary {
    /// Format the summary for terminal display.
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str("\nAnalysis Summary:\n");
        output.push_str(&format!(
            "   Segments processed: {}\n",
            self.segments_processed
        ));
        output.push_str(&format!(
            "   Tokens sent: ~{}\n",
            format_number(self.total_tokens)
        ));
        output.push_str(&format!(
            "   Total duration: {}\n",
            format_duration(self.total_duration)
        ));
        output.push_str(&format!(
            "   Success rate: {:.0}%\n",
            self.success_rate * 100.0
        ));

        if self.total_retries > 0 {
            output.push_str(&format!("   Retries: {}\n", self.total_retries));
        }
        if !self.rate_limit_wait.is_zero() {
            output.push_str(&format!(
                "   Rate limit wait: {}\n",
                format_duration(self.rate_limit_wait)
            ));
        }

        output
    }
}

/// Format a number with comma separators.
pub(crate) fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a duration for display.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
