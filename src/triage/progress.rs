//! Progress reporting for segment analysis.
//!
//! The orchestrator fires a [`ProgressCallback`] once per completed segment,
//! from whichever worker finished it. [`ConsoleProgress`] is the stderr
//! reporter used by the CLI; it uses atomics so callbacks need no locking.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::backend::ErrorKind;

/// One completed segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub segment_number: usize,
    pub total_segments: usize,
    pub success: bool,
    pub error: Option<ErrorKind>,
    pub retry_count: u32,
}

/// Callback invoked by the orchestrator after each segment.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Progress reporter that writes to stderr.
pub struct ConsoleProgress {
    completed: AtomicUsize,
    failed: AtomicUsize,
    total: usize,
    show_output: bool,
    started: AtomicBool,
}

impl ConsoleProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            total,
            show_output: true,
            started: AtomicBool::new(false),
        }
    }

    /// Create a reporter with output disabled.
    pub fn quiet(total: usize) -> Self {
        Self {
            show_output: false,
            ..Self::new(total)
        }
    }

    /// Report that analysis is starting. Prints only once.
    pub fn start(&self, estimated_tokens: usize) {
        if !self.show_output {
            return;
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            eprintln!(
                "Analyzing log... ({} segment{}, ~{} tokens)",
                self.total,
                if self.total == 1 { "" } else { "s" },
                format_tokens(estimated_tokens)
            );
        }
    }

    /// Record one completed segment.
    pub fn segment_completed(&self, event: &ProgressEvent) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if !event.success {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        if self.show_output {
            eprint!("\r  [{}/{}] Analyzing segments...", completed, self.total);
            let _ = io::stderr().flush();
        }
    }

    /// Clear the progress line and print the outcome.
    pub fn finish(&self) {
        if !self.show_output {
            return;
        }
        eprint!("\r                                                    \r");
        let failed = self.failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("Analyzed {} of {} segments", self.total, self.total);
        } else {
            eprintln!(
                "Analysis partially complete: {} of {} segments could not be analyzed",
                failed, self.total
            );
        }
    }

    /// Current (completed, total).
    pub fn get_progress(&self) -> (usize, usize) {
        (self.completed.load(Ordering::SeqCst), self.total)
    }

    /// Wrap this reporter as an orchestrator callback.
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Arc::new(move |event: &ProgressEvent| reporter.segment_completed(event))
    }
}

/// Format token count for display.
pub(crate) fn format_tokens(tokens: usize) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{}K", tokens / 1_000)
    } else {
        format!("{}", tokens)
    }
}
