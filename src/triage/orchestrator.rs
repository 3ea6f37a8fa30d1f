//! Batched, rate-limited dispatch of segments to the analysis service.
//!
//! # Design
//!
//! - Segments are processed in fixed-size batches on a dedicated rayon pool
//!   sized to the batch width, so at most `parallel_segments` calls are in
//!   flight regardless of job size
//! - Batches run sequentially with a short pause between them
//! - Every attempt acquires rate budget for the full request first; the wait
//!   is cancellable
//! - Retryable failures back off exponentially up to the retry ceiling and
//!   never affect sibling segments
//! - An authentication failure cancels the job; unfinished segments are
//!   recorded as cancelled
//! - Successful segments feed a bounded "prior findings" summary that later
//!   batches receive as context
//!
//! Results are always reassembled in segment order, independent of which
//! worker finished first.

use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::backend::{AnalysisService, ErrorKind};
use super::cancel::CancellationToken;
use super::estimator::TokenEstimator;
use super::extractor::KeywordExtractor;
use super::limiter::RateLimiter;
use super::progress::{ProgressCallback, ProgressEvent};
use super::prompt::{build_segment_prompt, system_prompt};
use super::tracker::{RetryPolicy, SegmentUsage, UsageSummary, UsageTracker};
use super::types::{AnalysisJob, LogKind, ModelConfig, Segment, SegmentResult};

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Batch width and worker count (default: 2)
    pub parallel_segments: usize,
    /// Pause between batches (default: 1s)
    pub inter_batch_pause: Duration,
    /// Backoff and retry ceiling
    pub retry: RetryPolicy,
    /// Maximum length of the rolling prior-findings context, in characters
    pub prior_findings_chars: usize,
    /// Maximum length of each segment's contribution to prior findings
    pub summary_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            parallel_segments: 2,
            inter_batch_pause: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            prior_findings_chars: 2_000,
            summary_chars: 400,
        }
    }
}

/// Per-segment inputs shared by one batch.
struct BatchContext<'a> {
    kind: LogKind,
    model: &'a ModelConfig,
    prior_findings: &'a str,
    cancel: &'a CancellationToken,
}

/// Result and usage for one segment.
struct SegmentOutcome {
    result: SegmentResult,
    usage: SegmentUsage,
}

/// Drives an [`AnalysisJob`] to a terminal state.
pub struct Orchestrator {
    service: Arc<dyn AnalysisService>,
    limiter: Arc<RateLimiter>,
    config: OrchestratorConfig,
    extractor: KeywordExtractor,
    estimator: TokenEstimator,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Create an orchestrator around a shared service and rate limiter.
    pub fn new(
        service: Arc<dyn AnalysisService>,
        limiter: Arc<RateLimiter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            service,
            limiter,
            config,
            extractor: KeywordExtractor::default(),
            estimator: TokenEstimator::default(),
            progress: None,
        }
    }

    /// Use a custom extractor for prior-findings summaries.
    pub fn with_extractor(mut self, extractor: KeywordExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Fire `callback` after each completed segment.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every segment of `job` and return the terminal job.
    pub fn run(&self, job: AnalysisJob, cancel: &CancellationToken) -> AnalysisJob {
        self.run_with_usage(job, cancel).0
    }

    /// Run `job` and also return its usage summary.
    pub fn run_with_usage(
        &self,
        mut job: AnalysisJob,
        cancel: &CancellationToken,
    ) -> (AnalysisJob, UsageSummary) {
        let job_cancel = cancel.child_token();
        let width = self.config.parallel_segments.max(1);
        let total = job.segments.len();
        let mut tracker = UsageTracker::new();
        let mut prior_findings = String::new();
        let mut results = Vec::with_capacity(total);

        info!(
            job_id = %job.job_id,
            segments = total,
            parallel = width,
            service = self.service.name(),
            "starting analysis job"
        );

        let pool = self.build_pool(width, total);

        for (batch_index, batch) in job.segments.chunks(width).enumerate() {
            if batch_index > 0 {
                job_cancel.sleep(self.config.inter_batch_pause);
            }
            if job_cancel.is_cancelled() {
                debug!(batch = batch_index + 1, "job cancelled, skipping batch");
                for segment in batch {
                    let outcome = self.cancelled_outcome(segment);
                    self.report_progress(segment, &outcome.result);
                    tracker.record(outcome.usage);
                    results.push(outcome.result);
                }
                continue;
            }

            debug!(
                batch = batch_index + 1,
                first_segment = batch[0].segment_number,
                size = batch.len(),
                "dispatching batch"
            );

            let ctx = BatchContext {
                kind: job.kind,
                model: &job.model_config,
                prior_findings: &prior_findings,
                cancel: &job_cancel,
            };
            let outcomes: Vec<SegmentOutcome> = match &pool {
                Some(pool) => pool.install(|| {
                    batch
                        .par_iter()
                        .map(|segment| self.process_segment(segment, &ctx))
                        .collect()
                }),
                None => batch
                    .iter()
                    .map(|segment| self.process_segment(segment, &ctx))
                    .collect(),
            };

            // Fold in segment order so the context is deterministic
            for outcome in outcomes {
                if outcome.result.success {
                    let summary = self
                        .extractor
                        .summarize(&outcome.result.text, self.config.summary_chars);
                    fold_findings(
                        &mut prior_findings,
                        outcome.result.segment_number,
                        &summary,
                        self.config.prior_findings_chars,
                    );
                }
                tracker.record(outcome.usage);
                results.push(outcome.result);
            }
        }

        job.results = results;
        job.finalize();

        let usage = tracker.summary();
        info!(
            job_id = %job.job_id,
            status = %job.status,
            succeeded = usage.successful_segments,
            failed = usage.failed_segments,
            retries = usage.total_retries,
            "analysis job finished"
        );
        (job, usage)
    }

    /// Dedicated pool for this job, or `None` to run inline.
    fn build_pool(&self, width: usize, total: usize) -> Option<rayon::ThreadPool> {
        if width <= 1 || total <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("logsift-segment-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "failed to create worker pool, processing sequentially");
                None
            }
        }
    }

    /// Analyze one segment, retrying retryable failures.
    fn process_segment(&self, segment: &Segment, ctx: &BatchContext<'_>) -> SegmentOutcome {
        let started = Instant::now();
        let number = segment.segment_number;
        let request = ctx.model.to_request(
            system_prompt(ctx.kind),
            build_segment_prompt(segment, ctx.kind, ctx.prior_findings),
        );
        // Charge the whole request, not just the segment content
        let charge = self.estimator.estimate(&request.system_prompt)
            + self.estimator.estimate(&request.user_prompt);

        let mut retries = 0u32;
        let mut attempts = 0u32;
        let mut tokens_used = 0usize;
        let mut rate_wait = Duration::ZERO;

        let result = loop {
            if ctx.cancel.is_cancelled() {
                break SegmentResult::failure(
                    number,
                    ErrorKind::Cancelled,
                    "job cancelled",
                    tokens_used,
                    retries,
                );
            }

            match self.limiter.acquire(charge, ctx.cancel) {
                Ok(waited) => rate_wait += waited,
                Err(_) => {
                    break SegmentResult::failure(
                        number,
                        ErrorKind::Cancelled,
                        "job cancelled while waiting for rate budget",
                        tokens_used,
                        retries,
                    )
                }
            }
            tokens_used += charge;
            attempts += 1;

            let error = match self.service.analyze(&request) {
                Ok(text) => break SegmentResult::success(number, text, tokens_used, retries),
                Err(error) => error,
            };

            let kind = error.kind();
            if kind.is_fatal_for_job() {
                warn!(segment = number, error = %error, "fatal service error, aborting job");
                ctx.cancel.cancel();
                break SegmentResult::failure(
                    number,
                    kind,
                    error.to_string(),
                    tokens_used,
                    retries,
                );
            }
            if !kind.is_retryable() {
                warn!(segment = number, error = %error, "segment failed, not retrying");
                break SegmentResult::failure(
                    number,
                    kind,
                    error.to_string(),
                    tokens_used,
                    retries,
                );
            }
            if !self.config.retry.should_retry(retries) {
                warn!(
                    segment = number,
                    retries,
                    error = %error,
                    "retries exhausted"
                );
                break SegmentResult::failure(
                    number,
                    kind,
                    error.to_string(),
                    tokens_used,
                    retries,
                );
            }

            let delay = self.config.retry.wait_duration(retries, error.retry_after());
            debug!(
                segment = number,
                retry = retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying segment"
            );
            if !ctx.cancel.sleep(delay) {
                break SegmentResult::failure(
                    number,
                    ErrorKind::Cancelled,
                    "job cancelled during retry backoff",
                    tokens_used,
                    retries,
                );
            }
            retries += 1;
        };

        self.report_progress(segment, &result);

        SegmentOutcome {
            usage: SegmentUsage {
                segment_number: number,
                tokens: tokens_used,
                duration: started.elapsed(),
                rate_wait,
                success: result.success,
                attempts,
            },
            result,
        }
    }

    fn cancelled_outcome(&self, segment: &Segment) -> SegmentOutcome {
        SegmentOutcome {
            result: SegmentResult::cancelled(segment.segment_number),
            usage: SegmentUsage {
                segment_number: segment.segment_number,
                tokens: 0,
                duration: Duration::ZERO,
                rate_wait: Duration::ZERO,
                success: false,
                attempts: 0,
            },
        }
    }

    fn report_progress(&self, segment: &Segment, result: &SegmentResult) {
        if let Some(callback) = &self.progress {
            callback(&ProgressEvent {
                segment_number: segment.segment_number,
                total_segments: segment.total_segments,
                success: result.success,
                error: result.error,
                retry_count: result.retry_count,
            });
        }
    }
}

/// Append a segment summary to the rolling findings, keeping the newest
/// `max_chars` characters.
fn fold_findings(findings: &mut String, segment_number: usize, summary: &str, max_chars: usize) {
    if summary.trim().is_empty() || max_chars == 0 {
        return;
    }
    findings.push_str(&format!("[Part {}] {}\n", segment_number, summary.trim()));

    let len = findings.chars().count();
    if len > max_chars {
        let cut = findings
            .char_indices()
            .nth(len - max_chars)
            .map(|(i, _)| i)
            .unwrap_or(0);
        findings.drain(..cut);
    }
}
