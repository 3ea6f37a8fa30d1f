//! Job submission: the entry point the outer layers call.
//!
//! Text that fits in one request is analyzed synchronously and the report is
//! returned directly. Larger text is segmented and run on a background
//! thread; the caller gets a [`JobHandle`] and can later fetch the terminal
//! report from the shared cache by job id.
//!
//! The rate limiter and cache are explicit instances shared through `Arc`,
//! constructed once by the caller.

use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

use super::backend::AnalysisService;
use super::cache::BoundedCache;
use super::cancel::CancellationToken;
use super::error::TriageError;
use super::estimator::TokenEstimator;
use super::extractor::KeywordExtractor;
use super::limiter::RateLimiter;
use super::orchestrator::{Orchestrator, OrchestratorConfig};
use super::progress::ProgressCallback;
use super::prompt::segment_request_overhead;
use super::segmenter::{needs_segmentation, Segmenter};
use super::synthesis::{Report, ResultSynthesizer, SynthesisMode};
use super::types::{AnalysisJob, BoundaryKind, LogKind, ModelConfig, Segment};

/// Sizing and behavior for submitted jobs.
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Per-request ceiling used to size segments
    pub max_tokens_per_request: usize,
    /// Texts estimated above this are segmented and run in the background
    pub segment_token_limit: usize,
    /// Maximum characters of context carried between segments
    pub overlap_chars: usize,
    pub orchestrator: OrchestratorConfig,
    pub synthesis: SynthesisMode,
    pub extractor: KeywordExtractor,
    /// Per-segment summary length for model-assisted synthesis
    pub summary_chars: usize,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_request: 12_000,
            segment_token_limit: 12_000,
            overlap_chars: 500,
            orchestrator: OrchestratorConfig::default(),
            synthesis: SynthesisMode::Heuristic,
            extractor: KeywordExtractor::default(),
            summary_chars: 600,
        }
    }
}

impl SubmitterConfig {
    /// Tokens a segment request may spend beyond its content, for `kind`.
    pub fn request_overhead(&self, kind: LogKind) -> usize {
        segment_request_overhead(
            &TokenEstimator::default(),
            kind,
            self.overlap_chars,
            self.orchestrator.prior_findings_chars,
        )
    }

    /// Content budget per segment, so that content plus overhead stays within
    /// `max_tokens_per_request`.
    pub fn content_token_budget(&self, kind: LogKind) -> Result<usize, TriageError> {
        let overhead = self.request_overhead(kind);
        match self.max_tokens_per_request.checked_sub(overhead) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => Err(TriageError::RequestBudgetTooSmall {
                max_tokens_per_request: self.max_tokens_per_request,
                overhead_tokens: overhead,
            }),
        }
    }
}

/// Outcome of [`JobSubmitter::submit`].
pub enum Submission {
    /// Small input, analyzed inline
    Completed(Report),
    /// Segmented input running in the background
    Pending(JobHandle),
}

impl Submission {
    /// Id of the submitted job.
    pub fn job_id(&self) -> &str {
        match self {
            Submission::Completed(report) => &report.job_id,
            Submission::Pending(handle) => handle.job_id(),
        }
    }
}

/// Handle to a background job.
pub struct JobHandle {
    job_id: String,
    total_segments: usize,
    cancel: CancellationToken,
    thread: JoinHandle<Report>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    /// Ask the job to stop; unfinished segments are recorded as cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the job finishes and return its report.
    pub fn wait(self) -> Result<Report, TriageError> {
        self.thread.join().map_err(|_| TriageError::Aborted {
            reason: format!("job {} panicked", self.job_id),
        })
    }
}

/// Accepts text, runs the pipeline, and stores reports by job id.
pub struct JobSubmitter {
    service: Arc<dyn AnalysisService>,
    limiter: Arc<RateLimiter>,
    cache: Arc<BoundedCache<String, Report>>,
    config: SubmitterConfig,
    estimator: TokenEstimator,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl JobSubmitter {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        limiter: Arc<RateLimiter>,
        cache: Arc<BoundedCache<String, Report>>,
        config: SubmitterConfig,
    ) -> Self {
        Self {
            service,
            limiter,
            cache,
            config,
            estimator: TokenEstimator::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Fire `callback` after each completed segment of every job.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Cancel every job started by this submitter when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// Submit text for analysis.
    ///
    /// Returns a completed report for small inputs, or a handle to a background
    /// job whose report becomes available through [`JobSubmitter::report`].
    pub fn submit(
        &self,
        text: &str,
        kind: LogKind,
        model: ModelConfig,
    ) -> Result<Submission, TriageError> {
        self.check_ready(text)?;
        let budget = self.config.content_token_budget(kind)?;

        if !self.needs_background(text, budget) {
            let job = self.single_segment_job(text, kind, model);
            let report = self.execute(job, &self.cancel.child_token());
            return Ok(Submission::Completed(report));
        }

        let job = self.segmented_job(text, kind, model, budget);
        let job_id = job.job_id.clone();
        let total_segments = job.segments.len();
        let cancel = self.cancel.child_token();

        let runner = self.runner();
        let job_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name(format!("logsift-job-{}", &job_id[..8.min(job_id.len())]))
            .spawn(move || runner.execute(job, &job_cancel))
            .map_err(|e| TriageError::io("starting background job", &e))?;

        info!(job_id = %job_id, segments = total_segments, "job submitted");
        Ok(Submission::Pending(JobHandle {
            job_id,
            total_segments,
            cancel,
            thread,
        }))
    }

    /// Run the full pipeline on the calling thread, segmenting as needed.
    pub fn analyze_blocking(
        &self,
        text: &str,
        kind: LogKind,
        model: ModelConfig,
    ) -> Result<Report, TriageError> {
        self.check_ready(text)?;
        let budget = self.config.content_token_budget(kind)?;
        let job = if self.needs_background(text, budget) {
            self.segmented_job(text, kind, model, budget)
        } else {
            self.single_segment_job(text, kind, model)
        };
        Ok(self.execute(job, &self.cancel.child_token()))
    }

    /// The segments `text` would be dispatched as, without running anything.
    pub fn plan(&self, text: &str, kind: LogKind) -> Result<Vec<Segment>, TriageError> {
        let budget = self.config.content_token_budget(kind)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let job = if self.needs_background(text, budget) {
            self.segmented_job(text, kind, ModelConfig::default(), budget)
        } else {
            self.single_segment_job(text, kind, ModelConfig::default())
        };
        Ok(job.segments)
    }

    /// Run a previously computed [`JobSubmitter::plan`] on the calling thread.
    pub fn analyze_plan(
        &self,
        segments: Vec<Segment>,
        kind: LogKind,
        model: ModelConfig,
    ) -> Result<Report, TriageError> {
        if segments.iter().all(|s| s.content.trim().is_empty()) {
            return Err(TriageError::NoContent);
        }
        self.check_service()?;
        let job = AnalysisJob::new(kind, segments, model);
        Ok(self.execute(job, &self.cancel.child_token()))
    }

    /// Fetch a finished report by job id.
    pub fn report(&self, job_id: &str) -> Result<Report, TriageError> {
        self.cache
            .get(&job_id.to_string())
            .ok_or_else(|| TriageError::UnknownJob {
                job_id: job_id.to_string(),
            })
    }

    /// Cancel every running job.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    fn check_ready(&self, text: &str) -> Result<(), TriageError> {
        if text.trim().is_empty() {
            return Err(TriageError::NoContent);
        }
        self.check_service()
    }

    fn check_service(&self) -> Result<(), TriageError> {
        if !self.service.is_available() {
            return Err(TriageError::ServiceUnavailable {
                service: self.service.name().to_string(),
            });
        }
        Ok(())
    }

    fn needs_background(&self, text: &str, content_budget: usize) -> bool {
        let limit = self.config.segment_token_limit.min(content_budget);
        needs_segmentation(&self.estimator, text, limit)
    }

    fn single_segment_job(&self, text: &str, kind: LogKind, model: ModelConfig) -> AnalysisJob {
        let segment = Segment {
            content: text.to_string(),
            context_prefix: String::new(),
            start: 0,
            end: text.len(),
            segment_number: 1,
            total_segments: 1,
            estimated_tokens: self.estimator.estimate(text),
            has_more: false,
            boundary: BoundaryKind::EndOfText,
        };
        AnalysisJob::new(kind, vec![segment], model)
    }

    fn segmented_job(
        &self,
        text: &str,
        kind: LogKind,
        model: ModelConfig,
        content_budget: usize,
    ) -> AnalysisJob {
        let segments = Segmenter::with_estimator(kind, self.estimator.clone()).segment(
            text,
            content_budget,
            self.config.overlap_chars,
        );
        debug!(
            segments = segments.len(),
            content_budget,
            "segmented input"
        );
        AnalysisJob::new(kind, segments, model)
    }

    fn runner(&self) -> JobRunner {
        let mut orchestrator = Orchestrator::new(
            Arc::clone(&self.service),
            Arc::clone(&self.limiter),
            self.config.orchestrator.clone(),
        )
        .with_extractor(self.config.extractor.clone());
        if let Some(progress) = &self.progress {
            orchestrator = orchestrator.with_progress(Arc::clone(progress));
        }

        let synthesizer = match self.config.synthesis {
            SynthesisMode::Heuristic => ResultSynthesizer::heuristic(self.config.extractor.clone()),
            SynthesisMode::Model => ResultSynthesizer::model_assisted(
                self.config.extractor.clone(),
                Arc::clone(&self.service),
                Arc::clone(&self.limiter),
            ),
        }
        .with_summary_chars(self.config.summary_chars);

        JobRunner {
            orchestrator,
            synthesizer,
            cache: Arc::clone(&self.cache),
        }
    }

    fn execute(&self, job: AnalysisJob, cancel: &CancellationToken) -> Report {
        self.runner().execute(job, cancel)
    }
}

/// Everything a job needs, owned so it can move to a background thread.
struct JobRunner {
    orchestrator: Orchestrator,
    synthesizer: ResultSynthesizer,
    cache: Arc<BoundedCache<String, Report>>,
}

impl JobRunner {
    fn execute(&self, job: AnalysisJob, cancel: &CancellationToken) -> Report {
        let (job, usage) = self.orchestrator.run_with_usage(job, cancel);
        let report = self
            .synthesizer
            .synthesize_with_cancel(&job, cancel)
            .with_usage(usage);
        self.cache.set(job.job_id.clone(), report.clone());
        report
    }
}
