//! Merging per-segment results into one report.
//!
//! Two modes:
//! - `Heuristic` extracts keyword sentences from each successful segment
//!   locally, with no further service call
//! - `Model` sends only those per-segment summaries to the service and asks
//!   for a structured report, falling back to `Heuristic` if that call fails
//!
//! A job with no successful segment skips synthesis and yields an explicit
//! failure report. Partially successful jobs always carry a note saying how
//! many segments could not be analyzed and why.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::{AnalysisService, ErrorKind};
use super::cancel::CancellationToken;
use super::error::TriageError;
use super::estimator::TokenEstimator;
use super::extractor::KeywordExtractor;
use super::limiter::RateLimiter;
use super::prompt::{build_synthesis_prompt, system_prompt};
use super::tracker::UsageSummary;
use super::types::{AnalysisJob, JobStatus, LogKind};

/// How per-segment results are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Local keyword extraction only
    #[default]
    Heuristic,
    /// One extra service call over the extracted summaries
    Model,
}

impl fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisMode::Heuristic => write!(f, "heuristic"),
            SynthesisMode::Model => write!(f, "model"),
        }
    }
}

impl FromStr for SynthesisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(SynthesisMode::Heuristic),
            "model" | "model-assisted" => Ok(SynthesisMode::Model),
            other => Err(format!(
                "unknown synthesis mode '{}' (expected heuristic or model)",
                other
            )),
        }
    }
}

/// A segment that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSegment {
    pub segment_number: usize,
    pub error: ErrorKind,
}

/// Final triage report for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub job_id: String,
    pub kind: LogKind,
    pub title: String,
    pub body: String,
    /// Mode that actually produced `body`
    pub mode: SynthesisMode,
    pub status: JobStatus,
    pub total_segments: usize,
    pub failed_segments: Vec<FailedSegment>,
    /// "N of M segments could not be analyzed" disclosure, when any failed
    pub failure_note: Option<String>,
    /// Why model-assisted synthesis fell back to heuristic mode
    pub fallback_reason: Option<String>,
    pub usage: Option<UsageSummary>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Attach a usage summary.
    pub fn with_usage(mut self, usage: UsageSummary) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Whether the job produced any analysis.
    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.title)?;
        writeln!(f)?;
        writeln!(
            f,
            "Job {} | status: {} | {} segment{} | {} synthesis | {}",
            self.job_id,
            self.status,
            self.total_segments,
            if self.total_segments == 1 { "" } else { "s" },
            self.mode,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f)?;
        writeln!(f, "{}", self.body.trim_end())?;
        if let Some(reason) = &self.fallback_reason {
            writeln!(f)?;
            writeln!(f, "> Model-assisted synthesis unavailable: {}", reason)?;
        }
        if let Some(note) = &self.failure_note {
            writeln!(f)?;
            writeln!(f, "> Note: {}", note)?;
        }
        Ok(())
    }
}

/// Builds reports from terminal jobs.
pub struct ResultSynthesizer {
    mode: SynthesisMode,
    extractor: KeywordExtractor,
    service: Option<Arc<dyn AnalysisService>>,
    limiter: Option<Arc<RateLimiter>>,
    estimator: TokenEstimator,
    summary_chars: usize,
}

impl ResultSynthesizer {
    /// Heuristic-only synthesizer.
    pub fn heuristic(extractor: KeywordExtractor) -> Self {
        Self {
            mode: SynthesisMode::Heuristic,
            extractor,
            service: None,
            limiter: None,
            estimator: TokenEstimator::default(),
            summary_chars: 600,
        }
    }

    /// Model-assisted synthesizer.
    ///
    /// The extra call is charged against `limiter` like any segment call.
    pub fn model_assisted(
        extractor: KeywordExtractor,
        service: Arc<dyn AnalysisService>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            mode: SynthesisMode::Model,
            service: Some(service),
            limiter: Some(limiter),
            ..Self::heuristic(extractor)
        }
    }

    /// Cap each segment's summary at `chars` characters.
    pub fn with_summary_chars(mut self, chars: usize) -> Self {
        self.summary_chars = chars;
        self
    }

    pub fn mode(&self) -> SynthesisMode {
        self.mode
    }

    /// Build the report for a terminal job.
    pub fn synthesize(&self, job: &AnalysisJob) -> Report {
        self.synthesize_with_cancel(job, &CancellationToken::new())
    }

    /// Build the report, abandoning a model-assisted call on cancellation.
    pub fn synthesize_with_cancel(&self, job: &AnalysisJob, cancel: &CancellationToken) -> Report {
        let failed_segments: Vec<FailedSegment> = job
            .failed()
            .map(|r| FailedSegment {
                segment_number: r.segment_number,
                error: r.error.unwrap_or(ErrorKind::Unknown),
            })
            .collect();
        let total_segments = job.segments.len().max(job.results.len());

        let mut report = Report {
            job_id: job.job_id.clone(),
            kind: job.kind,
            title: format!("Triage report: {}", job.kind.description()),
            body: String::new(),
            mode: SynthesisMode::Heuristic,
            status: job.status,
            total_segments,
            failed_segments,
            failure_note: None,
            fallback_reason: None,
            usage: None,
            generated_at: Utc::now(),
        };

        if job.status == JobStatus::Failed || job.successful().next().is_none() {
            let errors = report
                .failed_segments
                .iter()
                .map(|f| (f.segment_number, f.error))
                .collect();
            report.body = if total_segments == 0 {
                TriageError::NoContent.to_string()
            } else {
                TriageError::AllSegmentsFailed {
                    total_segments,
                    errors,
                }
                .to_string()
            };
            report.status = JobStatus::Failed;
            return report;
        }

        if !report.failed_segments.is_empty() {
            report.failure_note = Some(failure_note(&report.failed_segments, total_segments));
        }

        match self.mode {
            SynthesisMode::Heuristic => {
                report.body = self.heuristic_body(job);
            }
            SynthesisMode::Model => {
                let note = report.failure_note.as_deref();
                match self.model_body(job, note, cancel) {
                    Ok(body) => {
                        report.body = body;
                        report.mode = SynthesisMode::Model;
                    }
                    Err(reason) => {
                        warn!(
                            job_id = %job.job_id,
                            %reason,
                            "model-assisted synthesis failed, using heuristic"
                        );
                        report.body = self.heuristic_body(job);
                        report.fallback_reason = Some(reason);
                    }
                }
            }
        }

        report
    }

    /// Keyword sentences per successful segment, labelled by segment.
    fn heuristic_body(&self, job: &AnalysisJob) -> String {
        let total = job.segments.len().max(job.results.len());
        let mut body = String::new();
        for result in job.successful() {
            body.push_str(&format!("## Segment {}/{}\n", result.segment_number, total));
            let sentences = self.extractor.extract(&result.text);
            if sentences.is_empty() {
                body.push_str("- No diagnostic findings.\n");
            }
            for sentence in sentences {
                body.push_str(&format!("- {}\n", sentence));
            }
            body.push('\n');
        }
        body
    }

    /// One service call over the per-segment summaries.
    fn model_body(
        &self,
        job: &AnalysisJob,
        failure_note: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| "no analysis service configured".to_string())?;

        let summaries: Vec<(usize, String)> = job
            .successful()
            .map(|r| {
                (
                    r.segment_number,
                    self.extractor.summarize(&r.text, self.summary_chars),
                )
            })
            .collect();

        let system = system_prompt(job.kind);
        let user = build_synthesis_prompt(job.kind, &summaries, failure_note);
        let tokens = self.estimator.estimate(&system) + self.estimator.estimate(&user);

        if let Some(limiter) = &self.limiter {
            limiter
                .acquire(tokens, cancel)
                .map_err(|_| "cancelled while waiting for rate budget".to_string())?;
        }

        debug!(job_id = %job.job_id, tokens, "requesting model-assisted synthesis");
        let request = job.model_config.to_request(system, user);
        match service.analyze(&request) {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => Err("service returned an empty report".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// "N of M segments could not be analyzed (segment 3: rate limited, ...)".
fn failure_note(failed: &[FailedSegment], total: usize) -> String {
    let reasons: Vec<String> = failed
        .iter()
        .take(10)
        .map(|f| format!("segment {}: {}", f.segment_number, f.error))
        .collect();
    let more = if failed.len() > 10 {
        format!(", and {} more", failed.len() - 10)
    } else {
        String::new()
    };
    format!(
        "{} of {} segments could not be analyzed ({}{})",
        failed.len(),
        total,
        reasons.join(", "),
        more
    )
}
