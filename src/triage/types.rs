//! Data structures shared across the triage pipeline.
//!
//! A job flows through these types in order: the segmenter produces
//! [`Segment`]s, the orchestrator wraps them in an [`AnalysisJob`] and fills in
//! one [`SegmentResult`] per segment, and the synthesizer reads the terminal job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::backend::{AnalysisRequest, ErrorKind};

/// Kind of log being triaged.
///
/// Selects the natural break patterns used by the segmenter and the wording of
/// the analysis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Application Not Responding trace dump
    Anr,
    /// Native crash tombstone
    Tombstone,
    /// Anything else
    #[default]
    Unknown,
}

impl LogKind {
    /// All supported kinds.
    pub fn all() -> &'static [LogKind] {
        &[LogKind::Anr, LogKind::Tombstone, LogKind::Unknown]
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Anr => "anr",
            LogKind::Tombstone => "tombstone",
            LogKind::Unknown => "unknown",
        }
    }

    /// Human-readable description used in prompts and reports.
    pub fn description(&self) -> &'static str {
        match self {
            LogKind::Anr => "Android ANR trace",
            LogKind::Tombstone => "native crash tombstone",
            LogKind::Unknown => "crash log",
        }
    }

    /// Guess the kind from a file name.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("tombstone") {
            LogKind::Tombstone
        } else if lower.contains("anr") || lower.contains("traces") {
            LogKind::Anr
        } else {
            LogKind::Unknown
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anr" => Ok(LogKind::Anr),
            "tombstone" => Ok(LogKind::Tombstone),
            "unknown" | "other" => Ok(LogKind::Unknown),
            other => Err(format!(
                "unknown log kind '{}' (expected anr, tombstone or unknown)",
                other
            )),
        }
    }
}

/// Model selection and generation parameters for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier passed to the analysis service
    pub name: String,
    /// Upper bound on generated tokens per call
    pub max_output_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a service request for this model.
    pub fn to_request(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> AnalysisRequest {
        AnalysisRequest {
            model: self.name.clone(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_output_tokens: 2_000,
            temperature: 0.3,
        }
    }
}

/// Which kind of natural boundary ended a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Process or thread dump separator
    Process,
    /// Block separator inside a dump
    Block,
    /// Stack trace header
    StackTrace,
    /// Blank line
    BlankLine,
    /// No natural boundary found; cut at the character budget
    Naive,
    /// Final segment, ends at end of text
    EndOfText,
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundaryKind::Process => "process",
            BoundaryKind::Block => "block",
            BoundaryKind::StackTrace => "stack",
            BoundaryKind::BlankLine => "blank",
            BoundaryKind::Naive => "naive",
            BoundaryKind::EndOfText => "eof",
        };
        f.pad(name)
    }
}

/// A bounded slice of the original text plus leading context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Text of `[start, end)` in the original input
    pub content: String,
    /// Up to `overlap_chars` characters immediately preceding `start`
    pub context_prefix: String,
    /// Byte offset of the first character (always on a char boundary)
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// 1-based position in the job
    pub segment_number: usize,
    /// Number of segments in the job
    pub total_segments: usize,
    /// Estimated tokens for `content`
    pub estimated_tokens: usize,
    /// Whether more segments follow this one
    pub has_more: bool,
    /// Boundary the segment ended on
    pub boundary: BoundaryKind,
}

impl Segment {
    /// Length of the content in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Outcome of analyzing one segment. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub segment_number: usize,
    /// Service output on success, error description on failure
    pub text: String,
    pub success: bool,
    pub error: Option<ErrorKind>,
    /// Tokens charged against the rate budget across all attempts
    pub tokens_used: usize,
    /// Number of retries after the first attempt
    pub retry_count: u32,
}

impl SegmentResult {
    /// Record a successful analysis.
    pub fn success(
        segment_number: usize,
        text: String,
        tokens_used: usize,
        retry_count: u32,
    ) -> Self {
        Self {
            segment_number,
            text,
            success: true,
            error: None,
            tokens_used,
            retry_count,
        }
    }

    /// Record a permanent failure.
    pub fn failure(
        segment_number: usize,
        error: ErrorKind,
        message: impl Into<String>,
        tokens_used: usize,
        retry_count: u32,
    ) -> Self {
        Self {
            segment_number,
            text: message.into(),
            success: false,
            error: Some(error),
            tokens_used,
            retry_count,
        }
    }

    /// Record a segment that was never completed because the job stopped.
    pub fn cancelled(segment_number: usize) -> Self {
        Self::failure(segment_number, ErrorKind::Cancelled, "not analyzed", 0, 0)
    }
}

/// Lifecycle state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Not yet run to completion
    #[default]
    Pending,
    /// At least one segment succeeded and at least one failed
    PartialSuccess,
    /// Every segment succeeded
    Success,
    /// No segment succeeded
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::PartialSuccess => "partial success",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A segmented analysis job.
///
/// Mutated only by the orchestrator. Terminal once every segment has a
/// result and [`AnalysisJob::finalize`] has run.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub job_id: String,
    pub kind: LogKind,
    pub segments: Vec<Segment>,
    pub model_config: ModelConfig,
    /// Results ordered by `segment_number`
    pub results: Vec<SegmentResult>,
    pub status: JobStatus,
}

impl AnalysisJob {
    /// Create a pending job with a fresh id.
    pub fn new(kind: LogKind, segments: Vec<Segment>, model_config: ModelConfig) -> Self {
        Self::with_id(new_job_id(), kind, segments, model_config)
    }

    /// Create a pending job with a caller-chosen id.
    pub fn with_id(
        job_id: impl Into<String>,
        kind: LogKind,
        segments: Vec<Segment>,
        model_config: ModelConfig,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            segments,
            model_config,
            results: Vec::new(),
            status: JobStatus::Pending,
        }
    }

    /// Sort results into segment order and derive the terminal status.
    pub fn finalize(&mut self) {
        self.results.sort_by_key(|r| r.segment_number);
        let succeeded = self.successful().count();
        self.status = if succeeded == 0 {
            JobStatus::Failed
        } else if succeeded == self.segments.len() && succeeded == self.results.len() {
            JobStatus::Success
        } else {
            JobStatus::PartialSuccess
        };
    }

    /// Successful results in segment order.
    pub fn successful(&self) -> impl Iterator<Item = &SegmentResult> {
        self.results.iter().filter(|r| r.success)
    }

    /// Failed results in segment order.
    pub fn failed(&self) -> impl Iterator<Item = &SegmentResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Total tokens charged across all results.
    pub fn tokens_used(&self) -> usize {
        self.results.iter().map(|r| r.tokens_used).sum()
    }
}

/// Generate a new job id.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
