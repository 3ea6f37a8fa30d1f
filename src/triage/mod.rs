//! Segmentation and rate-limited analysis pipeline for crash and ANR logs.
//!
//! Large logs exceed what the remote analysis service accepts in one request
//! and what its per-minute token budget allows in a burst. This module splits
//! the text, dispatches the pieces under that budget, survives partial
//! failures, and reassembles the per-segment analyses into one report.
//!
//! # Data flow
//!
//! raw text -> [`Segmenter`] (consulting [`TokenEstimator`]) -> [`Segment`]s
//! -> [`Orchestrator`] (consulting [`RateLimiter`], calling the
//! [`AnalysisService`]) -> [`SegmentResult`]s -> [`ResultSynthesizer`]
//! -> [`Report`] -> [`BoundedCache`]
//!
//! # Module Structure
//!
//! - [`estimator`] - character-class token estimation
//! - [`segmenter`] - boundary-aware splitting
//! - [`limiter`] - rolling one-minute token budget
//! - [`orchestrator`] - batched dispatch with retries
//! - [`synthesis`] - report assembly
//! - [`cache`] - LRU + TTL report store
//! - [`submit`] - synchronous or background job submission
//! - [`backend`] - service trait, error taxonomy, process-backed service

pub mod backend;
pub mod cache;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod estimator;
pub mod extractor;
pub mod limiter;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod segmenter;
pub mod submit;
pub mod synthesis;
pub mod tracker;
pub mod types;

pub use backend::{
    AnalysisRequest, AnalysisService, CommandService, ErrorKind, RateLimitInfo, ServiceError,
    ServiceResult,
};
pub use cache::BoundedCache;
pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TriageError;
pub use estimator::TokenEstimator;
pub use extractor::KeywordExtractor;
pub use limiter::{RateBudget, RateLimiter};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use progress::{ConsoleProgress, ProgressCallback, ProgressEvent};
pub use segmenter::Segmenter;
pub use submit::{JobHandle, JobSubmitter, Submission, SubmitterConfig};
pub use synthesis::{Report, ResultSynthesizer, SynthesisMode};
pub use tracker::{RetryPolicy, UsageSummary};
pub use types::{
    AnalysisJob, BoundaryKind, JobStatus, LogKind, ModelConfig, Segment, SegmentResult,
};
