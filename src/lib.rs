//! Log Sift Library
//!
//! Splits crash and ANR logs that are too large for one analysis request
//! into boundary-aware segments, dispatches them under a per-minute token
//! budget, and merges the per-segment analyses into one report.

pub mod cli;
pub mod config;
pub mod triage;

pub use config::Config;
pub use triage::{
    AnalysisJob, AnalysisService, JobSubmitter, LogKind, RateLimiter, Report, Segment, Segmenter,
    TokenEstimator,
};
