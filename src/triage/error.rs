//! User-facing errors for triage jobs.
//!
//! Segment-level failures never surface here; they are recorded on the job's
//! `SegmentResult`s. `TriageError` covers the cases where no report can be
//! produced at all, or where the caller asked for something that does not
//! exist.

use std::fmt;

use super::backend::ErrorKind;

/// Error type for job-level triage operations.
///
/// All variants carry messages suitable for CLI output.
#[derive(Debug)]
pub enum TriageError {
    /// Nothing to analyze.
    NoContent,

    /// The analysis service cannot be reached at all.
    ServiceUnavailable {
        /// Service name or command
        service: String,
    },

    /// Every segment failed.
    AllSegmentsFailed {
        total_segments: usize,
        /// (segment number, kind) of each failure
        errors: Vec<(usize, ErrorKind)>,
    },

    /// The job was aborted by cancellation or a fatal service error.
    Aborted { reason: String },

    /// The per-request limit leaves no room for log content once the prompt,
    /// context and prior findings are accounted for.
    RequestBudgetTooSmall {
        max_tokens_per_request: usize,
        overhead_tokens: usize,
    },

    /// No job with this id is known (expired, evicted or never submitted).
    UnknownJob { job_id: String },

    /// IO error reading input.
    Io {
        operation: String,
        message: String,
    },
}

impl fmt::Display for TriageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriageError::NoContent => {
                write!(f, "No content to analyze. The log is empty.")
            }
            TriageError::ServiceUnavailable { service } => {
                write!(
                    f,
                    "Analysis service '{}' is not available. \
                     Check the [service] section of the configuration.",
                    service
                )
            }
            TriageError::AllSegmentsFailed {
                total_segments,
                errors,
            } => {
                writeln!(f, "All {} segments failed to analyze.", total_segments)?;
                for (segment, kind) in errors.iter().take(5) {
                    writeln!(f, "  - Segment {}: {}", segment, kind)?;
                }
                if errors.len() > 5 {
                    write!(f, "  ... and {} more errors", errors.len() - 5)?;
                }
                Ok(())
            }
            TriageError::Aborted { reason } => write!(f, "Analysis aborted: {}", reason),
            TriageError::RequestBudgetTooSmall {
                max_tokens_per_request,
                overhead_tokens,
            } => write!(
                f,
                "The per-request limit of {} tokens leaves no room for log content \
                 (prompt, context and prior findings need up to {} tokens). \
                 Raise max_tokens_per_request or lower overlap_chars and prior_findings_chars.",
                max_tokens_per_request, overhead_tokens
            ),
            TriageError::UnknownJob { job_id } => {
                write!(f, "No report for job '{}'. It may have expired.", job_id)
            }
            TriageError::Io { operation, message } => {
                write!(f, "IO error during {}: {}", operation, message)
            }
        }
    }
}

impl std::error::Error for TriageError {}

impl TriageError {
    /// Create an IO error with operation context.
    pub fn io(operation: impl Into<String>, error: &std::io::Error) -> Self {
        TriageError::Io {
            operation: operation.into(),
            message: error.to_string(),
        }
    }

    /// Whether a retry later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TriageError::AllSegmentsFailed { errors, .. } => {
                errors.iter().any(|(_, kind)| kind.is_retryable())
            }
            TriageError::ServiceUnavailable { .. } | TriageError::Io { .. } => true,
            TriageError::NoContent
            | TriageError::Aborted { .. }
            | TriageError::RequestBudgetTooSmall { .. }
            | TriageError::UnknownJob { .. } => false,
        }
    }
}
