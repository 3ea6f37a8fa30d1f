//! Analysis service boundary.
//!
//! The remote large-text analysis service is an external collaborator. This
//! module defines the `AnalysisService` trait the orchestrator talks to, the
//! error taxonomy it must map its failures onto, and helpers for classifying
//! free-form failure output into that taxonomy.
//!
//! # Design
//!
//! Services are stateless from the orchestrator's point of view and are shared
//! across the segment workers, so implementors must be `Send + Sync`.

mod command;

pub use command::CommandService;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for analysis service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A single request to the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Model identifier understood by the service
    pub model: String,
    /// System prompt (role and output format)
    pub system_prompt: String,
    /// User prompt (the log content and context)
    pub user_prompt: String,
    /// Upper bound on generated tokens
    pub max_output_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
}

/// Trait for analysis services (Strategy pattern).
///
/// Implementors must be thread-safe as they are invoked concurrently
/// from the orchestrator's worker pool.
pub trait AnalysisService: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Check whether the service can be reached at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Run one analysis request and return the generated text.
    fn analyze(&self, request: &AnalysisRequest) -> ServiceResult<String>;
}

/// Classification of a failed analysis call.
///
/// Recorded on failed segment results; `Cancelled` marks segments that were
/// never completed because the job was cancelled or aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    AuthError,
    BadRequest,
    Timeout,
    Unknown,
    Cancelled,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::Unknown
        )
    }

    /// Whether a failure of this kind means no further call can succeed.
    pub fn is_fatal_for_job(&self) -> bool {
        matches!(self, ErrorKind::AuthError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::RateLimited => write!(f, "rate limited"),
            ErrorKind::AuthError => write!(f, "authentication failed"),
            ErrorKind::BadRequest => write!(f, "bad request"),
            ErrorKind::Timeout => write!(f, "timed out"),
            ErrorKind::Unknown => write!(f, "unknown error"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors from analysis services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Rate limited (429): {0}")]
    RateLimited(RateLimitInfo),

    #[error("Authentication failed: {}", truncate_message(.0))]
    Auth(String),

    #[error("Bad request: {}", truncate_message(.0))]
    BadRequest(String),

    #[error("Service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Service timed out: {}", truncate_message(.0))]
    RemoteTimeout(String),

    #[error("Service failed: {}", truncate_message(.0))]
    Unknown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rate limit information extracted from a service response.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitInfo {
    /// When the rate limit resets (if the service said so)
    pub retry_after: Option<Duration>,
    /// Human-readable message
    pub message: String,
}

impl RateLimitInfo {
    /// Rate limit without a retry hint.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            retry_after: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(retry_after) = self.retry_after {
            write!(f, "{} (retry after {:?})", self.message, retry_after)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl ServiceError {
    /// Map this error onto the job-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::RateLimited(_) => ErrorKind::RateLimited,
            ServiceError::Auth(_) => ErrorKind::AuthError,
            ServiceError::BadRequest(_) => ErrorKind::BadRequest,
            ServiceError::Timeout(_) | ServiceError::RemoteTimeout(_) => ErrorKind::Timeout,
            ServiceError::Unknown(_) | ServiceError::Io(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the orchestrator should retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Service-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::RateLimited(info) => info.retry_after,
            _ => None,
        }
    }
}

/// Classify failure output (stderr or an error body) into a `ServiceError`.
///
/// Rate limits are checked first because 429 bodies often also mention the
/// request. Anything unrecognised is `Unknown`, which is retried up to the cap.
pub fn classify_failure(output: &str) -> ServiceError {
    if let Some(info) = parse_rate_limit_info(output) {
        return ServiceError::RateLimited(info);
    }

    let lower = output.to_lowercase();
    let message = first_line(output);

    let is_auth = has_status_code(&lower, "401")
        || has_status_code(&lower, "403")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("invalid api key")
        || lower.contains("authentication");
    if is_auth {
        return ServiceError::Auth(message);
    }

    let is_bad_request = has_status_code(&lower, "400")
        || lower.contains("bad request")
        || lower.contains("invalid request")
        || lower.contains("context length")
        || lower.contains("too long");
    if is_bad_request {
        return ServiceError::BadRequest(message);
    }

    let is_timeout = lower.contains("timed out") || lower.contains("timeout");
    if is_timeout {
        return ServiceError::RemoteTimeout(message);
    }

    ServiceError::Unknown(message)
}

/// Parse rate limit information from failure output.
///
/// Returns `None` if the output does not look like a rate limit.
pub fn parse_rate_limit_info(output: &str) -> Option<RateLimitInfo> {
    let lower = output.to_lowercase();

    let is_rate_limited = lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("throttled")
        || lower.contains("resource_exhausted")
        || has_status_code(&lower, "429")
        || lower.contains("too many requests")
        || lower.contains("quota exceeded");

    if !is_rate_limited {
        return None;
    }

    Some(RateLimitInfo {
        retry_after: extract_retry_seconds(&lower).map(Duration::from_secs),
        message: first_line(output),
    })
}

/// Whether `code` appears as a standalone number, not inside a longer one
/// such as a byte count or pid.
fn has_status_code(text: &str, code: &str) -> bool {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    text.match_indices(code).any(|(pos, _)| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + code.len()..].chars().next();
        !is_word(before) && !is_word(after)
    })
}

/// Extract a retry delay in seconds from common phrasings.
fn extract_retry_seconds(lower: &str) -> Option<u64> {
    let extract_after = |keyword: &str| -> Option<u64> {
        lower
            .find(keyword)
            .and_then(|pos| extract_first_number(&lower[pos + keyword.len()..]))
    };

    ["retry after ", "retry-after", "retry_after", "retry in ", "wait "]
        .iter()
        .find_map(|keyword| extract_after(keyword))
}

/// Extract the first number from a string, skipping leading separators.
fn extract_first_number(s: &str) -> Option<u64> {
    let digits: String = s
        .trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '=')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn first_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string()
}

/// Limit a message to 200 characters for display.
fn truncate_message(message: &str) -> String {
    if message.chars().count() <= 200 {
        message.to_string()
    } else {
        let truncated: String = message.chars().take(200).collect();
        format!("{}...", truncated)
    }
}

/// Check if a command is available in PATH.
pub fn command_exists(command: &str) -> bool {
    #[cfg(windows)]
    let lookup_cmd = "where";
    #[cfg(not(windows))]
    let lookup_cmd = "which";

    std::process::Command::new(lookup_cmd)
        .arg(command)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
