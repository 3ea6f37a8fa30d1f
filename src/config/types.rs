//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

use crate::triage::extractor::DEFAULT_KEYWORDS;
use crate::triage::SynthesisMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub orchestrator: DispatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Token budgets for requests, segments and the per-minute window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Per-request ceiling used to size segments
    #[serde(default = "default_max_tokens_per_request")]
    pub max_tokens_per_request: usize,
    /// Rate limiter capacity
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: usize,
    /// Inputs estimated above this are segmented
    #[serde(default = "default_tokens_per_segment")]
    pub tokens_per_segment: usize,
    /// Characters of context carried into the next segment
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

pub fn default_max_tokens_per_request() -> usize {
    12_000
}

pub fn default_tokens_per_minute() -> usize {
    40_000
}

pub fn default_tokens_per_segment() -> usize {
    12_000
}

pub fn default_overlap_chars() -> usize {
    500
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_request: default_max_tokens_per_request(),
            tokens_per_minute: default_tokens_per_minute(),
            tokens_per_segment: default_tokens_per_segment(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

/// Batch width, retry and context settings for segment dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_parallel_segments")]
    pub parallel_segments: usize,
    /// Backoff base delay in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on any single backoff, in seconds
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,
    #[serde(default = "default_inter_batch_pause_ms")]
    pub inter_batch_pause_ms: u64,
    /// Size of the findings digest handed to later segments
    #[serde(default = "default_prior_findings_chars")]
    pub prior_findings_chars: usize,
}

pub fn default_parallel_segments() -> usize {
    2
}

pub fn default_retry_delay_secs() -> u64 {
    2
}

pub fn default_max_retries() -> u32 {
    3
}

pub fn default_max_retry_delay_secs() -> u64 {
    60
}

pub fn default_inter_batch_pause_ms() -> u64 {
    1000
}

pub fn default_prior_findings_chars() -> usize {
    2000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            parallel_segments: default_parallel_segments(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retries: default_max_retries(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            inter_batch_pause_ms: default_inter_batch_pause_ms(),
            prior_findings_chars: default_prior_findings_chars(),
        }
    }
}

/// Report cache bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_max_age_hours")]
    pub max_age_hours: u64,
}

pub fn default_cache_max_size() -> usize {
    100
}

pub fn default_cache_max_age_hours() -> u64 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            max_age_hours: default_cache_max_age_hours(),
        }
    }
}

/// How per-segment analyses are merged into a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub mode: SynthesisMode,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Neighbouring sentences kept after each keyword match
    #[serde(default)]
    pub context_sentences: usize,
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
    /// Per-segment summary length for model-assisted synthesis
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

pub fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

pub fn default_max_sentences() -> usize {
    5
}

pub fn default_summary_chars() -> usize {
    600
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            mode: SynthesisMode::default(),
            keywords: default_keywords(),
            context_sentences: 0,
            max_sentences: default_max_sentences(),
            summary_chars: default_summary_chars(),
        }
    }
}

/// External command used as the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-call timeout in seconds
    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

pub fn default_service_command() -> String {
    "claude".to_string()
}

pub fn default_service_timeout_secs() -> u64 {
    120
}

pub fn default_model() -> String {
    "default".to_string()
}

pub fn default_max_output_tokens() -> usize {
    2000
}

pub fn default_temperature() -> f32 {
    0.3
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: default_service_command(),
            args: vec!["-p".to_string()],
            timeout_secs: default_service_timeout_secs(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}
