//! Configuration management for logsift
//!
//! Settings come from `~/.config/logsift/config.toml`, then environment
//! variables override individual values. Missing fields fall back to the
//! `default_*` functions in [`types`].

mod io;
mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::triage::prompt::max_segment_request_overhead;
use crate::triage::{
    BoundedCache, CommandService, KeywordExtractor, ModelConfig, OrchestratorConfig, RateLimiter,
    Report, RetryPolicy, SubmitterConfig, TokenEstimator,
};

/// Per-request ceiling used to size segments
pub const ENV_MAX_TOKENS_PER_REQUEST: &str = "MAX_TOKENS_PER_REQUEST";
/// Rate limiter capacity per minute
pub const ENV_TOKENS_PER_MINUTE: &str = "RATE_LIMIT_TOKENS_PER_MINUTE";
/// Segmentation threshold
pub const ENV_TOKENS_PER_SEGMENT: &str = "RATE_LIMIT_TOKENS_PER_SEGMENT";
pub const ENV_OVERLAP_SIZE: &str = "OVERLAP_SIZE";
pub const ENV_PARALLEL_SEGMENTS: &str = "PARALLEL_SEGMENTS";
/// Backoff base delay in seconds
pub const ENV_RETRY_DELAY: &str = "RETRY_DELAY";
pub const ENV_MAX_RETRIES: &str = "MAX_RETRIES";
pub const ENV_CACHE_MAX_SIZE: &str = "CACHE_MAX_SIZE";
pub const ENV_CACHE_MAX_AGE_HOURS: &str = "CACHE_MAX_AGE_HOURS";

impl Config {
    /// Get the config file path (~/.config/logsift/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        io::config_path()
    }

    /// Get the config directory path (~/.config/logsift)
    pub fn config_dir() -> Result<PathBuf> {
        io::config_dir()
    }

    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        Self::finish_load(io::load()?)
    }

    /// Load from an explicit path and apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::finish_load(io::load_from(path)?)
    }

    fn finish_load(mut config: Self) -> Result<Self> {
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        io::save(self)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        io::save_to(self, path)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Takes a lookup function instead of reading the process environment
    /// directly so tests can supply their own values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let limits = &mut self.limits;
        override_from(&lookup, ENV_MAX_TOKENS_PER_REQUEST, &mut limits.max_tokens_per_request)?;
        override_from(&lookup, ENV_TOKENS_PER_MINUTE, &mut limits.tokens_per_minute)?;
        override_from(&lookup, ENV_TOKENS_PER_SEGMENT, &mut limits.tokens_per_segment)?;
        override_from(&lookup, ENV_OVERLAP_SIZE, &mut limits.overlap_chars)?;

        let dispatch = &mut self.orchestrator;
        override_from(&lookup, ENV_PARALLEL_SEGMENTS, &mut dispatch.parallel_segments)?;
        override_from(&lookup, ENV_RETRY_DELAY, &mut dispatch.retry_delay_secs)?;
        override_from(&lookup, ENV_MAX_RETRIES, &mut dispatch.max_retries)?;

        override_from(&lookup, ENV_CACHE_MAX_SIZE, &mut self.cache.max_size)?;
        override_from(&lookup, ENV_CACHE_MAX_AGE_HOURS, &mut self.cache.max_age_hours)?;
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// Returns an error describing the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.max_tokens_per_request == 0 {
            bail!("limits.max_tokens_per_request must be > 0");
        }
        if limits.tokens_per_minute == 0 {
            bail!("limits.tokens_per_minute must be > 0");
        }
        if limits.tokens_per_segment == 0 {
            bail!("limits.tokens_per_segment must be > 0");
        }
        if limits.overlap_chars > 10_000 {
            bail!(
                "limits.overlap_chars {} exceeds maximum (10000)",
                limits.overlap_chars
            );
        }

        let dispatch = &self.orchestrator;
        if dispatch.parallel_segments == 0 {
            bail!("orchestrator.parallel_segments must be > 0");
        }
        if dispatch.parallel_segments > 32 {
            bail!(
                "orchestrator.parallel_segments {} exceeds maximum (32)",
                dispatch.parallel_segments
            );
        }
        if dispatch.max_retries > 10 {
            bail!(
                "orchestrator.max_retries {} exceeds maximum (10)",
                dispatch.max_retries
            );
        }
        if dispatch.retry_delay_secs > dispatch.max_retry_delay_secs {
            bail!(
                "orchestrator.retry_delay_secs {} exceeds max_retry_delay_secs {}",
                dispatch.retry_delay_secs,
                dispatch.max_retry_delay_secs
            );
        }

        self.segment_content_budget()?;

        if self.cache.max_size == 0 {
            bail!("cache.max_size must be > 0");
        }
        if self.cache.max_age_hours == 0 {
            bail!("cache.max_age_hours must be > 0");
        }

        if self.synthesis.max_sentences == 0 {
            bail!("synthesis.max_sentences must be > 0");
        }

        let service = &self.service;
        if service.command.trim().is_empty() {
            bail!("service.command must not be empty");
        }
        if service.timeout_secs == 0 {
            bail!("service.timeout_secs must be > 0");
        }
        if service.timeout_secs > 3600 {
            bail!(
                "service.timeout_secs {} exceeds maximum (3600s)",
                service.timeout_secs
            );
        }
        if service.max_output_tokens == 0 {
            bail!("service.max_output_tokens must be > 0");
        }
        if !(0.0..=2.0).contains(&service.temperature) {
            bail!(
                "service.temperature {} must be between 0.0 and 2.0",
                service.temperature
            );
        }
        Ok(())
    }

    /// Tokens left for log content in each segment request.
    ///
    /// The per-request limit minus the largest prompt overhead of any log
    /// kind, with a full context prefix and full prior findings reserved.
    pub fn segment_content_budget(&self) -> Result<usize> {
        let overhead = max_segment_request_overhead(
            &TokenEstimator::default(),
            self.limits.overlap_chars,
            self.orchestrator.prior_findings_chars,
        );
        match self.limits.max_tokens_per_request.checked_sub(overhead) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => bail!(
                "limits.max_tokens_per_request {} leaves no room for log content \
                 (prompt, overlap_chars and prior_findings_chars need up to {} tokens)",
                self.limits.max_tokens_per_request,
                overhead
            ),
        }
    }

    /// Retry policy from the `[orchestrator]` section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.orchestrator.max_retries,
            Duration::from_secs(self.orchestrator.retry_delay_secs),
        )
        .with_max_delay(Duration::from_secs(self.orchestrator.max_retry_delay_secs))
    }

    /// Keyword extractor from the `[synthesis]` section
    pub fn extractor(&self) -> KeywordExtractor {
        KeywordExtractor::new(
            self.synthesis.keywords.clone(),
            self.synthesis.context_sentences,
            self.synthesis.max_sentences,
        )
    }

    /// Settings for [`crate::triage::JobSubmitter`]
    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            max_tokens_per_request: self.limits.max_tokens_per_request,
            segment_token_limit: self.limits.tokens_per_segment,
            overlap_chars: self.limits.overlap_chars,
            orchestrator: OrchestratorConfig {
                parallel_segments: self.orchestrator.parallel_segments,
                inter_batch_pause: Duration::from_millis(self.orchestrator.inter_batch_pause_ms),
                retry: self.retry_policy(),
                prior_findings_chars: self.orchestrator.prior_findings_chars,
                ..OrchestratorConfig::default()
            },
            synthesis: self.synthesis.mode,
            extractor: self.extractor(),
            summary_chars: self.synthesis.summary_chars,
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.limits.tokens_per_minute)
    }

    pub fn report_cache(&self) -> BoundedCache<String, Report> {
        BoundedCache::new(
            self.cache.max_size,
            Duration::from_secs(self.cache.max_age_hours * 3600),
        )
    }

    pub fn command_service(&self) -> CommandService {
        CommandService::new(
            self.service.command.clone(),
            self.service.args.clone(),
            Duration::from_secs(self.service.timeout_secs),
        )
    }

    /// Model settings, with an optional name override from the command line
    pub fn model_config(&self, name_override: Option<&str>) -> ModelConfig {
        ModelConfig {
            name: name_override.unwrap_or(&self.service.model).to_string(),
            max_output_tokens: self.service.max_output_tokens,
            temperature: self.service.temperature,
        }
    }
}

fn override_from<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(name) {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(());
        }
        *target = raw
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", name, raw))?;
    }
    Ok(())
}
