//! Analyze command handler
//!
//! Drives the full pipeline for one log file:
//! 1. Load config and apply command-line overrides
//! 2. Plan segments (boundary-aware, under the per-request budget)
//! 3. Dispatch segments in batches under the rate limit, with retries
//! 4. Synthesize and print the report and usage summary

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use logsift::triage::{
    AnalysisService, CancellationToken, ConsoleProgress, JobSubmitter, LogKind, Report,
    SynthesisMode, TriageError,
};
use logsift::Config;

use super::{read_log, resolve_kind};

/// Command-line options for `logsift analyze`.
#[derive(Debug, Default)]
pub struct AnalyzeArgs {
    pub kind: Option<LogKind>,
    pub model: Option<String>,
    pub mode: Option<SynthesisMode>,
    pub workers: Option<usize>,
    pub json: bool,
    pub quiet: bool,
}

/// Analyze a log file with the configured analysis command.
#[cfg(not(tarpaulin_include))]
pub fn handle(file: &Path, args: AnalyzeArgs, cancel: CancellationToken) -> Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &args)?;

    let text = read_log(file)?;
    let kind = resolve_kind(args.kind, file);

    let service: Arc<dyn AnalysisService> = Arc::new(config.command_service());
    let submitter = JobSubmitter::new(
        service,
        Arc::new(config.rate_limiter()),
        Arc::new(config.report_cache()),
        config.submitter_config(),
    )
    .with_cancellation(cancel);

    let segments = submitter.plan(&text, kind).map_err(explain)?;
    let estimated_tokens: usize = segments.iter().map(|s| s.estimated_tokens).sum();
    let progress = Arc::new(if args.quiet || args.json {
        ConsoleProgress::quiet(segments.len())
    } else {
        ConsoleProgress::new(segments.len())
    });
    let submitter = submitter.with_progress(progress.callback());

    progress.start(estimated_tokens);
    let model = config.model_config(args.model.as_deref());
    let report = submitter
        .analyze_plan(segments, kind, model)
        .map_err(explain)?;
    progress.finish();

    print_report(&report, args.json)?;

    if report.is_failed() {
        anyhow::bail!("No segment of {} could be analyzed", file.display());
    }
    Ok(())
}

/// Fold command-line flags into the loaded config and re-validate.
pub(crate) fn apply_overrides(config: &mut Config, args: &AnalyzeArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.orchestrator.parallel_segments = workers;
    }
    if let Some(mode) = args.mode {
        config.synthesis.mode = mode;
    }
    config.validate()
}

fn explain(err: TriageError) -> anyhow::Error {
    match err {
        TriageError::ServiceUnavailable { service } => anyhow::anyhow!(
            "Analysis command '{}' is not installed.\n\
             Set [service] command in {} or install it.",
            service,
            Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        ),
        TriageError::NoContent => anyhow::anyhow!("Log is empty; nothing to analyze"),
        other => other.into(),
    }
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!("{}", report);
    if let Some(usage) = &report.usage {
        print!("{}", usage.format());
    }
    Ok(())
}
