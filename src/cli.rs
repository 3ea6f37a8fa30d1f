//! CLI definitions for logsift
//!
//! This module contains the clap CLI structure definitions, separated from main.rs
//! so integration tests and completion generation can reach them.

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;
use std::path::PathBuf;

use crate::triage::{LogKind, SynthesisMode};

/// Build clap styles.
///
/// - Green: headers, usage, command names
/// - White: descriptions, placeholders
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .valid(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "logsift")]
#[command(
    about = "[ Log Sift ] - segment large crash and ANR logs and analyze them under a token budget"
)]
#[command(
    long_about = "Log Sift - analyze crash logs that are too large for one request.

Large ANR traces and native tombstones are split at natural boundaries
(process headers, thread blocks, stack traces), sent to an analysis
command under a per-minute token budget, and merged into one report.

QUICK START:
    logsift estimate anr.txt               Estimate tokens for a log
    logsift segment anr.txt                Preview the segmentation plan
    logsift analyze anr.txt                Run the full analysis
    logsift config init                    Write the default config

ENVIRONMENT:
    LOGSIFT_LOG                            Log filter (e.g. debug, logsift=info)
    PARALLEL_SEGMENTS, MAX_RETRIES, ...    Override config values"
)]
#[command(version)]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a log file and print the report
    #[command(long_about = "Analyze a crash or ANR log with the configured analysis command.

Logs that fit in one request are analyzed directly. Larger logs are
segmented and dispatched in batches under the rate limit; failed
segments are retried with exponential backoff and reported in a note
rather than failing the whole job.

EXAMPLES:
    logsift analyze anr.txt
    logsift analyze tombstone_03 --kind tombstone --workers 4
    logsift analyze crash.log --mode model --json")]
    Analyze {
        /// Log file to analyze
        #[arg(help = "Path to the log file")]
        file: PathBuf,
        /// Log kind (detected from the file name when omitted)
        #[arg(long, short)]
        kind: Option<LogKind>,
        /// Model name passed to the analysis command
        #[arg(long, short)]
        model: Option<String>,
        /// Synthesis mode (heuristic or model)
        #[arg(long)]
        mode: Option<SynthesisMode>,
        /// Segments analyzed concurrently (overrides config)
        #[arg(long, short)]
        workers: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Suppress progress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show how a log would be segmented
    #[command(long_about = "Print the segmentation plan for a log without calling any service.

Each line shows the segment number, byte range, estimated tokens and the
boundary kind the cut landed on.

EXAMPLES:
    logsift segment anr.txt
    logsift segment anr.txt --max-tokens 4000 --overlap 200")]
    Segment {
        #[arg(help = "Path to the log file")]
        file: PathBuf,
        #[arg(long, short)]
        kind: Option<LogKind>,
        /// Token budget per segment (defaults to the per-request limit minus prompt overhead)
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Context characters carried into each segment (defaults to limits.overlap_chars)
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Estimate the token count of a log
    Estimate {
        #[arg(help = "Path to the log file")]
        file: PathBuf,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    #[command(long_about = "Generate a completion script for your shell.

EXAMPLES:
    logsift completions bash > ~/.local/share/bash-completion/completions/logsift
    logsift completions zsh > ~/.zfunc/_logsift")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration as TOML
    #[command(long_about = "Display the effective configuration in TOML format.

Values from ~/.config/logsift/config.toml are shown after environment
overrides are applied.

EXAMPLE:
    logsift config show")]
    Show,
    /// Write the default configuration file
    #[command(long_about = "Write the default configuration to ~/.config/logsift/config.toml.

An existing file is left untouched unless --force is given.

EXAMPLE:
    logsift config init")]
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}
