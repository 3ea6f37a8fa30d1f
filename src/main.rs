//! Log Sift - CLI entry point

mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use logsift::cli::{Cli, Commands, ConfigCommands};
use logsift::triage::CancellationToken;

/// Environment variable holding the tracing filter
const LOG_ENV: &str = "LOGSIFT_LOG";

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Ctrl+C stops dispatch; finished segments still make it into the report
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, finishing in-flight segments...");
        on_interrupt.cancel();
    })
    .ok(); // Ignore if handler already set

    match cli.command {
        Commands::Analyze {
            file,
            kind,
            model,
            mode,
            workers,
            json,
            quiet,
        } => commands::analyze::handle(
            &file,
            commands::analyze::AnalyzeArgs {
                kind,
                model,
                mode,
                workers,
                json,
                quiet,
            },
            cancel,
        ),
        Commands::Segment {
            file,
            kind,
            max_tokens,
            overlap,
        } => commands::segment::handle(&file, kind, max_tokens, overlap),
        Commands::Estimate { file } => commands::estimate::handle(&file),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::handle_show(),
            ConfigCommands::Init { force } => commands::config::handle_init(force),
        },
        Commands::Completions { shell } => commands::completions::handle::<Cli>(shell),
    }
}
