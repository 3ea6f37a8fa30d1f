//! Segment command handler

use anyhow::Result;
use std::path::Path;

use logsift::triage::{LogKind, Segment, Segmenter};
use logsift::Config;

use super::{read_log, resolve_kind};

/// Print the segmentation plan for a log without calling any service.
#[cfg(not(tarpaulin_include))]
pub fn handle(
    file: &Path,
    kind: Option<LogKind>,
    max_tokens: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let config = Config::load()?;
    let text = read_log(file)?;
    let kind = resolve_kind(kind, file);
    let max_tokens = match max_tokens {
        Some(tokens) => tokens,
        None => config.segment_content_budget()?,
    };
    let overlap = overlap.unwrap_or(config.limits.overlap_chars);

    let segments = Segmenter::new(kind).segment(&text, max_tokens, overlap);
    if segments.is_empty() {
        println!("Nothing to segment: {} is empty", file.display());
        return Ok(());
    }

    println!(
        "{} ({}), {} segment{} at {} tokens each:",
        file.display(),
        kind,
        segments.len(),
        if segments.len() == 1 { "" } else { "s" },
        max_tokens
    );
    for segment in &segments {
        println!("{}", format_segment_line(segment));
    }
    Ok(())
}

/// One plan line: number, byte range, estimate, boundary and context size.
pub(crate) fn format_segment_line(segment: &Segment) -> String {
    format!(
        "  [{:>3}/{}] bytes {:>9}..{:<9} ~{:>6} tokens  cut: {:<5}  context: {} chars",
        segment.segment_number,
        segment.total_segments,
        segment.start,
        segment.end,
        segment.estimated_tokens,
        segment.boundary,
        segment.context_prefix.chars().count()
    )
}
