//! Prompt building for segment analysis and model-assisted synthesis.
//!
//! Templates live in `src/triage/prompts/` and are included at compile time.
//! Placeholders are filled in a single pass, so placeholder-like text inside
//! a log or a model reply is left alone.

use super::estimator::TokenEstimator;
use super::types::{LogKind, Segment};

/// System prompt shared by every call.
pub fn system_prompt(kind: LogKind) -> String {
    format!(
        "You are an expert in diagnosing Android and native crashes. \
         You are given a {} and answer in plain text.",
        kind.description()
    )
}

const SEGMENT_TEMPLATE: &str = include_str!("prompts/segment.txt");

/// Build the prompt for one segment.
///
/// `prior_findings` is the rolling summary of earlier segments; empty for the
/// first batch.
pub fn build_segment_prompt(segment: &Segment, kind: LogKind, prior_findings: &str) -> String {
    let prior_findings = prior_findings.trim();
    render_segment_prompt(
        &segment.segment_number.to_string(),
        &segment.total_segments.to_string(),
        kind,
        segment.total_segments > 1,
        (!prior_findings.is_empty()).then_some(prior_findings),
        (!segment.context_prefix.is_empty()).then_some(segment.context_prefix.as_str()),
        &segment.content,
    )
}

/// Upper bound on the tokens a segment request adds on top of its content.
///
/// Covers the system prompt, the template with both optional sections, a
/// `context_prefix` of up to `overlap_chars` characters and prior findings of
/// up to `prior_findings_chars` characters, all at the worst-case ratio.
pub fn segment_request_overhead(
    estimator: &TokenEstimator,
    kind: LogKind,
    overlap_chars: usize,
    prior_findings_chars: usize,
) -> usize {
    let widest = usize::MAX.to_string();
    let frame = render_segment_prompt(&widest, &widest, kind, true, Some(""), Some(""), "");
    estimator.estimate(&system_prompt(kind))
        + estimator.estimate(&frame)
        + estimator.max_tokens_for_chars(overlap_chars)
        + estimator.max_tokens_for_chars(prior_findings_chars)
}

/// Largest [`segment_request_overhead`] over every log kind.
pub fn max_segment_request_overhead(
    estimator: &TokenEstimator,
    overlap_chars: usize,
    prior_findings_chars: usize,
) -> usize {
    LogKind::all()
        .iter()
        .map(|&kind| {
            segment_request_overhead(estimator, kind, overlap_chars, prior_findings_chars)
        })
        .max()
        .unwrap_or(0)
}

fn render_segment_prompt(
    segment_number: &str,
    total_segments: &str,
    kind: LogKind,
    continued: bool,
    prior_findings: Option<&str>,
    context_prefix: Option<&str>,
    content: &str,
) -> String {
    let continuation_note = if continued {
        "The log was split into parts that are analyzed separately; \
         focus on this part and do not speculate about missing parts."
    } else {
        ""
    };

    let prior_findings_section = prior_findings
        .map(|findings| format!("Findings from earlier parts:\n{}\n\n", findings))
        .unwrap_or_default();

    let context_section = context_prefix
        .map(|prefix| {
            format!(
                "Lines immediately before this part (context only):\n{}\n\n",
                prefix
            )
        })
        .unwrap_or_default();

    fill_template(
        SEGMENT_TEMPLATE,
        &[
            ("{segment_number}", segment_number),
            ("{total_segments}", total_segments),
            ("{log_description}", kind.description()),
            ("{continuation_note}", continuation_note),
            ("{prior_findings_section}", &prior_findings_section),
            ("{context_section}", &context_section),
            ("{content}", content),
        ],
    )
}

/// Replace placeholders in one pass over `template`.
///
/// Substituted values are copied verbatim and never scanned again, so
/// placeholder-like text inside log lines or model output stays as is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|&(key, value)| rest.find(key).map(|pos| (pos, key, value)))
            .min_by_key(|&(pos, _, _)| pos);
        match next {
            Some((pos, key, value)) => {
                output.push_str(&rest[..pos]);
                output.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                output.push_str(rest);
                return output;
            }
        }
    }
}

/// Build the prompt for the model-assisted synthesis call.
///
/// Only the per-segment summaries are sent, never the full segment text.
pub fn build_synthesis_prompt(
    kind: LogKind,
    summaries: &[(usize, String)],
    failure_note: Option<&str>,
) -> String {
    const TEMPLATE: &str = include_str!("prompts/synthesis.txt");

    let rendered: String = summaries
        .iter()
        .map(|(number, summary)| format!("[Part {}] {}\n", number, summary))
        .collect();

    let failure_note = failure_note
        .map(|note| format!("\nMention in the report that {}.", note))
        .unwrap_or_default();

    fill_template(
        TEMPLATE,
        &[
            ("{segment_count}", &summaries.len().to_string()),
            ("{log_description}", kind.description()),
            ("{failure_note}", &failure_note),
            ("{summaries}", &rendered),
        ],
    )
}
