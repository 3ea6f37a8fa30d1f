//! Adaptive segmentation of oversized log text.
//!
//! Splits text that exceeds the per-request token cap into bounded segments,
//! preferring to cut at natural log boundaries so a single thread dump or
//! stack trace is not split across two service calls.
//!
//! # Algorithm
//!
//! 1. Convert the token cap to a character budget using the estimator's
//!    chars-per-token ratio for the whole text
//! 2. Propose a naive cut `budget` characters ahead
//! 3. Scan backward over the last part of the segment for the highest
//!    priority break pattern (process > block > stack trace > blank line)
//! 4. Fall back to the naive cut if the result would be too small
//! 5. Shrink the budget and retry if the chosen slice still estimates over
//!    the cap (mixed scripts can tokenize worse than the global ratio)
//!
//! Segments partition the text: each one starts exactly where the previous
//! one ended. Continuity between segments comes from `context_prefix`, a copy
//! of at most `overlap_chars` characters preceding the segment's start.

use tracing::debug;

use super::estimator::TokenEstimator;
use super::types::{BoundaryKind, LogKind, Segment};

/// Default share of the segment (in percent) searched for a natural break.
pub const DEFAULT_SEARCH_WINDOW_PCT: usize = 15;

/// Default minimum segment size, as a percentage of the character budget.
pub const DEFAULT_MIN_SEGMENT_PCT: usize = 25;

/// Break patterns for one log kind, grouped by priority (highest first).
///
/// Every pattern starts with a newline; a cut is placed right after it so the
/// marker line opens the next segment.
fn break_patterns(kind: LogKind) -> &'static [(BoundaryKind, &'static [&'static str])] {
    const BLANK: &[&str] = &["\n\n"];
    match kind {
        LogKind::Anr => &[
            (BoundaryKind::Process, &["\n----- pid ", "\n----- end "]),
            (BoundaryKind::Block, &["\n\""]),
            (BoundaryKind::StackTrace, &["\nCaused by:", "\n  at "]),
            (BoundaryKind::BlankLine, BLANK),
        ],
        LogKind::Tombstone => &[
            (
                BoundaryKind::Process,
                &["\n*** *** *** *** *** *** *** *** ***", "\npid: "],
            ),
            (BoundaryKind::Block, &["\n--- --- --- --- --- --- --- ---"]),
            (BoundaryKind::StackTrace, &["\nbacktrace:", "\nstack:"]),
            (BoundaryKind::BlankLine, BLANK),
        ],
        LogKind::Unknown => &[
            (
                BoundaryKind::Process,
                &["\n----- pid ", "\n*** *** *** *** *** *** *** *** ***"],
            ),
            (
                BoundaryKind::Block,
                &["\n--- --- --- --- --- --- --- ---", "\n\""],
            ),
            (
                BoundaryKind::StackTrace,
                &[
                    "\nCaused by:",
                    "\nException in thread",
                    "\nTraceback",
                    "\nbacktrace:",
                ],
            ),
            (BoundaryKind::BlankLine, BLANK),
        ],
    }
}

/// Splits text into token-bounded segments.
#[derive(Debug, Clone)]
pub struct Segmenter {
    estimator: TokenEstimator,
    kind: LogKind,
    search_window_pct: usize,
    min_segment_pct: usize,
}

impl Segmenter {
    /// Create a segmenter for the given log kind with default tuning.
    pub fn new(kind: LogKind) -> Self {
        Self::with_estimator(kind, TokenEstimator::default())
    }

    /// Create a segmenter with a custom estimator.
    pub fn with_estimator(kind: LogKind, estimator: TokenEstimator) -> Self {
        Self {
            estimator,
            kind,
            search_window_pct: DEFAULT_SEARCH_WINDOW_PCT,
            min_segment_pct: DEFAULT_MIN_SEGMENT_PCT,
        }
    }

    /// Set the share of each segment searched for a natural break (1-90%).
    pub fn with_search_window(mut self, pct: usize) -> Self {
        self.search_window_pct = pct.clamp(1, 90);
        self
    }

    /// Split `text` into segments of at most `max_tokens_per_segment` each.
    ///
    /// Empty text yields no segments. Text that already fits yields exactly
    /// one segment.
    pub fn segment(
        &self,
        text: &str,
        max_tokens_per_segment: usize,
        overlap_chars: usize,
    ) -> Vec<Segment> {
        if text.is_empty() {
            return Vec::new();
        }
        let max_tokens = max_tokens_per_segment.max(1);

        let total_tokens = self.estimator.estimate(text);
        if total_tokens <= max_tokens {
            return vec![Segment {
                content: text.to_string(),
                context_prefix: String::new(),
                start: 0,
                end: text.len(),
                segment_number: 1,
                total_segments: 1,
                estimated_tokens: total_tokens,
                has_more: false,
                boundary: BoundaryKind::EndOfText,
            }];
        }

        let chars_per_token = self.estimator.chars_per_token(text);
        let max_chars = ((max_tokens as f64 * chars_per_token) as usize).max(1);

        let mut cuts: Vec<(usize, usize, BoundaryKind, usize)> = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let (end, boundary, tokens) = self.next_cut(text, pos, max_chars, max_tokens);
            // next_cut always advances, but never trust a regression
            if end <= pos {
                break;
            }
            cuts.push((pos, end, boundary, tokens));
            pos = end;
        }

        let total = cuts.len();
        debug!(
            kind = %self.kind,
            total_tokens,
            max_tokens,
            max_chars,
            segments = total,
            "segmentation plan"
        );

        cuts.into_iter()
            .enumerate()
            .map(|(i, (start, end, boundary, estimated_tokens))| Segment {
                content: text[start..end].to_string(),
                context_prefix: context_before(text, start, overlap_chars).to_string(),
                start,
                end,
                segment_number: i + 1,
                total_segments: total,
                estimated_tokens,
                has_more: i + 1 < total,
                boundary,
            })
            .collect()
    }

    /// Choose the end of the segment starting at `pos`.
    ///
    /// Returns the end offset, the boundary kind and the segment's estimate.
    fn next_cut(
        &self,
        text: &str,
        pos: usize,
        max_chars: usize,
        max_tokens: usize,
    ) -> (usize, BoundaryKind, usize) {
        let remaining = &text[pos..];
        let mut budget = max_chars;

        loop {
            let naive_end = char_offset(remaining, budget).map(|i| pos + i);
            let (end, boundary) = match naive_end {
                None => (text.len(), BoundaryKind::EndOfText),
                Some(naive_end) => self.find_break(text, pos, naive_end, budget),
            };

            let tokens = self.estimator.estimate(&text[pos..end]);
            if tokens <= max_tokens || budget <= 1 {
                return (end, boundary, tokens);
            }

            // Shrink by at least one character, at most 5%
            let shrunk = (budget * 95 / 100).min(budget - 1).max(1);
            debug!(budget, shrunk, tokens, "segment over cap, shrinking budget");
            budget = shrunk;
        }
    }

    /// Search backward from `naive_end` for a natural break.
    fn find_break(
        &self,
        text: &str,
        pos: usize,
        naive_end: usize,
        budget: usize,
    ) -> (usize, BoundaryKind) {
        let window_chars = (budget * self.search_window_pct / 100).max(1).min(budget);
        let search_start = char_offset(&text[pos..], budget - window_chars)
            .map(|i| pos + i)
            .unwrap_or(pos);
        let window = &text[search_start..naive_end];
        let min_chars = budget * self.min_segment_pct / 100;

        for (boundary, patterns) in break_patterns(self.kind) {
            // Rightmost match of any pattern in this priority group
            let found = patterns
                .iter()
                .filter_map(|pattern| window.rfind(pattern))
                .max();

            if let Some(idx) = found {
                // Cut right after the leading newline
                let cut = search_start + idx + 1;
                if cut > pos && text[pos..cut].chars().count() >= min_chars {
                    return (cut, *boundary);
                }
            }
        }

        (naive_end, BoundaryKind::Naive)
    }
}

/// Whether `text` is too large to send as a single request.
pub fn needs_segmentation(estimator: &TokenEstimator, text: &str, limit_tokens: usize) -> bool {
    estimator.estimate(text) > limit_tokens
}

/// Byte offset of the `n`th character of `s`, or `None` if `s` is shorter.
fn char_offset(s: &str, n: usize) -> Option<usize> {
    s.char_indices().nth(n).map(|(i, _)| i)
}

/// At most `max_chars` characters of `text` immediately preceding `pos`.
fn context_before(text: &str, pos: usize, max_chars: usize) -> &str {
    if max_chars == 0 || pos == 0 {
        return "";
    }
    let before = &text[..pos];
    let start = before
        .char_indices()
        .rev()
        .nth(max_chars - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &before[start..]
}
