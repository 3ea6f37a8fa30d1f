//! Keyword-window sentence extraction.
//!
//! Pulls the sentences of a per-segment analysis that mention a diagnostic
//! keyword, plus an optional window of neighbouring sentences. Used both for
//! the rolling "prior findings" context handed to later segments and for the
//! heuristic synthesis of the final report.

/// Keywords that mark a sentence as diagnostic.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "crash",
    "error",
    "exception",
    "fatal",
    "deadlock",
    "lock",
    "blocked",
    "waiting",
    "memory",
    "oom",
    "leak",
    "anr",
    "timeout",
    "signal",
    "abort",
    "null",
    "root cause",
    "stack overflow",
];

/// Extracts keyword-bearing sentences from free text.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    keywords: Vec<String>,
    context_sentences: usize,
    max_sentences: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(), 0, 5)
    }
}

impl KeywordExtractor {
    /// Create an extractor.
    ///
    /// `context_sentences` neighbours are kept after each match; at most
    /// `max_sentences` sentences are returned per text.
    pub fn new(keywords: Vec<String>, context_sentences: usize, max_sentences: usize) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            context_sentences,
            max_sentences,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn max_sentences(&self) -> usize {
        self.max_sentences
    }

    fn matches(&self, sentence: &str) -> bool {
        let lower = sentence.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Keyword sentences (with context) in original order, capped.
    pub fn extract<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let sentences = split_sentences(text);
        let mut keep = vec![false; sentences.len()];

        for (i, sentence) in sentences.iter().enumerate() {
            if self.matches(sentence) {
                let last = (i + self.context_sentences).min(sentences.len() - 1);
                keep[i..=last].iter_mut().for_each(|k| *k = true);
            }
        }

        sentences
            .into_iter()
            .zip(keep)
            .filter_map(|(sentence, kept)| kept.then_some(sentence))
            .take(self.max_sentences)
            .collect()
    }

    /// Short summary of `text` for carrying forward as context.
    ///
    /// Falls back to the first sentences when nothing matches. The result is
    /// at most `max_chars` characters.
    pub fn summarize(&self, text: &str, max_chars: usize) -> String {
        let mut picked = self.extract(text);
        if picked.is_empty() {
            picked = split_sentences(text)
                .into_iter()
                .take(self.max_sentences.min(2))
                .collect();
        }
        truncate_chars(&picked.join(" "), max_chars)
    }
}

/// Split text into trimmed, non-empty sentences.
///
/// A sentence ends at a newline or at `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                None => Some(i + c.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = end {
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// Keep at most `max_chars` characters, marking the cut with "...".
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}
