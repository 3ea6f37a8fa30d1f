//! Token estimation from character-class heuristics.
//!
//! Characters fall into three classes, each with its own chars-per-token
//! ratio. The weighted sum is inflated by a safety multiplier because
//! underestimating risks a request the remote service will reject.
//!
//! All arithmetic is done in integer "twelfths of a token" so that the
//! estimate is exact and monotonic.

/// English letters and digits: ~4 chars per token (3/12 of a token each).
const ENGLISH_TWELFTHS: u64 = 3;
/// CJK ideographs, kana and hangul: ~2 chars per token.
const CJK_TWELFTHS: u64 = 6;
/// Whitespace, punctuation and other scripts: ~3 chars per token.
const OTHER_TWELFTHS: u64 = 4;

/// Character class used for weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    English,
    Cjk,
    Other,
}

/// Classify a single character.
pub fn classify(c: char) -> CharClass {
    if c.is_ascii_alphanumeric() {
        return CharClass::English;
    }
    let code = c as u32;
    let cjk = (0x4E00..=0x9FFF).contains(&code) // CJK Unified Ideographs
        || (0x3400..=0x4DBF).contains(&code) // Extension A
        || (0xF900..=0xFAFF).contains(&code) // Compatibility Ideographs
        || (0x3040..=0x30FF).contains(&code) // Hiragana and Katakana
        || (0xAC00..=0xD7AF).contains(&code); // Hangul Syllables
    if cjk {
        CharClass::Cjk
    } else {
        CharClass::Other
    }
}

/// Per-class character counts for a piece of text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CharClassCounts {
    pub english: usize,
    pub cjk: usize,
    pub other: usize,
}

impl CharClassCounts {
    /// Count the characters of `text` by class.
    pub fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars() {
            match classify(c) {
                CharClass::English => counts.english += 1,
                CharClass::Cjk => counts.cjk += 1,
                CharClass::Other => counts.other += 1,
            }
        }
        counts
    }

    /// Total number of characters counted.
    pub fn total(&self) -> usize {
        self.english + self.cjk + self.other
    }

    fn weighted_twelfths(&self) -> u64 {
        self.english as u64 * ENGLISH_TWELFTHS
            + self.cjk as u64 * CJK_TWELFTHS
            + self.other as u64 * OTHER_TWELFTHS
    }
}

/// Estimate token count from text content.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    /// Safety multiplier in percent (default: 110 = 10% upward bias)
    safety_percent: u64,
}

impl TokenEstimator {
    /// Create an estimator with a custom safety multiplier (in percent).
    ///
    /// Values below 100 are clamped to 100; the estimate never biases downward.
    pub fn new(safety_percent: u64) -> Self {
        Self {
            safety_percent: safety_percent.max(100),
        }
    }

    /// Estimate the token count for the given text.
    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_counts(&CharClassCounts::of(text))
    }

    /// Estimate the token count for pre-computed class counts.
    pub fn estimate_counts(&self, counts: &CharClassCounts) -> usize {
        let scaled = counts.weighted_twelfths() * self.safety_percent;
        // ceil(scaled / 1200)
        scaled.div_ceil(1200) as usize
    }

    /// Upper bound on the estimate for any text of `chars` characters.
    ///
    /// CJK carries the highest per-character weight, so an all-CJK text of
    /// that length is the worst case.
    pub fn max_tokens_for_chars(&self, chars: usize) -> usize {
        self.estimate_counts(&CharClassCounts {
            cjk: chars,
            ..CharClassCounts::default()
        })
    }

    /// Effective characters per token for this text, safety margin included.
    ///
    /// The segmenter multiplies a token budget by this ratio to obtain a
    /// character budget. Empty text falls back to the English ratio.
    pub fn chars_per_token(&self, text: &str) -> f64 {
        let counts = CharClassCounts::of(text);
        let weighted = counts.weighted_twelfths() as f64 * self.safety_percent as f64 / 1200.0;
        if counts.total() == 0 || weighted <= 0.0 {
            let english = ENGLISH_TWELFTHS as f64 * self.safety_percent as f64 / 1200.0;
            return 1.0 / english;
        }
        counts.total() as f64 / weighted
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self { safety_percent: 110 }
    }
}
