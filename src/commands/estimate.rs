//! Estimate command handler

use anyhow::Result;
use std::path::Path;

use logsift::triage::estimator::CharClassCounts;
use logsift::triage::TokenEstimator;
use logsift::Config;

use super::read_log;

/// Print the token estimate and character-class breakdown for a log.
#[cfg(not(tarpaulin_include))]
pub fn handle(file: &Path) -> Result<()> {
    let config = Config::load()?;
    let text = read_log(file)?;
    print!("{}", render(&text, &config)?);
    Ok(())
}

/// Render the estimate report (separated for testing).
pub(crate) fn render(text: &str, config: &Config) -> Result<String> {
    let estimator = TokenEstimator::default();
    let counts = CharClassCounts::of(text);
    let tokens = estimator.estimate_counts(&counts);
    let content_budget = config.segment_content_budget()?;
    let limit = config.limits.tokens_per_segment.min(content_budget);

    let mut output = String::new();
    output.push_str(&format!("Estimated tokens: {}\n", tokens));
    output.push_str(&format!("Characters: {}\n", counts.total()));
    output.push_str(&format!("   English: {}\n", counts.english));
    output.push_str(&format!("   CJK: {}\n", counts.cjk));
    output.push_str(&format!("   Other: {}\n", counts.other));
    if tokens > limit {
        let segments = tokens.div_ceil(content_budget);
        output.push_str(&format!(
            "Exceeds the {} token limit; expect at least {} segments\n",
            limit, segments
        ));
    } else {
        output.push_str(&format!("Fits in one request ({} token limit)\n", limit));
    }
    Ok(output)
}
