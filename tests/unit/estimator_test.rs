//! Unit tests for token estimation

use logsift::triage::estimator::{classify, CharClass, CharClassCounts};
use logsift::triage::TokenEstimator;

#[test]
fn empty_text_estimates_zero() {
    assert_eq!(TokenEstimator::default().estimate(""), 0);
}

#[test]
fn cjk_costs_more_than_english_per_char() {
    let estimator = TokenEstimator::default();
    let english = estimator.estimate(&"a".repeat(1_200));
    let cjk = estimator.estimate(&"锁".repeat(1_200));
    assert!(cjk > english);
}

#[test]
fn estimate_grows_with_length() {
    let estimator = TokenEstimator::default();
    let short = estimator.estimate("main thread blocked");
    let long = estimator.estimate(&"main thread blocked ".repeat(50));
    assert!(long > short);
}

#[test]
fn larger_margin_never_estimates_less() {
    let text = "Caused by: java.lang.IllegalStateException at 0x7f00";
    let tight = TokenEstimator::new(100).estimate(text);
    let loose = TokenEstimator::new(150).estimate(text);
    assert!(loose >= tight);
}

#[test]
fn counts_match_classification() {
    let text = "ab 主线 !";
    let counts = CharClassCounts::of(text);
    assert_eq!(counts.total(), text.chars().count());
    assert_eq!(counts.cjk, 2);
    assert_eq!(classify('主'), CharClass::Cjk);
}

#[test]
fn estimate_counts_agrees_with_estimate() {
    let estimator = TokenEstimator::default();
    let text = "pid: 1234, tid: 1250 主线程 signal 11";
    assert_eq!(
        estimator.estimate(text),
        estimator.estimate_counts(&CharClassCounts::of(text))
    );
}
