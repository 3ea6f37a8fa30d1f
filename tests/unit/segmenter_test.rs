//! Unit tests for segmentation properties across log kinds and sizes

use logsift::triage::{BoundaryKind, LogKind, Segment, Segmenter, TokenEstimator};

use crate::helpers::{anr_log, tombstone_log};

fn check_plan(text: &str, segments: &[Segment], max_tokens: usize, overlap: usize) {
    let estimator = TokenEstimator::default();
    let total = segments.len();

    let rebuilt: String = segments.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(rebuilt, text, "segments must cover the text exactly once");

    for (i, segment) in segments.iter().enumerate() {
        assert_eq!(segment.segment_number, i + 1);
        assert_eq!(segment.total_segments, total);
        assert_eq!(segment.has_more, i + 1 < total);
        assert_eq!(&text[segment.start..segment.end], segment.content);
        assert!(
            estimator.estimate(&segment.content) <= max_tokens,
            "segment {} estimates over the cap",
            segment.segment_number
        );
        assert!(segment.context_prefix.chars().count() <= overlap);
        assert!(text[..segment.start].ends_with(&segment.context_prefix));
    }
    assert!(segments[0].context_prefix.is_empty());
}

#[test]
fn anr_traces_segment_within_budget_at_every_size() {
    for threads in [10, 80, 400] {
        let text = anr_log(threads);
        for max_tokens in [200, 750, 3000] {
            let segments = Segmenter::new(LogKind::Anr).segment(&text, max_tokens, 120);
            check_plan(&text, &segments, max_tokens, 120);
        }
    }
}

#[test]
fn tombstones_segment_within_budget() {
    let text = tombstone_log(2_000);
    let segments = Segmenter::new(LogKind::Tombstone).segment(&text, 1_000, 64);
    assert!(segments.len() > 1);
    check_plan(&text, &segments, 1_000, 64);
}

#[test]
fn anr_cuts_land_on_thread_blocks() {
    let text = anr_log(300);
    let segments = Segmenter::new(LogKind::Anr).segment(&text, 800, 0);
    assert!(segments.len() > 2);

    for segment in &segments[..segments.len() - 1] {
        assert_ne!(segment.boundary, BoundaryKind::Naive);
    }
    for segment in &segments[1..] {
        assert!(
            segment.content.starts_with('"') || segment.content.starts_with("-----"),
            "segment {} starts mid-block: {:?}",
            segment.segment_number,
            &segment.content[..segment.content.len().min(40)]
        );
    }
}

#[test]
fn text_without_patterns_falls_back_to_naive_cuts() {
    let text = "x".repeat(20_000);
    let segments = Segmenter::new(LogKind::Unknown).segment(&text, 500, 10);
    assert!(segments.len() > 1);
    assert_eq!(segments[0].boundary, BoundaryKind::Naive);
    check_plan(&text, &segments, 500, 10);
}

#[test]
fn cjk_text_is_cut_on_char_boundaries() {
    let text = "主线程等待锁。".repeat(3_000);
    let segments = Segmenter::new(LogKind::Unknown).segment(&text, 400, 30);
    assert!(segments.len() > 1);
    for segment in &segments {
        assert!(text.is_char_boundary(segment.start));
        assert!(text.is_char_boundary(segment.end));
    }
    check_plan(&text, &segments, 400, 30);
}

#[test]
fn mixed_scripts_stay_under_the_cap() {
    let mut text = String::new();
    for i in 0..500 {
        text.push_str(&format!("line {} ok\n", i));
        text.push_str("主线程阻塞在锁上，等待 Binder 回复\n");
    }
    let segments = Segmenter::new(LogKind::Unknown).segment(&text, 300, 50);
    check_plan(&text, &segments, 300, 50);
}

#[test]
fn text_that_fits_is_a_single_segment() {
    let text = anr_log(2);
    let segments = Segmenter::new(LogKind::Anr).segment(&text, 100_000, 500);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].boundary, BoundaryKind::EndOfText);
    assert!(!segments[0].has_more);
    assert_eq!(segments[0].content, text);
}

#[test]
fn empty_text_has_no_segments() {
    assert!(Segmenter::new(LogKind::Tombstone)
        .segment("", 100, 10)
        .is_empty());
}

#[test]
fn zero_overlap_means_no_context() {
    let text = anr_log(200);
    let segments = Segmenter::new(LogKind::Anr).segment(&text, 500, 0);
    assert!(segments.iter().all(|s| s.context_prefix.is_empty()));
}
