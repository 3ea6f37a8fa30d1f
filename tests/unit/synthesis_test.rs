//! Unit tests for report synthesis

use std::sync::Arc;

use logsift::triage::{
    AnalysisJob, CancellationToken, ErrorKind, JobStatus, KeywordExtractor, LogKind, ModelConfig,
    Orchestrator, RateLimiter, ResultSynthesizer, Segmenter, SynthesisMode,
};

use crate::helpers::{anr_log, fast_config, StubService};

fn finished_job(service: Arc<StubService>, parallel: usize) -> AnalysisJob {
    let segments = Segmenter::new(LogKind::Anr).segment(&anr_log(80), 600, 100);
    let orchestrator = Orchestrator::new(
        service,
        Arc::new(RateLimiter::new(10_000_000)),
        fast_config(parallel, 0),
    );
    orchestrator.run(
        AnalysisJob::new(LogKind::Anr, segments, ModelConfig::default()),
        &CancellationToken::new(),
    )
}

#[test]
fn heuristic_report_lists_segments_in_order() {
    let job = finished_job(Arc::new(StubService::new()), 2);
    let report = ResultSynthesizer::heuristic(KeywordExtractor::default()).synthesize(&job);

    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.mode, SynthesisMode::Heuristic);
    assert!(report.failure_note.is_none());

    let mut last = 0;
    for n in 1..=job.results.len() {
        let heading = format!("## Segment {}/{}", n, job.results.len());
        let at = report.body.find(&heading).unwrap();
        assert!(at >= last);
        last = at;
    }
    assert!(report.body.contains("blocked waiting on a lock"));
}

#[test]
fn partial_failure_is_noted_not_fatal() {
    let service = Arc::new(StubService::new().failing(2, 1, ErrorKind::BadRequest));
    let job = finished_job(service, 2);
    let report = ResultSynthesizer::heuristic(KeywordExtractor::default()).synthesize(&job);

    assert_eq!(report.status, JobStatus::PartialSuccess);
    let note = report.failure_note.as_deref().unwrap();
    assert!(note.starts_with(&format!("1 of {} segments", job.results.len())));
    assert!(note.contains("segment 2: bad request"));
    assert!(!report.body.contains("## Segment 2/"));
    assert!(report.to_string().contains("> Note: "));
}

#[test]
fn model_mode_uses_the_service_reply() {
    let service = Arc::new(
        StubService::new().with_synthesis_reply("Root cause: lock inversion between workers."),
    );
    let job = finished_job(service.clone(), 2);
    let synthesizer = ResultSynthesizer::model_assisted(
        KeywordExtractor::default(),
        service,
        Arc::new(RateLimiter::new(10_000_000)),
    );
    let report = synthesizer.synthesize(&job);

    assert_eq!(report.mode, SynthesisMode::Model);
    assert_eq!(report.body, "Root cause: lock inversion between workers.");
    assert!(report.fallback_reason.is_none());
}

#[test]
fn model_mode_falls_back_to_heuristic() {
    let service = Arc::new(StubService::new());
    let job = finished_job(service.clone(), 2);
    let synthesizer = ResultSynthesizer::model_assisted(
        KeywordExtractor::default(),
        service,
        Arc::new(RateLimiter::new(10_000_000)),
    );
    let report = synthesizer.synthesize(&job);

    assert_eq!(report.mode, SynthesisMode::Heuristic);
    assert!(report.fallback_reason.is_some());
    assert!(report.body.contains("## Segment 1/"));
}

#[test]
fn all_failed_job_gets_an_explicit_failure_report() {
    let service = Arc::new(StubService::new().failing(1, 1, ErrorKind::AuthError));
    let job = finished_job(service, 1);
    let report = ResultSynthesizer::heuristic(KeywordExtractor::default()).synthesize(&job);

    assert!(report.is_failed());
    assert_eq!(report.failed_segments.len(), job.results.len());
    assert!(!report.body.contains("## Segment"));
}

#[test]
fn report_serializes_to_json() {
    let job = finished_job(Arc::new(StubService::new()), 2);
    let report = ResultSynthesizer::heuristic(KeywordExtractor::default()).synthesize(&job);
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["job_id"], report.job_id.as_str());
    assert_eq!(json["status"], "success");
    assert_eq!(json["mode"], "heuristic");
}
