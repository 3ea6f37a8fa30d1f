//! Unit tests for batched dispatch, retries and failure isolation

use std::sync::Arc;

use logsift::triage::{
    AnalysisJob, CancellationToken, ErrorKind, JobStatus, LogKind, ModelConfig, Orchestrator,
    RateLimiter, Segment, Segmenter,
};

use crate::helpers::{anr_log, fast_config, StubService};

fn plan(threads: usize, max_tokens: usize) -> Vec<Segment> {
    Segmenter::new(LogKind::Anr).segment(&anr_log(threads), max_tokens, 200)
}

fn run(
    service: Arc<StubService>,
    segments: Vec<Segment>,
    parallel: usize,
    max_retries: u32,
) -> (AnalysisJob, Arc<RateLimiter>) {
    let limiter = Arc::new(RateLimiter::new(10_000_000));
    let orchestrator = Orchestrator::new(
        service,
        Arc::clone(&limiter),
        fast_config(parallel, max_retries),
    );
    let job = AnalysisJob::new(LogKind::Anr, segments, ModelConfig::default());
    (orchestrator.run(job, &CancellationToken::new()), limiter)
}

#[test]
fn every_segment_gets_one_result_in_order() {
    let segments = plan(120, 600);
    let total = segments.len();
    assert!(total >= 4);

    let service = Arc::new(StubService::new());
    let (job, _) = run(service.clone(), segments, 3, 2);

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.results.len(), total);
    for (i, result) in job.results.iter().enumerate() {
        assert_eq!(result.segment_number, i + 1);
        assert!(result.success);
        assert_eq!(result.retry_count, 0);
    }
    assert_eq!(service.calls(), total);
}

#[test]
fn limiter_is_charged_for_every_attempt() {
    let segments = plan(60, 600);
    let content_tokens: usize = segments.iter().map(|s| s.estimated_tokens).sum();
    let total = segments.len();

    let service = Arc::new(StubService::new().failing(1, 1, ErrorKind::Timeout));
    let (_, limiter) = run(service.clone(), segments, 2, 3);

    assert_eq!(service.calls(), total + 1);
    assert_eq!(limiter.budget().tokens_used_in_window, service.total_request_tokens());
    // Prompt and context are charged on top of the content
    assert!(service.total_request_tokens() > content_tokens);
}

#[test]
fn transient_failures_are_retried_until_success() {
    let service = Arc::new(StubService::new().failing(2, 2, ErrorKind::RateLimited));
    let (job, _) = run(service.clone(), plan(60, 600), 2, 3);

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.results[1].retry_count, 2);
    assert_eq!(service.attempts_for(2), 3);
}

#[test]
fn retries_stop_at_the_ceiling() {
    let service = Arc::new(StubService::new().failing(1, 100, ErrorKind::Unknown));
    let (job, _) = run(service.clone(), plan(60, 600), 2, 2);

    let first = &job.results[0];
    assert!(!first.success);
    assert_eq!(first.error, Some(ErrorKind::Unknown));
    assert_eq!(first.retry_count, 2);
    assert_eq!(service.attempts_for(1), 3);
    assert_eq!(job.status, JobStatus::PartialSuccess);
}

#[test]
fn bad_request_fails_only_that_segment() {
    let service = Arc::new(StubService::new().failing(2, 1, ErrorKind::BadRequest));
    let (job, _) = run(service.clone(), plan(60, 600), 2, 3);

    assert_eq!(service.attempts_for(2), 1, "bad requests are not retried");
    assert_eq!(job.results[1].error, Some(ErrorKind::BadRequest));
    assert!(job.results.iter().filter(|r| r.success).count() == job.results.len() - 1);
    assert_eq!(job.status, JobStatus::PartialSuccess);
}

#[test]
fn auth_error_stops_remaining_segments() {
    let segments = plan(120, 600);
    let total = segments.len();
    let service = Arc::new(StubService::new().failing(1, 1, ErrorKind::AuthError));
    let (job, _) = run(service.clone(), segments, 1, 3);

    assert_eq!(job.results.len(), total);
    assert_eq!(job.results[0].error, Some(ErrorKind::AuthError));
    for result in &job.results[1..] {
        assert_eq!(result.error, Some(ErrorKind::Cancelled));
    }
    assert_eq!(service.calls(), 1);
    assert_eq!(job.status, JobStatus::Failed);
}

#[test]
fn cancelled_job_records_every_segment() {
    let segments = plan(60, 600);
    let total = segments.len();
    let service = Arc::new(StubService::new());
    let limiter = Arc::new(RateLimiter::new(10_000_000));
    let orchestrator = Orchestrator::new(service.clone(), limiter, fast_config(2, 3));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let job = orchestrator.run(
        AnalysisJob::new(LogKind::Anr, segments, ModelConfig::default()),
        &cancel,
    );
    assert_eq!(job.results.len(), total);
    assert!(job.results.iter().all(|r| r.error == Some(ErrorKind::Cancelled)));
    assert_eq!(service.calls(), 0);
    assert_eq!(job.status, JobStatus::Failed);
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let sequential = run(Arc::new(StubService::new()), plan(80, 500), 1, 1).0;
    let parallel = run(Arc::new(StubService::new()), plan(80, 500), 4, 1).0;

    let texts = |job: &AnalysisJob| -> Vec<String> {
        job.results.iter().map(|r| r.text.clone()).collect()
    };
    assert_eq!(texts(&sequential), texts(&parallel));
}
