//! Test helper utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use logsift::triage::{
    AnalysisRequest, AnalysisService, ErrorKind, OrchestratorConfig, RateLimitInfo, RetryPolicy,
    ServiceError, ServiceResult, TokenEstimator,
};

/// Marker the segment prompt wraps around each part.
const PART_MARKER: &str = "=== LOG PART ";

/// Segment number of a segment prompt, or `None` for other prompts.
pub fn segment_number_of(prompt: &str) -> Option<usize> {
    let start = prompt.find(PART_MARKER)? + PART_MARKER.len();
    let rest = &prompt[start..];
    rest[..rest.find('/')?].parse().ok()
}

/// Analysis service with scripted per-segment failures.
///
/// Each scripted entry makes a segment fail a given number of times before
/// it succeeds. Prompts without a part marker (synthesis calls) get
/// `synthesis_reply`.
pub struct StubService {
    failures: Mutex<HashMap<usize, (usize, ErrorKind)>>,
    attempts: Mutex<HashMap<usize, usize>>,
    calls: AtomicUsize,
    synthesis_reply: Mutex<Option<String>>,
    /// Estimated size (system + user prompt) of every request received
    request_tokens: Mutex<Vec<usize>>,
}

impl StubService {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            synthesis_reply: Mutex::new(None),
            request_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Fail `segment` `times` times with `kind`, then succeed.
    pub fn failing(self, segment: usize, times: usize, kind: ErrorKind) -> Self {
        self.failures.lock().unwrap().insert(segment, (times, kind));
        self
    }

    /// Reply to synthesis prompts with `text`; without it they fail.
    pub fn with_synthesis_reply(self, text: &str) -> Self {
        *self.synthesis_reply.lock().unwrap() = Some(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sum of the estimated sizes of all requests received.
    pub fn total_request_tokens(&self) -> usize {
        self.request_tokens.lock().unwrap().iter().sum()
    }

    /// Estimated size of the largest request received.
    pub fn max_request_tokens(&self) -> usize {
        self.request_tokens
            .lock()
            .unwrap()
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// How many times `segment` was sent.
    pub fn attempts_for(&self, segment: usize) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&segment)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for StubService {
    fn default() -> Self {
        Self::new()
    }
}

fn error_for(kind: ErrorKind) -> ServiceError {
    match kind {
        ErrorKind::RateLimited => {
            ServiceError::RateLimited(RateLimitInfo::new("429 Too Many Requests"))
        }
        ErrorKind::AuthError => ServiceError::Auth("401 invalid api key".to_string()),
        ErrorKind::BadRequest => ServiceError::BadRequest("400 invalid request".to_string()),
        ErrorKind::Timeout => ServiceError::Timeout(Duration::from_secs(1)),
        _ => ServiceError::Unknown("upstream closed connection".to_string()),
    }
}

impl AnalysisService for StubService {
    fn name(&self) -> &str {
        "stub"
    }

    fn analyze(&self, request: &AnalysisRequest) -> ServiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let estimator = TokenEstimator::default();
        self.request_tokens.lock().unwrap().push(
            estimator.estimate(&request.system_prompt) + estimator.estimate(&request.user_prompt),
        );

        let Some(number) = segment_number_of(&request.user_prompt) else {
            return match self.synthesis_reply.lock().unwrap().clone() {
                Some(reply) => Ok(reply),
                None => Err(ServiceError::Unknown("synthesis unavailable".to_string())),
            };
        };

        *self.attempts.lock().unwrap().entry(number).or_insert(0) += 1;

        let mut failures = self.failures.lock().unwrap();
        if let Some((left, kind)) = failures.get_mut(&number) {
            if *left > 0 {
                *left -= 1;
                return Err(error_for(*kind));
            }
        }

        Ok(format!(
            "Segment {} shows the main thread blocked waiting on a lock held by Binder thread {}.",
            number, number
        ))
    }
}

/// Orchestrator settings with no pauses and millisecond backoff.
pub fn fast_config(parallel_segments: usize, max_retries: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        parallel_segments,
        inter_batch_pause: Duration::ZERO,
        retry: RetryPolicy::new(max_retries, Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(10)),
        ..OrchestratorConfig::default()
    }
}

/// A synthetic ANR trace with `threads` thread blocks.
pub fn anr_log(threads: usize) -> String {
    let mut log = String::from(
        "\n----- pid 4242 at 2024-05-01 10:00:00 -----\nCmd line: com.example.app\n",
    );
    for i in 0..threads {
        log.push_str(&format!("\n\"worker-{}\" prio=5 tid={} Blocked\n", i, i + 2));
        log.push_str("  | group=\"main\" sCount=1\n");
        log.push_str(&format!("  at com.example.Worker.run(Worker.java:{})\n", 100 + i));
        log.push_str(&format!("  - waiting to lock <0x0{:x}> held by thread 1\n", i));
        log.push_str("  at java.lang.Thread.run(Thread.java:919)\n");
    }
    log.push_str("\n----- end 4242 -----\n");
    log
}

/// A synthetic native tombstone with `frames` backtrace frames.
pub fn tombstone_log(frames: usize) -> String {
    let mut log = String::new();
    log.push_str("*** *** *** *** *** *** *** *** *** *** *** *** *** *** *** ***\n");
    log.push_str("Build fingerprint: 'example/device'\n");
    log.push_str("pid: 1234, tid: 1250, name: RenderThread  >>> com.example.app <<<\n");
    log.push_str("signal 11 (SIGSEGV), code 1 (SEGV_MAPERR), fault addr 0x0\n");
    log.push_str("\nbacktrace:\n");
    for i in 0..frames {
        log.push_str(&format!(
            "    #{:02} pc 0000000000{:06x}  /system/lib64/libexample.so (render+{})\n",
            i,
            i * 16,
            i
        ));
    }
    log
}
