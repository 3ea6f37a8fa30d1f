//! Unit tests for config module

use std::fs;
use std::time::Duration;

use logsift::config::{ENV_PARALLEL_SEGMENTS, ENV_TOKENS_PER_MINUTE};
use logsift::triage::SynthesisMode;
use logsift::Config;
use tempfile::TempDir;

#[test]
fn default_config_has_expected_values() {
    let config = Config::default();
    assert_eq!(config.limits.max_tokens_per_request, 12_000);
    assert_eq!(config.limits.overlap_chars, 500);
    assert_eq!(config.orchestrator.parallel_segments, 2);
    assert_eq!(config.orchestrator.max_retries, 3);
    assert_eq!(config.cache.max_age_hours, 24);
    assert_eq!(config.synthesis.mode, SynthesisMode::Heuristic);
    assert!(config.synthesis.keywords.contains(&"deadlock".to_string()));
}

#[test]
fn config_serialization_roundtrip() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[limits]
max_tokens_per_request = 8000
tokens_per_minute = 30000
tokens_per_segment = 6000
overlap_chars = 300

[orchestrator]
parallel_segments = 3
retry_delay_secs = 1
max_retries = 4
inter_batch_pause_ms = 0

[cache]
max_size = 10
max_age_hours = 1

[synthesis]
mode = "model"
keywords = ["deadlock", "sigsegv"]
max_sentences = 3

[service]
command = "analyze-log"
args = ["--json"]
timeout_secs = 30
model = "large"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    config.validate().unwrap();

    let submitter = config.submitter_config();
    assert_eq!(submitter.max_tokens_per_request, 8_000);
    assert_eq!(submitter.segment_token_limit, 6_000);
    assert_eq!(submitter.overlap_chars, 300);
    assert_eq!(submitter.orchestrator.parallel_segments, 3);
    assert_eq!(submitter.orchestrator.retry.max_retries, 4);
    assert_eq!(submitter.orchestrator.inter_batch_pause, Duration::ZERO);
    assert_eq!(submitter.synthesis, SynthesisMode::Model);
    assert_eq!(submitter.extractor.keywords(), ["deadlock", "sigsegv"]);

    assert_eq!(config.rate_limiter().capacity(), 30_000);
    assert_eq!(config.command_service().command(), "analyze-log");
    assert_eq!(config.model_config(None).name, "large");
}

#[test]
fn env_names_match_documented_variables() {
    assert_eq!(ENV_TOKENS_PER_MINUTE, "RATE_LIMIT_TOKENS_PER_MINUTE");
    assert_eq!(ENV_PARALLEL_SEGMENTS, "PARALLEL_SEGMENTS");
}

#[test]
fn env_overrides_apply_on_top_of_file_values() {
    let mut config: Config = toml::from_str("[orchestrator]\nparallel_segments = 3\n").unwrap();
    config
        .apply_env_overrides(|name| match name {
            "PARALLEL_SEGMENTS" => Some("5".to_string()),
            "CACHE_MAX_SIZE" => Some("7".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.orchestrator.parallel_segments, 5);
    assert_eq!(config.cache.max_size, 7);
}

#[test]
fn unknown_synthesis_mode_is_a_parse_error() {
    assert!(toml::from_str::<Config>("[synthesis]\nmode = \"magic\"\n").is_err());
}

#[test]
fn saved_file_is_loadable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("logsift").join("config.toml");

    let mut config = Config::default();
    config.service.args = vec!["-p".to_string(), "--quiet".to_string()];
    config.save_to(&path).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[service]"));
    let parsed: Config = toml::from_str(&contents).unwrap();
    assert_eq!(parsed.service.args, ["-p", "--quiet"]);
}
