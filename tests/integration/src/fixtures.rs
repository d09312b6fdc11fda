//! Test fixtures and sample data for integration tests

use gateway_core::{ChatRequest, ChatTurn, ResultPayload};
use serde_json::{json, Value};
use std::time::Duration;

/// Simulated start time, 2023-11-14T22:13:20Z
pub const START_SECS: u64 = 1_700_000_000;

/// Per-call bound on the in-memory store, matching the default Redis one
pub const STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Caller used by most scenarios
pub const CALLER: &str = "u1";

/// Endpoint label the gateway rate-limits by default
pub const ENDPOINT: &str = "/chat";

/// Model used by most scenarios
pub const MODEL: &str = "gpt-4o-mini";

/// Chat request for `caller` with the default test model
pub fn chat(caller: &str, prompt: &str) -> ChatRequest {
    ChatRequest::new(caller, prompt).with_model(MODEL)
}

/// Cacheable result payload
pub fn payload(text: &str) -> ResultPayload {
    let Value::Object(map) = json!({
        "content": text,
        "model": MODEL,
        "usage": {"prompt_tokens": 12, "completion_tokens": 34},
    }) else {
        unreachable!("literal is an object");
    };
    map
}

/// Alternating user/assistant history of `turns` entries
pub fn conversation(turns: usize) -> Vec<ChatTurn> {
    (0..turns)
        .map(|i| {
            if i % 2 == 0 {
                ChatTurn::user(format!("question {i}"))
            } else {
                ChatTurn::assistant(format!("answer {i}"))
            }
        })
        .collect()
}

/// YAML configuration overriding every section
pub fn full_config_yaml() -> &'static str {
    r"
store:
  url: redis://cache.internal:6379/3
  connect_timeout: 2s
  operation_timeout: 500ms
cache:
  default_ttl: 10m
  per_caller: false
circuit_breaker:
  service: completions
  failure_threshold: 2
  recovery_timeout: 30s
  failure_window: 2m
rate_limit:
  endpoint: /v1/chat
  max_requests: 3
  window: 10s
  member_strategy: unique
  atomic: true
session:
  context_ttl: 1h
  activity_ttl: 5m
  max_history_turns: 4
failure_mode: fail_closed
logging:
  level: debug
  format: json
"
}
