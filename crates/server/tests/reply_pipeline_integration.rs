//! End-to-end exercise of the Reply Pipeline against a fake LLM backend,
//! following the shape of the teacher's `voice_pipeline_integration.rs`:
//! build real collaborators (rate limiter, history store) and a
//! deterministic fake for the one genuinely external dependency under our
//! control in a test binary, then assert on the emitted event sequence.
//! The TTS leg is left pointed at an address nothing is listening on,
//! which is sufficient to exercise the admission/LLM/history phases and
//! the orchestrator's tolerance of a TTS leg that never completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use voice_agent_config::{LlmConfig, RateLimitConfig, TtsConfig};
use voice_agent_core::ServerEvent;
use voice_agent_llm::adapter::mock::MockBackend;
use voice_agent_llm::LanguageModelAdapter;
use voice_agent_pipeline::{HistoryStore, RateLimiter, ReplyPipeline};

fn unreachable_tts_config() -> TtsConfig {
    TtsConfig {
        endpoint: "wss://127.0.0.1:9/unreachable".into(),
        sample_rate: 44_100,
        channel_type: "MONO".into(),
        audio_format: "WAV".into(),
        style: "Conversational".into(),
        rate: 0,
        pitch: 0,
        variation: 1,
        default_voice_id: "voice-1".into(),
        api_key: "key".into(),
        silence_timeout_ms: 1_000,
        soft_wait_secs: 5,
        hard_wait_secs: 6,
    }
}

#[tokio::test]
async fn happy_path_emits_events_in_order_and_updates_history() {
    let rate_limiter = Arc::new(RateLimiter::new(&RateLimitConfig { max_requests: 40, window_seconds: 86_400 }));
    let history = Arc::new(HistoryStore::new());
    let backend = Arc::new(MockBackend {
        fragments: vec!["Hello".into(), " there".into()],
        model: "mock-1".into(),
    });
    let llm = LanguageModelAdapter::new(backend);

    let pipeline = ReplyPipeline::new(
        "session-1".to_string(),
        llm,
        LlmConfig::default(),
        unreachable_tts_config(),
        rate_limiter,
        history.clone(),
    );

    let (tx, mut rx) = mpsc::channel(64);
    tokio::time::timeout(Duration::from_secs(10), pipeline.run_turn(1, "hi there".to_string(), tx))
        .await
        .expect("turn did not finish within 10s");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    let start_idx = kinds.iter().position(|k| *k == "llm_streaming_start").expect("start event");
    let complete_idx = kinds
        .iter()
        .position(|k| *k == "llm_streaming_complete")
        .expect("complete event");
    assert!(start_idx < complete_idx, "start must precede complete");

    for (i, k) in kinds.iter().enumerate() {
        if *k == "llm_chunk" {
            assert!(i > start_idx && i < complete_idx, "chunks must fall between start and complete");
        }
    }

    let full_response = events.iter().find_map(|e| match e {
        ServerEvent::LlmStreamingComplete { full_response, .. } => Some(full_response.clone()),
        _ => None,
    });
    assert_eq!(full_response.as_deref(), Some("Hello there"));

    let snap = history.snapshot("session-1");
    assert_eq!(snap.len(), 2);
    assert_eq!(snap[0].text, "hi there");
    assert_eq!(snap[1].text, "Hello there");
}

#[tokio::test]
async fn exhausted_rate_limit_denies_turn_without_touching_history() {
    let rate_limiter = Arc::new(RateLimiter::new(&RateLimitConfig { max_requests: 1, window_seconds: 86_400 }));
    let history = Arc::new(HistoryStore::new());
    let backend = Arc::new(MockBackend { fragments: vec!["x".into()], model: "mock-1".into() });
    let llm = LanguageModelAdapter::new(backend);

    let pipeline = ReplyPipeline::new(
        "session-2".to_string(),
        llm,
        LlmConfig::default(),
        unreachable_tts_config(),
        rate_limiter,
        history.clone(),
    );

    let (tx1, mut rx1) = mpsc::channel(64);
    pipeline.run_turn(1, "first".to_string(), tx1).await;
    let mut saw_complete = false;
    while let Ok(event) = rx1.try_recv() {
        if matches!(event, ServerEvent::LlmStreamingComplete { .. }) {
            saw_complete = true;
        }
    }
    assert!(saw_complete, "first turn should be admitted");

    let (tx2, mut rx2) = mpsc::channel(64);
    pipeline.run_turn(2, "second".to_string(), tx2).await;
    let mut saw_quota_error = false;
    while let Ok(event) = rx2.try_recv() {
        if let ServerEvent::LlmError { error, .. } = event {
            assert!(error.to_lowercase().contains("quota"));
            saw_quota_error = true;
        }
    }
    assert!(saw_quota_error, "second turn should be denied by the rate limiter");
    assert_eq!(history.snapshot("session-2").len(), 2, "only the admitted turn appends history");
}
