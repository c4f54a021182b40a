use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::warn;
use voice_agent_core::{Role, ServerEvent};
use voice_agent_llm::{LanguageModelAdapter, Message};

use crate::history_store::HistoryStore;
use crate::rate_limit::RateLimiter;
use crate::tts::{TtsEvent, TtsSession};
use voice_agent_config::{LlmConfig, TtsConfig};

/// Everything one activation of the Reply Pipeline needs to run a single
/// turn. One `ReplyPipeline` is constructed per session and reused across
/// turns; it holds no per-turn mutable state itself.
pub struct ReplyPipeline {
    session_id: String,
    llm: LanguageModelAdapter,
    llm_config: LlmConfig,
    tts_config: TtsConfig,
    rate_limiter: Arc<RateLimiter>,
    history: Arc<HistoryStore>,
}

impl ReplyPipeline {
    pub fn new(
        session_id: String,
        llm: LanguageModelAdapter,
        llm_config: LlmConfig,
        tts_config: TtsConfig,
        rate_limiter: Arc<RateLimiter>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            session_id,
            llm,
            llm_config,
            tts_config,
            rate_limiter,
            history,
        }
    }

    /// Runs Phases A-D for one turn, emitting client-facing events via
    /// `emit`. Cancellation-safe: dropping the returned future (or racing
    /// it against a cancellation token at the caller) leaves history and
    /// the rate limiter in a consistent state since the only mutation
    /// (`record`/`append_exchange`) happens synchronously at well-defined
    /// points, not split across awaits.
    pub async fn run_turn(
        &self,
        turn_number: u64,
        user_text: String,
        emit: mpsc::Sender<ServerEvent>,
    ) {
        metrics::counter!("voice_agent_turns_started_total").increment(1);

        // Phase A: admission.
        if !self.rate_limiter.allow() {
            warn!(session_id = %self.session_id, turn_number, "rate limit exceeded, denying turn");
            metrics::counter!("voice_agent_rate_limit_denied_total").increment(1);
            let _ = emit
                .send(ServerEvent::LlmError {
                    turn_number: Some(turn_number),
                    error: "Daily quota limit reached".to_string(),
                    timestamp: Utc::now(),
                })
                .await;
            return;
        }
        self.rate_limiter.record();

        let history_snapshot = self.history.snapshot(&self.session_id);
        let history_messages: Vec<Message> = history_snapshot
            .iter()
            .map(|e| match e.role {
                Role::User => Message::user(e.text.clone()),
                Role::Assistant => Message::assistant(e.text.clone()),
            })
            .collect();

        // Phase B/C setup: open the LLM stream and the TTS session
        // concurrently. TTS is driven by a forwarder task so that LLM
        // token production is never blocked on TTS network I/O.
        let _ = emit
            .send(ServerEvent::LlmStreamingStart { turn_number, timestamp: Utc::now() })
            .await;

        let mut llm_stream = match self
            .llm
            .generate_stream(&self.llm_config.system_persona, &history_messages, &user_text)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id = %self.session_id, turn_number, error = %e, "llm stream failed to open");
                let _ = emit
                    .send(ServerEvent::LlmError {
                        turn_number: Some(turn_number),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
                return;
            }
        };

        let (tts_text_tx, tts_text_rx) = mpsc::channel::<(String, bool)>(64);
        let (tts_event_tx, mut tts_event_rx) = mpsc::channel::<TtsEvent>(64);
        let tts_session = TtsSession::new(self.tts_config.clone());
        let voice_id = self.tts_config.default_voice_id.clone();

        let tts_handle = tokio::spawn(async move {
            tts_session.run(voice_id, tts_text_rx, tts_event_tx).await
        });

        let emit_audio = emit.clone();
        let tts_forward_handle = tokio::spawn(async move {
            let mut total_chunks: u64 = 0;
            while let Some(event) = tts_event_rx.recv().await {
                match event {
                    TtsEvent::Audio { audio_data } => {
                        let _ = emit_audio
                            .send(ServerEvent::AudioChunk {
                                turn_number,
                                audio_data,
                                is_final: false,
                                timestamp: Utc::now(),
                            })
                            .await;
                    }
                    TtsEvent::Complete { total_chunks: n } => {
                        total_chunks = n;
                        let _ = emit_audio
                            .send(ServerEvent::AudioChunk {
                                turn_number,
                                audio_data: String::new(),
                                is_final: true,
                                timestamp: Utc::now(),
                            })
                            .await;
                        let _ = emit_audio
                            .send(ServerEvent::AudioStreamingComplete {
                                turn_number,
                                total_chunks,
                                timestamp: Utc::now(),
                            })
                            .await;
                    }
                    TtsEvent::Error(message) => {
                        let _ = emit_audio
                            .send(ServerEvent::Error { message, timestamp: Utc::now() })
                            .await;
                    }
                }
            }
            total_chunks
        });

        let mut accumulated = String::new();
        let mut llm_failed = false;
        while let Some(chunk) = llm_stream.next().await {
            match chunk {
                Ok(chunk) => {
                    if !chunk.delta.is_empty() {
                        accumulated.push_str(&chunk.delta);
                        let _ = emit
                            .send(ServerEvent::LlmChunk {
                                turn_number,
                                chunk: chunk.delta.clone(),
                                accumulated: accumulated.clone(),
                                timestamp: Utc::now(),
                            })
                            .await;
                        if tts_text_tx.send((chunk.delta, false)).await.is_err() {
                            warn!(session_id = %self.session_id, turn_number, "tts text channel closed early");
                        }
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, turn_number, error = %e, "llm stream error mid-turn");
                    metrics::counter!("voice_agent_llm_errors_total").increment(1);
                    let _ = emit
                        .send(ServerEvent::LlmError {
                            turn_number: Some(turn_number),
                            error: e.to_string(),
                            timestamp: Utc::now(),
                        })
                        .await;
                    llm_failed = true;
                    break;
                }
            }
        }

        // Signal end-of-text to TTS regardless of outcome so its loop can
        // terminate; drop our sender so its receiver sees closure if we
        // never got to send an explicit end marker.
        let _ = tts_text_tx.send((String::new(), true)).await;
        drop(tts_text_tx);

        // Phase D: completion.
        if !llm_failed && !accumulated.is_empty() {
            self.history.append_exchange(&self.session_id, &user_text, &accumulated);
        }

        let soft_wait = Duration::from_secs(self.tts_config.soft_wait_secs);
        let hard_wait = Duration::from_secs(self.tts_config.hard_wait_secs);
        // Kept independent of the `JoinHandle`s below so the forwarder can
        // still be cancelled after the soft-wait timeout consumes its handle.
        let tts_forward_abort = tts_forward_handle.abort_handle();

        match tokio::time::timeout(soft_wait, tts_forward_handle).await {
            Ok(Ok(_)) => {
                // The forwarder only exits once `tts_event_tx` is dropped, which
                // happens when `TtsSession::run` returns, so this resolves
                // immediately and carries the session's actual outcome.
                match tts_handle.await {
                    Ok(Err(e)) => {
                        warn!(session_id = %self.session_id, turn_number, error = %e, "tts session failed");
                        let _ = emit
                            .send(ServerEvent::Error { message: e.to_string(), timestamp: Utc::now() })
                            .await;
                    }
                    Ok(Ok(())) => {}
                    Err(_) => {
                        warn!(session_id = %self.session_id, turn_number, "tts session task panicked");
                    }
                }
            }
            Ok(Err(_)) => {
                warn!(session_id = %self.session_id, turn_number, "tts forwarding task panicked");
                tts_handle.abort();
            }
            Err(_) => {
                warn!(session_id = %self.session_id, turn_number, "tts soft wait elapsed, extending to hard ceiling");
                let _ = emit
                    .send(ServerEvent::Error {
                        message: format!("tts is taking longer than expected for turn {turn_number}"),
                        timestamp: Utc::now(),
                    })
                    .await;
                let tts_abort = tts_handle.abort_handle();
                match tokio::time::timeout(hard_wait.saturating_sub(soft_wait), tts_handle).await {
                    Ok(Ok(Err(e))) => {
                        warn!(session_id = %self.session_id, turn_number, error = %e, "tts session failed");
                        let _ = emit
                            .send(ServerEvent::Error { message: e.to_string(), timestamp: Utc::now() })
                            .await;
                    }
                    Ok(Ok(Ok(()))) => {}
                    Ok(Err(_)) => {
                        warn!(session_id = %self.session_id, turn_number, "tts session task panicked");
                    }
                    Err(_) => {
                        warn!(session_id = %self.session_id, turn_number, "tts hard ceiling elapsed, abandoning tts for this turn");
                        tts_abort.abort();
                        tts_forward_abort.abort();
                        let _ = emit
                            .send(ServerEvent::Error {
                                message: format!("tts abandoned for turn {turn_number} after hard wait ceiling"),
                                timestamp: Utc::now(),
                            })
                            .await;
                    }
                }
            }
        }

        if !llm_failed {
            metrics::counter!("voice_agent_turns_completed_total").increment(1);
            let _ = emit
                .send(ServerEvent::LlmStreamingComplete {
                    turn_number,
                    full_response: accumulated,
                    timestamp: Utc::now(),
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voice_agent_config::RateLimitConfig;
    use voice_agent_llm::adapter::mock::MockBackend;

    fn tts_config_pointing_nowhere() -> TtsConfig {
        // A turn that never actually reaches the network: these tests stop
        // at the rate-limit/admission boundary.
        TtsConfig {
            endpoint: "wss://127.0.0.1:1/unreachable".into(),
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
            soft_wait_secs: 90,
            hard_wait_secs: 120,
        }
    }

    #[tokio::test]
    async fn rate_limit_denial_skips_llm_and_history() {
        let rate_limiter = Arc::new(RateLimiter::new(&RateLimitConfig { max_requests: 0, window_seconds: 3600 }));
        let history = Arc::new(HistoryStore::new());
        let backend = Arc::new(MockBackend { fragments: vec!["hi".into()], model: "mock".into() });
        let llm = LanguageModelAdapter::new(backend);

        let pipeline = ReplyPipeline::new(
            "s1".to_string(),
            llm,
            LlmConfig::default(),
            tts_config_pointing_nowhere(),
            rate_limiter,
            history.clone(),
        );

        let (tx, mut rx) = mpsc::channel(16);
        pipeline.run_turn(1, "hello".to_string(), tx).await;

        let mut saw_quota_error = false;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::LlmError { error, .. } = event {
                if error.contains("quota") || error.contains("Daily") {
                    saw_quota_error = true;
                }
            }
        }
        assert!(saw_quota_error);
        assert!(history.snapshot("s1").is_empty());
    }
}
