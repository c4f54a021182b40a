use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, warn};

use super::turn_detector::{MergeDecision, TurnDetector};
use crate::error::PipelineError;
use voice_agent_config::SttConfig;

/// Events the Turn Detector surfaces to the session controller. Carries
/// enough information for the controller to emit the matching client-facing
/// event without reaching back into the STT session's internals.
#[derive(Debug, Clone)]
pub enum SttEvent {
    SessionBegin,
    Partial { text: String },
    NewTurn { turn_number: u64, text: String },
    PunctuationUpdate { turn_number: u64, text: String },
    SessionTerminated { total_audio_duration_ms: u64 },
    Error(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
struct WireTranscript {
    #[serde(default)]
    text: String,
    #[serde(default)]
    end_of_turn: bool,
    #[serde(default)]
    confidence: f32,
}

/// Streaming STT adapter: owns the outbound WebSocket connection to the
/// external speech-to-text provider, forwards audio frames to it, and runs
/// every end-of-turn transcript through the punctuation-merge rule before
/// surfacing `SttEvent`s.
pub struct SttSession {
    config: SttConfig,
    detector: TurnDetector,
}

impl SttSession {
    pub fn new(config: SttConfig) -> Self {
        let window = std::time::Duration::from_secs_f64(config.punctuation_merge_window_s);
        Self {
            config,
            detector: TurnDetector::new(window),
        }
    }

    fn connect_url(&self) -> String {
        format!(
            "wss://api.assemblyai.com/v2/realtime/ws?sample_rate={}&token={}",
            self.config.sample_rate, self.config.api_key
        )
    }

    /// Runs the adapter until the client disconnects or the provider closes
    /// the connection. `audio_rx` carries raw PCM frames from Audio
    /// Ingress; `event_tx` receives `SttEvent`s for the session controller
    /// to turn into client-facing events.
    pub async fn run(
        mut self,
        mut audio_rx: mpsc::Receiver<Vec<u8>>,
        event_tx: mpsc::Sender<SttEvent>,
    ) -> Result<(), PipelineError> {
        let url = self.connect_url();
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| PipelineError::SttTransport(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let _ = event_tx.send(SttEvent::SessionBegin).await;

        let mut total_audio_bytes: u64 = 0;
        loop {
            tokio::select! {
                biased;

                frame = audio_rx.recv() => {
                    match frame {
                        Some(bytes) => {
                            total_audio_bytes += bytes.len() as u64;
                            if let Err(e) = write.send(WsMessage::Binary(bytes)).await {
                                warn!(error = %e, "failed to forward audio to stt");
                                let _ = event_tx.send(SttEvent::Error(e.to_string())).await;
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(WsMessage::Text("{\"terminate_session\":true}".into())).await;
                            break;
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.handle_text(&text, &event_tx).await;
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "stt transport error");
                            let _ = event_tx.send(SttEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                }
            }
        }

        let sample_rate = self.config.sample_rate.max(1) as u64;
        let total_audio_duration_ms = (total_audio_bytes * 1000) / (sample_rate * 2);
        let _ = event_tx
            .send(SttEvent::SessionTerminated { total_audio_duration_ms })
            .await;
        Ok(())
    }

    async fn handle_text(&mut self, text: &str, event_tx: &mpsc::Sender<SttEvent>) {
        let parsed: WireTranscript = match serde_json::from_str(text) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "ignoring unparseable stt frame");
                return;
            }
        };

        if !parsed.end_of_turn {
            if !parsed.text.trim().is_empty() {
                let _ = event_tx
                    .send(SttEvent::Partial { text: parsed.text })
                    .await;
            }
            return;
        }

        if parsed.confidence > 0.0 && parsed.confidence < self.config.end_of_turn_confidence_threshold {
            return;
        }

        let decision = self.detector.on_end_of_turn(&parsed.text, Instant::now());
        let event = match decision {
            MergeDecision::NewTurn { turn_number, text } => {
                Some(SttEvent::NewTurn { turn_number, text })
            }
            MergeDecision::PunctuationUpdate { turn_number, text } => {
                Some(SttEvent::PunctuationUpdate { turn_number, text })
            }
            MergeDecision::Duplicate | MergeDecision::Empty => None,
        };

        if let Some(event) = event {
            let _ = event_tx.send(event).await;
        }
    }
}
