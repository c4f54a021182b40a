use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use voice_agent_config::TtsConfig;

const WAV_HEADER_BYTES: usize = 44;

/// Events surfaced by a single turn's TTS session.
#[derive(Debug, Clone)]
pub enum TtsEvent {
    /// Decoded (and, for the first chunk of the turn, header-stripped) PCM
    /// bytes, base64 re-encoded for the client.
    Audio { audio_data: String },
    /// Fired exactly once per turn, however completion was detected.
    Complete { total_chunks: u64 },
    Error(String),
}

#[derive(Serialize)]
struct VoiceConfigMsg<'a> {
    voice_config: VoiceConfigBody<'a>,
}

#[derive(Serialize)]
struct VoiceConfigBody<'a> {
    #[serde(rename = "voiceId")]
    voice_id: &'a str,
    style: &'a str,
    rate: i32,
    pitch: i32,
    variation: i32,
}

#[derive(Serialize)]
struct TextChunkMsg<'a> {
    text: &'a str,
    end: bool,
}

#[derive(Deserialize, Default)]
struct WireAudioMsg {
    #[serde(default)]
    audio: String,
    #[serde(default, rename = "final")]
    final_flag: bool,
}

/// One turn's worth of streaming text-to-speech. A fresh instance is
/// created per turn, which is what makes the WAV-header elision below a
/// per-turn property rather than a single process-wide flag that only ever
/// fires once for the life of the connection.
pub struct TtsSession {
    config: TtsConfig,
    first_chunk: bool,
    chunks_sent: u64,
}

impl TtsSession {
    pub fn new(config: TtsConfig) -> Self {
        Self {
            config,
            first_chunk: true,
            chunks_sent: 0,
        }
    }

    fn connect_url(&self) -> String {
        format!(
            "{}?api-key={}&sample_rate={}&channel_type={}&format={}",
            self.config.endpoint,
            self.config.api_key,
            self.config.sample_rate,
            self.config.channel_type,
            self.config.audio_format
        )
    }

    /// Drives one turn end to end: connects, sends the voice config frame,
    /// then consumes `text_rx` for fragments to synthesize (closing with
    /// `end: true` on the final one) while forwarding decoded audio and the
    /// completion pair to `event_tx`. `voice_id` is resolved by the caller
    /// (request override, else the configured default).
    pub async fn run(
        mut self,
        voice_id: String,
        mut text_rx: mpsc::Receiver<(String, bool)>,
        event_tx: mpsc::Sender<TtsEvent>,
    ) -> Result<(), PipelineError> {
        let url = self.connect_url();
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| PipelineError::TtsTransport(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let voice_config = VoiceConfigMsg {
            voice_config: VoiceConfigBody {
                voice_id: &voice_id,
                style: &self.config.style,
                rate: self.config.rate,
                pitch: self.config.pitch,
                variation: self.config.variation,
            },
        };
        write
            .send(WsMessage::Text(serde_json::to_string(&voice_config).unwrap()))
            .await
            .map_err(|e| PipelineError::TtsTransport(e.to_string()))?;

        let silence_timeout = Duration::from_millis(self.config.silence_timeout_ms);
        let mut completed = false;
        let mut deadline: Option<Instant> = None;
        let mut text_done = false;

        loop {
            let sleep = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                text = text_rx.recv(), if !text_done => {
                    match text {
                        Some((fragment, end)) => {
                            let msg = TextChunkMsg { text: &fragment, end };
                            if let Err(e) = write.send(WsMessage::Text(serde_json::to_string(&msg).unwrap())).await {
                                warn!(error = %e, "failed to send text chunk to tts");
                                let _ = event_tx.send(TtsEvent::Error(e.to_string())).await;
                                break;
                            }
                        }
                        None => {
                            // Text producer dropped without an explicit end marker; nothing
                            // more to send, but keep draining audio until completion fires.
                            text_done = true;
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            let wire: WireAudioMsg = match serde_json::from_str(&text) {
                                Ok(w) => w,
                                Err(e) => { debug!(error = %e, "ignoring unparseable tts frame"); continue; }
                            };
                            if !wire.audio.is_empty() {
                                self.emit_audio(&wire.audio, &event_tx).await;
                                deadline = Some(Instant::now() + silence_timeout);
                            }
                            if wire.final_flag {
                                self.complete(&event_tx, &mut completed).await;
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "tts transport error");
                            let _ = event_tx.send(TtsEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                }

                _ = sleep, if deadline.is_some() => {
                    info!("tts silence timeout elapsed, synthesizing completion");
                    self.complete(&event_tx, &mut completed).await;
                    break;
                }
            }
        }

        if !completed {
            self.complete(&event_tx, &mut completed).await;
        }

        Ok(())
    }

    async fn emit_audio(&mut self, audio_b64: &str, event_tx: &mpsc::Sender<TtsEvent>) {
        let decoded = match BASE64.decode(audio_b64) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to decode tts audio payload");
                return;
            }
        };

        let payload = if self.first_chunk {
            self.first_chunk = false;
            if decoded.len() > WAV_HEADER_BYTES {
                &decoded[WAV_HEADER_BYTES..]
            } else {
                &decoded[..]
            }
        } else {
            &decoded[..]
        };

        self.chunks_sent += 1;
        let re_encoded = BASE64.encode(payload);
        let _ = event_tx.send(TtsEvent::Audio { audio_data: re_encoded }).await;
    }

    async fn complete(&self, event_tx: &mpsc::Sender<TtsEvent>, completed: &mut bool) {
        if *completed {
            return;
        }
        *completed = true;
        let _ = event_tx
            .send(TtsEvent::Complete { total_chunks: self.chunks_sent })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> TtsConfig {
        TtsConfig {
            endpoint: "wss://example.invalid/stream".into(),
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

    #[test]
    fn wav_header_elided_on_first_chunk_only() {
        let mut session = TtsSession::new(base_config());
        assert!(session.first_chunk);
        let full = vec![0u8; 44 + 10];
        let payload = if session.first_chunk {
            session.first_chunk = false;
            full[44..].to_vec()
        } else {
            full.clone()
        };
        assert_eq!(payload.len(), 10);
        assert!(!session.first_chunk);
    }

    #[test]
    fn each_new_turn_gets_a_fresh_first_chunk_flag() {
        let a = TtsSession::new(base_config());
        let b = TtsSession::new(base_config());
        assert!(a.first_chunk);
        assert!(b.first_chunk, "a second turn's session must not inherit the first turn's state");
    }

    #[test]
    fn wire_audio_msg_deserializes_upstream_final_flag() {
        let wire: WireAudioMsg = serde_json::from_str(r#"{"audio":"abcd","final":true}"#).unwrap();
        assert_eq!(wire.audio, "abcd");
        assert!(wire.final_flag);
    }

    #[tokio::test]
    async fn completion_emitted_exactly_once() {
        let session = TtsSession::new(base_config());
        let (tx, mut rx) = mpsc::channel(8);
        let mut completed = false;
        session.complete(&tx, &mut completed).await;
        session.complete(&tx, &mut completed).await;
        drop(tx);

        let mut count = 0;
        while let Some(ev) = rx.recv().await {
            if matches!(ev, TtsEvent::Complete { .. }) {
                count += 1;
            }
        }
        assert_eq!(count, 1);
    }
}
