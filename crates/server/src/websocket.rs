use std::sync::Arc;

use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voice_agent_core::ServerEvent;
use voice_agent_pipeline::{ReplyPipeline, SttEvent, SttSession};

use crate::session::Session;
use crate::state::AppState;

/// `GET /ws/:session_id`. `session_id == "new"` asks the controller to
/// mint a fresh id (the common case); any other value is treated as a
/// caller-chosen id, e.g. for a client that wants a predictable identifier
/// in its own logs.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = if session_id == "new" || session_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        session_id
    };
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn handle_socket(socket: WebSocket, session_id: String, state: AppState) {
    info!(session_id = %session_id, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(256);
    let (audio_tx, audio_rx) = mpsc::channel::<Vec<u8>>(256);

    let session = Arc::new(Session::new(session_id.clone(), audio_tx.clone(), outbound_tx.clone()));
    state.sessions.insert(session.clone());
    let cancel = session.cancel_token();

    let _ = outbound_tx
        .send(ServerEvent::ConnectionEstablished {
            session_id: session_id.clone(),
            timestamp: Utc::now(),
        })
        .await;
    let _ = outbound_tx
        .send(ServerEvent::SessionBegin {
            session_id: session_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

    // Single writer to the client socket: every event, regardless of which
    // task produced it, is serialized in FIFO order through this channel.
    let writer_handle = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            debug!(event_type = event.kind(), "emitting event");
            let payload = match serde_json::to_string(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "failed to serialize event");
                    continue;
                }
            };
            if ws_tx.send(AxumMessage::Text(payload)).await.is_err() {
                break;
            }
        }
    });
    session.track(writer_handle);

    let (stt_event_tx, mut stt_event_rx) = mpsc::channel::<SttEvent>(256);
    let stt_session = SttSession::new(state.settings.stt.clone());
    let session_for_stt_failure = session.clone();
    let stt_handle = tokio::spawn(async move {
        if let Err(e) = stt_session.run(audio_rx, stt_event_tx).await {
            warn!(error = %e, "stt session ended with error");
            // The client has no way to notice a dead STT leg on its own
            // (it would just keep sending audio into a void), so tear the
            // whole session down rather than waiting for it to disconnect.
            session_for_stt_failure.cancel();
        }
    });
    session.track(stt_handle);

    let pipeline = Arc::new(ReplyPipeline::new(
        session_id.clone(),
        state.llm.clone(),
        state.settings.llm.clone(),
        state.settings.tts.clone(),
        state.rate_limiter.clone(),
        state.history.clone(),
    ));

    let pipeline_for_events = pipeline.clone();
    let outbound_for_stt = outbound_tx.clone();
    let session_for_stt = session.clone();
    let dispatch_handle = tokio::spawn(async move {
        while let Some(event) = stt_event_rx.recv().await {
            match event {
                SttEvent::SessionBegin => {}
                SttEvent::Partial { text } => {
                    let _ = outbound_for_stt
                        .send(ServerEvent::PartialTranscript { text, timestamp: Utc::now() })
                        .await;
                }
                SttEvent::NewTurn { turn_number, text } => {
                    let _ = outbound_for_stt
                        .send(ServerEvent::TurnCompleted {
                            turn_number,
                            text: text.clone(),
                            timestamp: Utc::now(),
                        })
                        .await;
                    let _ = outbound_for_stt
                        .send(ServerEvent::FinalTranscript {
                            turn_number,
                            text: text.clone(),
                            timestamp: Utc::now(),
                        })
                        .await;

                    let pipeline = pipeline_for_events.clone();
                    let emit = outbound_for_stt.clone();
                    let turn_handle = tokio::spawn(async move {
                        pipeline.run_turn(turn_number, text, emit).await;
                    });
                    session_for_stt.track(turn_handle);
                }
                SttEvent::PunctuationUpdate { turn_number, text } => {
                    let _ = outbound_for_stt
                        .send(ServerEvent::TurnUpdated {
                            turn_number,
                            final_transcript: text,
                            timestamp: Utc::now(),
                        })
                        .await;
                }
                SttEvent::SessionTerminated { total_audio_duration_ms } => {
                    let _ = outbound_for_stt
                        .send(ServerEvent::SessionTerminated {
                            total_audio_duration_ms,
                            timestamp: Utc::now(),
                        })
                        .await;
                    session_for_stt.cancel();
                    break;
                }
                SttEvent::Error(message) => {
                    let _ = outbound_for_stt
                        .send(ServerEvent::Error { message, timestamp: Utc::now() })
                        .await;
                }
            }
        }
    });
    session.track(dispatch_handle);

    // Audio ingress: backpressure comes from awaiting `send` rather than
    // dropping frames when the STT adapter's channel is full. Also watches
    // the session's cancellation token so a fatal STT failure or an
    // upstream-terminated transcript stream tears the connection down
    // instead of leaving it waiting on a client that will never hear back.
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(session_id = %session_id, "session cancelled, closing client connection");
                break;
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(AxumMessage::Binary(bytes))) => {
                        if audio_tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(AxumMessage::Text(text))) => {
                        if let Ok(decoded) = BASE64.decode(text.trim()) {
                            if audio_tx.send(decoded).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(AxumMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "client read error");
                        break;
                    }
                }
            }
        }
    }

    info!(session_id = %session_id, "client disconnected, tearing down session");
    state.sessions.remove(&session_id);
}
