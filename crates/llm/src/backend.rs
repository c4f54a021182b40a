use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{FinishReason, Message, StreamChunk};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

/// Vendor-neutral streaming capability: the reply pipeline talks to this
/// trait, never to a concrete provider. Mirrors the teacher's `LlmBackend`
/// trait boundary between `voice-agent-llm`'s adapter and its concrete
/// backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate_stream(
        &self,
        system_persona: &str,
        history: &[Message],
        user_text: &str,
    ) -> Result<ChunkStream, LlmError>;

    fn model_name(&self) -> &str;
}

/// A generic HTTP backend speaking a streaming chat-completions-shaped API:
/// POST a JSON body with `stream: true`, receive newline-delimited JSON
/// chunks each carrying an incremental `delta`. This is the "abstract
/// streaming capability" the orchestrator is built against; swapping in a
/// concrete vendor means implementing `LlmBackend`, not touching the
/// pipeline.
pub struct HttpStreamingLlmBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    delta: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl HttpStreamingLlmBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn build_request_body(&self, system_persona: &str, history: &[Message], user_text: &str) -> serde_json::Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(serde_json::json!({ "role": "system", "content": system_persona }));
        for m in history {
            messages.push(serde_json::json!({ "role": m.role_str(), "content": m.content }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": user_text }));

        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": true,
        })
    }

    async fn open_stream(&self, body: &serde_json::Value) -> Result<reqwest::Response, LlmError> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Provider { status, body: text });
        }
        Ok(resp)
    }
}

#[async_trait]
impl LlmBackend for HttpStreamingLlmBackend {
    async fn generate_stream(
        &self,
        system_persona: &str,
        history: &[Message],
        user_text: &str,
    ) -> Result<ChunkStream, LlmError> {
        let body = self.build_request_body(system_persona, history, user_text);

        let mut attempt = 0u32;
        let mut backoff = self.config.initial_backoff;
        let resp = loop {
            match self.open_stream(&body).await {
                Ok(resp) => break resp,
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "retrying llm connection after backoff");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        };

        let mut byte_stream = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut buf = Vec::new();
            while let Some(next) = byte_stream.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(LlmError::Request(e));
                        return;
                    }
                };
                buf.extend_from_slice(&bytes);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = &line[..line.len().saturating_sub(1)];
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<WireChunk>(line) {
                        Ok(wire) => {
                            debug!(len = wire.delta.len(), done = wire.done, "llm chunk");
                            let finish_reason = wire.finish_reason.as_deref().map(|r| match r {
                                "length" => FinishReason::Length,
                                "error" => FinishReason::Error,
                                _ => FinishReason::Stop,
                            });
                            let done = wire.done;
                            yield Ok(StreamChunk { delta: wire.delta, done, finish_reason });
                            if done {
                                return;
                            }
                        }
                        Err(e) => {
                            yield Err(LlmError::StreamClosed(e.to_string()));
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

impl Message {
    fn role_str(&self) -> &'static str {
        match self.role {
            crate::types::Role::System => "system",
            crate::types::Role::User => "user",
            crate::types::Role::Assistant => "assistant",
        }
    }
}
