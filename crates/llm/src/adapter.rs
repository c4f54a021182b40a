use std::sync::Arc;

use crate::backend::{ChunkStream, LlmBackend};
use crate::error::LlmError;
use crate::types::Message;

/// Thin wrapper the reply pipeline depends on instead of a concrete
/// backend, the way the teacher's `LanguageModelAdapter` sits between
/// `voice-agent-pipeline` and whichever `LlmBackend` is configured.
/// Today this is a pass-through; it exists as the seam where
/// cross-backend concerns (prompt shaping, response post-processing)
/// would live if a second backend were added.
#[derive(Clone)]
pub struct LanguageModelAdapter {
    backend: Arc<dyn LlmBackend>,
}

impl LanguageModelAdapter {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate_stream(
        &self,
        system_persona: &str,
        history: &[Message],
        user_text: &str,
    ) -> Result<ChunkStream, LlmError> {
        self.backend
            .generate_stream(system_persona, history, user_text)
            .await
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Test fixtures for downstream crates: not behind `#[cfg(test)]` because a
/// dependent crate's own tests need it, and `cfg(test)` is local to the
/// crate being compiled, not its dependents.
pub mod mock {
    use super::*;
    use crate::types::{FinishReason, StreamChunk};
    use async_trait::async_trait;

    /// Deterministic backend for tests: yields the configured fragments in
    /// order, then a final empty `done` chunk.
    pub struct MockBackend {
        pub fragments: Vec<String>,
        pub model: String,
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn generate_stream(
            &self,
            _system_persona: &str,
            _history: &[Message],
            _user_text: &str,
        ) -> Result<ChunkStream, LlmError> {
            let fragments = self.fragments.clone();
            let stream = async_stream::stream! {
                for f in fragments {
                    yield Ok(StreamChunk { delta: f, done: false, finish_reason: None });
                }
                yield Ok(StreamChunk { delta: String::new(), done: true, finish_reason: Some(FinishReason::Stop) });
            };
            Ok(Box::pin(stream))
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn adapter_forwards_backend_stream() {
        let backend = Arc::new(MockBackend {
            fragments: vec!["hello".into(), " world".into()],
            model: "mock-1".into(),
        });
        let adapter = LanguageModelAdapter::new(backend);
        let mut stream = adapter.generate_stream("persona", &[], "hi").await.unwrap();

        let mut accumulated = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            accumulated.push_str(&chunk.delta);
            if chunk.done {
                break;
            }
        }
        assert_eq!(accumulated, "hello world");
        assert_eq!(adapter.model_name(), "mock-1");
    }
}
