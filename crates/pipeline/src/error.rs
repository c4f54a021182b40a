use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stt transport error: {0}")]
    SttTransport(String),

    #[error("tts transport error: {0}")]
    TtsTransport(String),

    #[error(transparent)]
    Llm(#[from] voice_agent_llm::LlmError),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("tts wait timed out after {0:?}")]
    TtsTimeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}
