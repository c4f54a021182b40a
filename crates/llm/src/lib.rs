//! Streaming language-model capability used by the reply pipeline: a
//! vendor-neutral backend trait, an HTTP/NDJSON implementation of it, and a
//! thin adapter the pipeline crate depends on.

pub mod adapter;
pub mod backend;
pub mod error;
pub mod types;

pub use adapter::{mock, LanguageModelAdapter};
pub use backend::{ChunkStream, HttpStreamingLlmBackend, LlmBackend, LlmConfig};
pub use error::LlmError;
pub use types::{FinishReason, Message, Role, StreamChunk};
