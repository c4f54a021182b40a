//! The Reply Pipeline and its collaborators: the streaming STT adapter
//! (turn detection + punctuation-merge), the streaming TTS adapter, the
//! rate limiter, and the history store. `orchestrator::ReplyPipeline` is
//! the central subsystem; everything else in this crate exists to support
//! one of its four phases.

pub mod error;
pub mod history_store;
pub mod orchestrator;
pub mod rate_limit;
pub mod stt;
pub mod tts;

pub use error::PipelineError;
pub use history_store::HistoryStore;
pub use orchestrator::ReplyPipeline;
pub use rate_limit::RateLimiter;
pub use stt::{MergeDecision, SttEvent, SttSession, TurnDetector};
pub use tts::{TtsEvent, TtsSession};
