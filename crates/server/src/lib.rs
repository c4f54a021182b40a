//! HTTP/WebSocket surface for the voice-agent orchestrator: session
//! lifecycle, the websocket Session Controller and Audio Ingress, and the
//! small HTTP surface around them.

pub mod http;
pub mod session;
pub mod state;
pub mod websocket;

pub use state::AppState;
