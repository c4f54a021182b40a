//! Shared domain types for the voice-agent workspace: events, turns, and
//! history. No I/O lives here.

pub mod events;
pub mod history;
pub mod turn;

pub use events::ServerEvent;
pub use history::{HistoryEntry, Role};
pub use turn::{normalize, LastTurn, Turn};
