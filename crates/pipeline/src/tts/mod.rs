pub mod streaming;

pub use streaming::{TtsEvent, TtsSession};
