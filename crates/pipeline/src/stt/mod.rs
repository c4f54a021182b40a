pub mod streaming;
pub mod turn_detector;

pub use streaming::{SttEvent, SttSession};
pub use turn_detector::{MergeDecision, TurnDetector};
