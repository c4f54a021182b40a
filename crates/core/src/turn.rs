use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logical exchange within a session: one user utterance and the
/// assistant's reply to it. `turn_number` is dense and strictly increasing
/// within a session, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_number: u64,
    pub user_text: String,
    #[serde(default)]
    pub assistant_text: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn new(turn_number: u64, user_text: impl Into<String>) -> Self {
        Self {
            turn_number,
            user_text: user_text.into(),
            assistant_text: String::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }
}

/// Tracking state for the punctuation-merge rule: the last end-of-turn
/// transcript observed on an STT connection, kept so a near-immediate
/// re-issue that differs only in punctuation/casing can be merged into the
/// same turn instead of starting a new one.
#[derive(Debug, Clone, Default)]
pub struct LastTurn {
    pub raw: String,
    pub normalized: String,
    pub at: Option<std::time::Instant>,
}

impl LastTurn {
    pub fn update(&mut self, raw: impl Into<String>) {
        let raw = raw.into();
        self.normalized = normalize(&raw);
        self.raw = raw;
        self.at = Some(std::time::Instant::now());
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Lowercase, strip ASCII punctuation, and trim. Used both sides of the
/// punctuation-merge comparison so `"hello"` and `"Hello."` compare equal.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("Hello."), normalize("hello"));
        assert_eq!(normalize("What's up?"), normalize("whats up"));
    }

    #[test]
    fn turn_numbers_start_at_one() {
        let t = Turn::new(1, "hi");
        assert_eq!(t.turn_number, 1);
        assert!(t.end_time.is_none());
    }
}
