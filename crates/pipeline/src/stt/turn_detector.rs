use std::time::Duration;

use voice_agent_core::LastTurn;

/// Outcome of applying the punctuation-merge rule to a new end-of-turn
/// transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// A genuinely new turn: caller should increment the turn counter and
    /// start a reply pipeline.
    NewTurn { turn_number: u64, text: String },
    /// A re-issue of the current turn's transcript, differing only in
    /// punctuation/casing, that arrived inside the merge window: caller
    /// should update the stored final transcript but not start a reply
    /// pipeline.
    PunctuationUpdate { turn_number: u64, text: String },
    /// Identical to the last transcript: nothing to do.
    Duplicate,
    /// Transcript was empty/whitespace-only: nothing to do.
    Empty,
}

/// Pure, I/O-free state machine implementing the punctuation-merge rule
/// (see component design for the Turn Detector). Kept separate from the
/// WebSocket-driving `SttSession` so the merge law can be unit tested
/// without any networking.
pub struct TurnDetector {
    last_turn: LastTurn,
    turn_counter: u64,
    merge_window: Duration,
}

impl TurnDetector {
    pub fn new(merge_window: Duration) -> Self {
        Self {
            last_turn: LastTurn::default(),
            turn_counter: 0,
            merge_window,
        }
    }

    pub fn turn_counter(&self) -> u64 {
        self.turn_counter
    }

    /// Apply the rule to a freshly-arrived end-of-turn transcript, using
    /// `now` as the current instant so tests can control timing precisely.
    pub fn on_end_of_turn(&mut self, text: &str, now: std::time::Instant) -> MergeDecision {
        if text.trim().is_empty() {
            return MergeDecision::Empty;
        }

        let normalized = voice_agent_core::normalize(text);

        if !self.last_turn.is_empty() {
            let within_window = self
                .last_turn
                .at
                .map(|at| now.saturating_duration_since(at) < self.merge_window)
                .unwrap_or(false);

            if within_window && normalized == self.last_turn.normalized {
                if text == self.last_turn.raw {
                    return MergeDecision::Duplicate;
                }
                self.last_turn.raw = text.to_string();
                self.last_turn.at = Some(now);
                return MergeDecision::PunctuationUpdate {
                    turn_number: self.turn_counter,
                    text: text.to_string(),
                };
            }
        }

        self.turn_counter += 1;
        self.last_turn.update(text);
        MergeDecision::NewTurn {
            turn_number: self.turn_counter,
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn first_transcript_is_a_new_turn() {
        let mut d = TurnDetector::new(Duration::from_secs_f64(2.0));
        let now = Instant::now();
        assert_eq!(
            d.on_end_of_turn("hello", now),
            MergeDecision::NewTurn { turn_number: 1, text: "hello".into() }
        );
        assert_eq!(d.turn_counter(), 1);
    }

    #[test]
    fn punctuation_only_reissue_within_window_merges() {
        let mut d = TurnDetector::new(Duration::from_secs_f64(2.0));
        let t0 = Instant::now();
        d.on_end_of_turn("hello", t0);
        let t1 = t0 + Duration::from_millis(500);
        let decision = d.on_end_of_turn("Hello.", t1);
        assert_eq!(
            decision,
            MergeDecision::PunctuationUpdate { turn_number: 1, text: "Hello.".into() }
        );
        assert_eq!(d.turn_counter(), 1, "merge must not start a new turn");
    }

    #[test]
    fn identical_reissue_is_a_duplicate() {
        let mut d = TurnDetector::new(Duration::from_secs_f64(2.0));
        let t0 = Instant::now();
        d.on_end_of_turn("hello", t0);
        let decision = d.on_end_of_turn("hello", t0 + Duration::from_millis(100));
        assert_eq!(decision, MergeDecision::Duplicate);
        assert_eq!(d.turn_counter(), 1);
    }

    #[test]
    fn same_text_outside_window_is_a_new_turn() {
        let mut d = TurnDetector::new(Duration::from_secs_f64(2.0));
        let t0 = Instant::now();
        d.on_end_of_turn("hello", t0);
        let t1 = t0 + Duration::from_secs_f64(2.5);
        let decision = d.on_end_of_turn("hello", t1);
        assert_eq!(
            decision,
            MergeDecision::NewTurn { turn_number: 2, text: "hello".into() }
        );
        assert_eq!(d.turn_counter(), 2);
    }

    #[test]
    fn whitespace_only_transcript_is_dropped() {
        let mut d = TurnDetector::new(Duration::from_secs_f64(2.0));
        assert_eq!(d.on_end_of_turn("   ", Instant::now()), MergeDecision::Empty);
        assert_eq!(d.turn_counter(), 0);
    }

    #[test]
    fn turn_numbers_stay_dense_across_many_turns() {
        let mut d = TurnDetector::new(Duration::from_secs_f64(2.0));
        let mut t = Instant::now();
        for expected in 1..=5u64 {
            let decision = d.on_end_of_turn(&format!("turn {expected}"), t);
            assert_eq!(
                decision,
                MergeDecision::NewTurn { turn_number: expected, text: format!("turn {expected}") }
            );
            t += Duration::from_secs(5);
        }
    }
}
