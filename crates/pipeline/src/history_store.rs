use std::collections::HashMap;

use parking_lot::Mutex;
use voice_agent_core::HistoryEntry;

/// Per-session conversation history, mutated only at the end of a
/// successful turn. The map itself is guarded by one lock for
/// insert/lookup; each session's entry is written only by that session's
/// reply pipeline, so there is no contention on the entry itself beyond the
/// map lookup.
#[derive(Default)]
pub struct HistoryStore {
    sessions: Mutex<HashMap<String, Vec<HistoryEntry>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the session's history as of the call. Safe to use as
    /// the context for an in-flight LLM call even if another turn for a
    /// different session mutates the map concurrently.
    pub fn snapshot(&self, session_id: &str) -> Vec<HistoryEntry> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn append_exchange(&self, session_id: &str, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        let mut sessions = self.sessions.lock();
        let entries = sessions.entry(session_id.to_string()).or_default();
        entries.push(HistoryEntry::user(user_text));
        entries.push(HistoryEntry::assistant(assistant_text));
    }

    pub fn remove_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::Role;

    #[test]
    fn history_alternates_user_assistant() {
        let store = HistoryStore::new();
        store.append_exchange("s1", "hi", "hello");
        store.append_exchange("s1", "how are you", "great thanks");

        let snap = store.snapshot("s1");
        assert_eq!(snap.len(), 4);
        assert_eq!(snap[0].role, Role::User);
        assert_eq!(snap[1].role, Role::Assistant);
        assert_eq!(snap[2].role, Role::User);
        assert_eq!(snap[3].role, Role::Assistant);
    }

    #[test]
    fn unknown_session_snapshot_is_empty() {
        let store = HistoryStore::new();
        assert!(store.snapshot("missing").is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let store = HistoryStore::new();
        store.append_exchange("a", "1", "2");
        assert!(store.snapshot("b").is_empty());
        assert_eq!(store.snapshot("a").len(), 2);
    }
}
