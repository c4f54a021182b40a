use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use voice_agent_core::ServerEvent;

/// One connected client. Holds the handles the session controller needs to
/// tear the session down cleanly: the channel audio ingress feeds into the
/// STT adapter, and the background tasks spawned for this connection.
pub struct Session {
    pub id: String,
    pub created_at: Instant,
    pub audio_tx: mpsc::Sender<Vec<u8>>,
    pub outbound_tx: mpsc::Sender<ServerEvent>,
    cancel: CancellationToken,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl Session {
    pub fn new(id: String, audio_tx: mpsc::Sender<Vec<u8>>, outbound_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            audio_tx,
            outbound_tx,
            cancel: CancellationToken::new(),
            tasks: RwLock::new(Vec::new()),
        }
    }

    pub fn track(&self, handle: JoinHandle<()>) {
        self.tasks.write().push(handle);
    }

    /// A clone of this session's cancellation token, for tasks (or the
    /// audio-ingress loop) that need to notice a fatal failure elsewhere in
    /// the session without waiting for the client to disconnect.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Marks this session as done without waiting for a client disconnect,
    /// e.g. when the STT adapter fails or the upstream provider terminates
    /// the transcript stream. Any task selecting on `cancel_token()` wakes
    /// up; `shutdown()` still does the actual task teardown.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels every background task owned by this session. Idempotent:
    /// aborting an already-finished `JoinHandle` is a no-op.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        for handle in self.tasks.write().drain(..) {
            handle.abort();
        }
    }
}

/// Registry of live sessions, keyed by session id. A thin layer over a
/// lock-guarded map; most of the interesting lifecycle logic lives on
/// `Session` itself and in the websocket handler that owns one.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        info!(session_id = %session.id, "session registered");
        self.sessions.write().insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) {
        if let Some(session) = self.sessions.write().remove(id) {
            session.shutdown();
            info!(session_id = %id, "session removed");
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let manager = SessionManager::new();
        let (audio_tx, _audio_rx) = mpsc::channel(1);
        let (outbound_tx, _outbound_rx) = mpsc::channel(1);
        let session = Arc::new(Session::new("s1".into(), audio_tx, outbound_tx));
        manager.insert(session);

        assert!(manager.get("s1").is_some());
        assert_eq!(manager.active_count(), 1);

        manager.remove("s1");
        assert!(manager.get("s1").is_none());
        assert_eq!(manager.active_count(), 0);
    }
}
