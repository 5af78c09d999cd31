//! Session table: the thread-safe registry of live connections, keyed by
//! channel ID, plus the per-session mutable state it guards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex, RwLock};

pub type ChannelId = String;

/// Bound on the per-connection outbound queue (broadcaster pushes + submit
/// responses share this channel via the connection's writer task).
pub const PUSH_QUEUE_CAPACITY: usize = 64;

/// Mutable fields guarded by the session's own lock. Held for the full
/// duration of submit validation so the replay/rate-limit checks and their
/// commit are atomic, rather than just the fields' individual reads and
/// writes.
#[derive(Debug, Default)]
pub struct SessionState {
    pub latest_job_id: Option<u64>,
    pub latest_server_nonce: Option<String>,
    pub last_submit_at: Option<Instant>,
    /// jobID -> client nonces already spent under that job, for this session.
    pub used_nonces: HashMap<u64, HashSet<String>>,
}

/// A single live, authorized connection.
pub struct Session {
    pub channel_id: ChannelId,
    pub username: String,
    /// Encoded frame bytes ready to write; owned by this connection's
    /// writer task, shared here so the broadcaster and the submit handler
    /// can both push onto it.
    pub push_tx: mpsc::Sender<Vec<u8>>,
    pub state: Mutex<SessionState>,
}

impl Session {
    fn new(channel_id: ChannelId, username: String, push_tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            channel_id,
            username,
            push_tx,
            state: Mutex::new(SessionState::default()),
        }
    }
}

/// The coordinator's registry of live sessions.
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<ChannelId, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authorized session. Returns the shared handle the
    /// caller's per-connection task should drive for the life of the socket.
    pub async fn register(
        &self,
        channel_id: ChannelId,
        username: String,
        push_tx: mpsc::Sender<Vec<u8>>,
    ) -> Arc<Session> {
        let session = Arc::new(Session::new(channel_id.clone(), username, push_tx));
        self.sessions
            .write()
            .await
            .insert(channel_id, Arc::clone(&session));
        session
    }

    /// Remove a session on disconnect. Idempotent.
    pub async fn unregister(&self, channel_id: &str) {
        self.sessions.write().await.remove(channel_id);
    }

    pub async fn get(&self, channel_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(channel_id).cloned()
    }

    /// Point-in-time snapshot of all live sessions, for broadcast fan-out.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
