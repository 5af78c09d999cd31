//! Durable state persistence: optional crash-recovery adapter. The system
//! is correct without it — losing state means clients re-authorize, history
//! starts empty, and the replay window resets.

pub mod sqlite;

use async_trait::async_trait;
use std::time::SystemTime;

pub use sqlite::SqliteStateStore;

#[derive(Debug, Clone)]
pub struct PersistedJob {
    pub job_id: u64,
    pub server_nonce: String,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone)]
pub struct PersistedUserState {
    pub username: String,
    pub latest_job_id: u64,
    pub latest_server_nonce: String,
    pub last_submit_at: SystemTime,
}

/// The state persistence adapter. Every method here is invoked on a
/// best-effort basis — callers
/// log and swallow errors, never propagate them to a client response.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_job(&self, job_id: u64, server_nonce: &str, created_at: SystemTime) -> anyhow::Result<()>;
    async fn save_used_nonce(&self, username: &str, job_id: u64, client_nonce: &str) -> anyhow::Result<()>;
    async fn save_user_state(&self, state: &PersistedUserState) -> anyhow::Result<()>;

    async fn load_latest_job(&self) -> anyhow::Result<Option<PersistedJob>>;
    async fn load_job_history(&self, window: std::time::Duration) -> anyhow::Result<Vec<PersistedJob>>;

    async fn close(&self) -> anyhow::Result<()>;
}
