//! The coordinator: owns the session table, the job history, and wires the
//! generator, broadcaster, and submit validator to the external
//! collaborators (MQ, state store).

pub mod broadcast;
pub mod jobs;
pub mod submit;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::warn;

use crate::job::JobHistory;
use crate::metrics::PoolMetrics;
use crate::mq::MessageQueue;
use crate::session::SessionTable;
use crate::state::StateStore;

pub use submit::{validate, SubmitOutcome};

/// Tunables carried from the CLI/env layer.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub interval: Duration,
    /// `Duration::ZERO` disables expiration.
    pub expire_after: Duration,
    pub history_window: Duration,
}

pub struct Coordinator {
    pub config: CoordinatorConfig,
    pub sessions: SessionTable,
    pub history: RwLock<JobHistory>,
    pub mq: Arc<dyn MessageQueue>,
    pub state: Option<Arc<dyn StateStore>>,
    pub metrics: Arc<PoolMetrics>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        mq: Arc<dyn MessageQueue>,
        state: Option<Arc<dyn StateStore>>,
        metrics: Arc<PoolMetrics>,
    ) -> Self {
        Self {
            config,
            sessions: SessionTable::new(),
            history: RwLock::new(JobHistory::new()),
            mq,
            state,
            metrics,
        }
    }

    /// Restore job history and the job ID counter from the durable adapter,
    /// if one is configured. Missing entries yield zero values and are not
    /// errors — the in-memory path is authoritative regardless.
    pub async fn restore(&self) {
        let Some(state) = &self.state else { return };

        let latest = match state.load_latest_job().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, "failed to load latest job from state store, starting fresh");
                return;
            }
        };
        let history = match state.load_job_history(self.config.history_window).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "failed to load job history from state store, starting fresh");
                Vec::new()
            }
        };

        let last_job_id = latest.map(|j| j.job_id).unwrap_or(0);
        let records = history
            .into_iter()
            .map(|j| crate::job::JobRecord {
                job_id: j.job_id,
                server_nonce: j.server_nonce,
                created_at: instant_from_system_time(j.created_at),
            })
            .collect();

        self.history.write().await.seed(records, last_job_id);
    }
}

/// Best-effort mapping from the durable adapter's `SystemTime` stamps to
/// this process's monotonic `Instant` clock: anchor both clocks "now" and
/// offset backward by the wall-clock age. Good enough for expiration/window
/// checks immediately after a restart; drifts no worse than the wall clock
/// drifts across a single process lifetime.
fn instant_from_system_time(t: std::time::SystemTime) -> std::time::Instant {
    let age = std::time::SystemTime::now()
        .duration_since(t)
        .unwrap_or_default();
    tokio::time::Instant::now()
        .checked_sub(age)
        .unwrap_or_else(tokio::time::Instant::now)
        .into_std()
}
