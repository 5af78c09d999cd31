//! Job generator: rotates `(jobID, serverNonce)` on a ticker and prunes the
//! history window (`tokio::time::interval` + `tokio::select!` against a
//! shutdown signal).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn};

use super::Coordinator;

/// Run the rotation loop until `shutdown` is signalled. Each tick rotates a
/// fresh job, persists it (best-effort), prunes expired history entries,
/// GCs the matching used-nonce entries from every live session, and
/// broadcasts the new job to all sessions.
pub async fn run(coordinator: Arc<Coordinator>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(coordinator.config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("job generator stopping");
                    return;
                }
            }
            _ = ticker.tick() => {
                rotate_once(&coordinator).await;
            }
        }
    }
}

async fn rotate_once(coordinator: &Coordinator) {
    let server_nonce = crate::crypto::random_hex_id();
    let now = Instant::now();

    let record = {
        let mut history = coordinator.history.write().await;
        history.rotate(server_nonce, now)
    };
    coordinator.metrics.jobs_rotated.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    if let Some(state) = &coordinator.state {
        if let Err(e) = state
            .save_job(record.job_id, &record.server_nonce, std::time::SystemTime::now())
            .await
        {
            warn!(error = %e, job_id = record.job_id, "failed to persist rotated job");
        }
    }

    prune_history(coordinator, now).await;

    super::broadcast::rotate_and_push(coordinator, &record).await;
}

async fn prune_history(coordinator: &Coordinator, now: Instant) {
    if coordinator.config.history_window.is_zero() {
        return;
    }
    let pruned: Vec<u64> = {
        let mut history = coordinator.history.write().await;
        history.prune_older_than(now, coordinator.config.history_window)
    };
    if pruned.is_empty() {
        return;
    }
    for session in coordinator.sessions.snapshot().await {
        let mut state = session.state.lock().await;
        for job_id in &pruned {
            state.used_nonces.remove(job_id);
        }
    }
}
