//! Ordered startup and graceful shutdown of every long-running component.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::coordinator::Coordinator;

const PUMP_DRAIN_DEADLINE: Duration = Duration::from_secs(10);
const TRANSPORT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);
const CLOSE_RETRIES: u32 = 3;
const CLOSE_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownStatus {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub pump_drained: bool,
    pub transport_drained: bool,
    pub mq_close_errors: u32,
    pub state_close_errors: u32,
}

/// Runs the accept loop, job generator, and event pump to completion, and
/// on shutdown signal drives the matching ordered shutdown. Returns the
/// recorded [`ShutdownStatus`] once every component has stopped.
pub async fn run(
    coordinator: Arc<Coordinator>,
    stats: Arc<dyn crate::stats::StatsStore>,
    addr: String,
    shutdown_status_tx: watch::Sender<Option<ShutdownStatus>>,
    mut external_shutdown: watch::Receiver<bool>,
) -> ShutdownStatus {
    let start = Utc::now();

    coordinator.restore().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pump_handle = tokio::spawn(crate::pump::run(
        Arc::clone(&coordinator.mq),
        Arc::clone(&stats),
        shutdown_rx.clone(),
        PUMP_DRAIN_DEADLINE,
    ));

    let jobs_handle = tokio::spawn(crate::coordinator::jobs::run(
        Arc::clone(&coordinator),
        shutdown_rx.clone(),
    ));

    let accept_coordinator = Arc::clone(&coordinator);
    let accept_addr = addr.clone();
    let accept_shutdown_rx = shutdown_rx.clone();
    let accept_handle = tokio::spawn(async move {
        crate::server::run(accept_coordinator, &accept_addr, accept_shutdown_rx).await
    });

    info!(%addr, "kupool server started");

    // Wait for an external shutdown signal (e.g. SIGINT/SIGTERM in main.rs).
    let _ = external_shutdown.changed().await;

    info!("shutdown requested, draining components");
    let _ = shutdown_tx.send(true);

    let pump_drained = tokio::time::timeout(PUMP_DRAIN_DEADLINE, pump_handle)
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    let _ = jobs_handle.await;

    let mq_close_errors = close_with_retries(|| {
        let mq = Arc::clone(&coordinator.mq);
        async move { mq.close().await }
    })
    .await;

    let state_close_errors = if let Some(state) = coordinator.state.clone() {
        close_with_retries(|| {
            let state = Arc::clone(&state);
            async move { state.close().await }
        })
        .await
    } else {
        0
    };

    let transport_drained = tokio::time::timeout(TRANSPORT_SHUTDOWN_DEADLINE, accept_handle)
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);

    let end = Utc::now();
    let status = ShutdownStatus {
        started_at: start,
        ended_at: end,
        duration_ms: (end - start).num_milliseconds().max(0) as u64,
        pump_drained,
        transport_drained,
        mq_close_errors,
        state_close_errors,
    };
    let _ = shutdown_status_tx.send(Some(status.clone()));
    info!(?status, "shutdown complete");
    status
}

async fn close_with_retries<F, Fut>(mut close: F) -> u32
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    let mut errors = 0;
    for attempt in 1..=CLOSE_RETRIES {
        match close().await {
            Ok(()) => return errors,
            Err(e) => {
                errors += 1;
                warn!(attempt, error = %e, "close failed, retrying");
                if attempt < CLOSE_RETRIES {
                    tokio::time::sleep(CLOSE_BACKOFF).await;
                }
            }
        }
    }
    errors
}
