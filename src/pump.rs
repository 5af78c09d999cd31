//! Event pump: drains the message queue and increments the stats sink. Uses
//! an ad hoc `tokio::select!` shutdown signal rather than pulling in
//! `tokio-util`'s `CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::mq::MessageQueue;
use crate::stats::StatsStore;

/// Consume events until the queue closes or `shutdown` fires. On shutdown,
/// keeps draining whatever is already buffered for up to `drain_deadline`
/// before returning, per the lifecycle's "drain in-flight events" step.
pub async fn run(
    mq: Arc<dyn MessageQueue>,
    stats: Arc<dyn StatsStore>,
    mut shutdown: watch::Receiver<bool>,
    drain_deadline: Duration,
) {
    let mut rx = match mq.subscribe().await {
        Ok(rx) => rx,
        Err(e) => {
            warn!(error = %e, "event pump failed to subscribe to message queue");
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if let Err(e) = stats.increment(&event.username, event.time).await {
                            warn!(error = %e, username = %event.username, "failed to record submission stat");
                        }
                    }
                    None => return,
                }
            }
        }
    }

    info!("event pump draining in-flight events before exit");
    let _ = tokio::time::timeout(drain_deadline, async {
        while let Some(event) = rx.recv().await {
            if let Err(e) = stats.increment(&event.username, event.time).await {
                warn!(error = %e, username = %event.username, "failed to record submission stat while draining");
            }
        }
    })
    .await;
}
