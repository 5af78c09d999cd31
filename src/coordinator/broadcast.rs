//! Broadcaster: pushes a `job` notification to every live session on each
//! rotation and refreshes each session's cached latest-job fields.

use tracing::warn;

use super::Coordinator;
use crate::job::JobRecord;
use crate::protocol::job_notification;
use crate::transport::encode_binary;

/// Snapshot sessions, encode one `job` payload, and push it to each. Push
/// failures (a full queue — a stalled writer) are non-fatal: logged and
/// otherwise ignored. The session is reaped by its own connection's read
/// loop noticing the dead socket, not by the broadcaster.
pub async fn rotate_and_push(coordinator: &Coordinator, record: &JobRecord) {
    let notification = job_notification(record.job_id, &record.server_nonce);
    let payload = match serde_json::to_vec(&notification) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to encode job notification");
            return;
        }
    };
    let frame = encode_binary(&payload);

    let sessions = coordinator.sessions.snapshot().await;
    for session in sessions {
        {
            let mut state = session.state.lock().await;
            state.latest_job_id = Some(record.job_id);
            state.latest_server_nonce = Some(record.server_nonce.clone());
        }
        if session.push_tx.try_send(frame.clone()).is_err() {
            warn!(channel_id = %session.channel_id, "job push queue full, dropping notification");
            coordinator
                .metrics
                .push_failures
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::metrics::PoolMetrics;
    use crate::mq::MemoryQueue;
    use crate::session::PUSH_QUEUE_CAPACITY;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn test_coordinator() -> Coordinator {
        Coordinator::new(
            CoordinatorConfig {
                interval: Duration::from_millis(200),
                expire_after: Duration::ZERO,
                history_window: Duration::from_secs(3600),
            },
            Arc::new(MemoryQueue::new()),
            None,
            Arc::new(PoolMetrics::new()),
        )
    }

    #[tokio::test]
    async fn push_updates_session_latest_fields_and_delivers_frame() {
        let coordinator = test_coordinator();
        let (tx, mut rx) = tokio::sync::mpsc::channel(PUSH_QUEUE_CAPACITY);
        let session = coordinator
            .sessions
            .register("c1".into(), "alice".into(), tx)
            .await;

        let record = JobRecord {
            job_id: 7,
            server_nonce: "a".repeat(32),
            created_at: Instant::now(),
        };
        rotate_and_push(&coordinator, &record).await;

        let state = session.state.lock().await;
        assert_eq!(state.latest_job_id, Some(7));
        assert_eq!(state.latest_server_nonce.as_deref(), Some("a".repeat(32).as_str()));
        drop(state);

        let frame = rx.try_recv().unwrap();
        assert!(!frame.is_empty());
    }
}
