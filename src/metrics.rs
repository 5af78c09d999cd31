//! In-process counters exposed as Prometheus text at `/metrics`: plain
//! `AtomicU64`s, no external metrics crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct PoolMetrics {
    pub jobs_rotated: AtomicU64,
    pub submits_accepted: AtomicU64,
    pub submits_rejected: AtomicU64,
    pub push_failures: AtomicU64,
    pub started_at: Instant,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            jobs_rotated: AtomicU64::new(0),
            submits_accepted: AtomicU64::new(0),
            submits_rejected: AtomicU64::new(0),
            push_failures: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn render_prometheus(&self, active_sessions: u64) -> String {
        let uptime = self.started_at.elapsed().as_secs();
        let jobs_rotated = self.jobs_rotated.load(Ordering::Relaxed);
        let submits_accepted = self.submits_accepted.load(Ordering::Relaxed);
        let submits_rejected = self.submits_rejected.load(Ordering::Relaxed);
        let push_failures = self.push_failures.load(Ordering::Relaxed);

        format!(
            "# HELP kupool_uptime_seconds Server uptime in seconds.\n\
             # TYPE kupool_uptime_seconds gauge\n\
             kupool_uptime_seconds {uptime}\n\
             # HELP kupool_active_sessions Current number of authorized sessions.\n\
             # TYPE kupool_active_sessions gauge\n\
             kupool_active_sessions {active_sessions}\n\
             # HELP kupool_jobs_rotated_total Total job rotations since start.\n\
             # TYPE kupool_jobs_rotated_total counter\n\
             kupool_jobs_rotated_total {jobs_rotated}\n\
             # HELP kupool_submits_accepted_total Total accepted submissions since start.\n\
             # TYPE kupool_submits_accepted_total counter\n\
             kupool_submits_accepted_total {submits_accepted}\n\
             # HELP kupool_submits_rejected_total Total rejected submissions since start.\n\
             # TYPE kupool_submits_rejected_total counter\n\
             kupool_submits_rejected_total {submits_rejected}\n\
             # HELP kupool_push_failures_total Total broadcast push failures since start.\n\
             # TYPE kupool_push_failures_total counter\n\
             kupool_push_failures_total {push_failures}\n"
        )
    }
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}
