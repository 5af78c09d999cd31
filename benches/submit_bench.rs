//! Throughput benchmark for the submit validator's hot path. Hand-rolled
//! harness (`[[bench]] harness = false`) rather than `criterion`, since
//! this crate otherwise has no use for that dev-dependency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kupool::coordinator::{submit, Coordinator, CoordinatorConfig};
use kupool::crypto::proof_hash;
use kupool::metrics::PoolMetrics;
use kupool::mq::MemoryQueue;
use kupool::session::PUSH_QUEUE_CAPACITY;

const ITERATIONS: usize = 20_000;

fn main() {
    let runtime = tokio::runtime::Runtime::new().expect("build tokio runtime");
    runtime.block_on(async {
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                interval: Duration::from_secs(3600),
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
            .register("bench".into(), "bench-user".into(), tx)
            .await;
        let record = {
            let mut history = coordinator.history.write().await;
            let record = history.rotate("a".repeat(32), Instant::now());
            let mut state = session.state.lock().await;
            state.latest_job_id = Some(record.job_id);
            state.latest_server_nonce = Some(record.server_nonce.clone());
            record
        };

        let start = Instant::now();
        let mut accepted = 0usize;
        for i in 0..ITERATIONS {
            let client_nonce = format!("n{i}");
            let proof = proof_hash(&record.server_nonce, &client_nonce);
            // Every submit after the first on this session hits the rate
            // limit; we're measuring validator throughput, not end-to-end
            // accept rate, so that's expected and fine.
            let outcome = submit::validate(&coordinator, "bench", record.job_id, &client_nonce, &proof).await;
            if outcome.accepted {
                accepted += 1;
            }
        }
        let elapsed = start.elapsed();

        println!(
            "{ITERATIONS} submit() calls in {elapsed:?} ({:.0}/s), {accepted} accepted",
            ITERATIONS as f64 / elapsed.as_secs_f64()
        );
    });
}
