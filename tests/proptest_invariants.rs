//! Property tests (via `proptest`) for the job history's core invariants
//! across arbitrary rotation counts and pruning windows.

use std::time::{Duration, Instant};

use kupool::job::JobHistory;
use proptest::prelude::*;

proptest! {
    #[test]
    fn job_ids_stay_monotonic_across_any_rotation_count(n in 1usize..200) {
        let mut history = JobHistory::new();
        let mut previous = 0u64;
        for _ in 0..n {
            let record = history.rotate(kupool::crypto::random_hex_id(), Instant::now());
            prop_assert_eq!(record.job_id, previous + 1);
            previous = record.job_id;
        }
    }

    #[test]
    fn pruning_never_removes_entries_within_the_window(
        keep_count in 1usize..20,
        window_secs in 1u64..100,
    ) {
        let mut history = JobHistory::new();
        let now = Instant::now();
        for _ in 0..keep_count {
            history.rotate(kupool::crypto::random_hex_id(), now);
        }
        let pruned = history.prune_older_than(now, Duration::from_secs(window_secs));
        prop_assert!(pruned.is_empty());
        prop_assert_eq!(history.len(), keep_count);
    }
}
