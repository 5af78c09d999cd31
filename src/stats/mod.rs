//! Statistics sink: per-(user, minute) accepted-submission counter.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};

pub use memory::MemoryStats;
pub use postgres::PostgresStats;

/// Per-(user, minute) submission counter. Minute buckets are truncated to
/// the start of the minute (seconds/nanos zeroed).
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn increment(&self, username: &str, at: DateTime<Utc>) -> anyhow::Result<()>;
    async fn get(&self, username: &str, minute: DateTime<Utc>) -> anyhow::Result<u64>;
}

/// Truncate a timestamp to the start of its minute.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .expect("zeroing seconds/nanos never overflows a valid timestamp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn truncate_to_minute_zeroes_seconds() {
        let at = Utc.with_ymd_and_hms(2026, 7, 28, 10, 30, 45).unwrap();
        let truncated = truncate_to_minute(at);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2026, 7, 28, 10, 30, 0).unwrap());
    }
}
