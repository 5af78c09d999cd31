//! In-memory default `StatsStore`: a mutex-guarded map keyed by
//! (username, truncated minute).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{truncate_to_minute, StatsStore};

#[derive(Default)]
pub struct MemoryStats {
    counts: Mutex<HashMap<(String, DateTime<Utc>), u64>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for MemoryStats {
    async fn increment(&self, username: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
        let key = (username.to_string(), truncate_to_minute(at));
        let mut counts = self.counts.lock().expect("stats mutex poisoned");
        *counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    async fn get(&self, username: &str, minute: DateTime<Utc>) -> anyhow::Result<u64> {
        let key = (username.to_string(), truncate_to_minute(minute));
        let counts = self.counts.lock().expect("stats mutex poisoned");
        Ok(counts.get(&key).copied().unwrap_or(0))
    }
}
