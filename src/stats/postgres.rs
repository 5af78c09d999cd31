//! Optional PostgreSQL-backed `StatsStore`, for deployments that already
//! run Postgres elsewhere and would rather not stand up a second storage
//! engine just for per-minute counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{truncate_to_minute, StatsStore};

pub struct PostgresStats {
    pool: PgPool,
}

impl PostgresStats {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS submission_counts (
                username TEXT NOT NULL,
                minute TIMESTAMPTZ NOT NULL,
                count BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (username, minute)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StatsStore for PostgresStats {
    async fn increment(&self, username: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
        let minute = truncate_to_minute(at);
        sqlx::query(
            "INSERT INTO submission_counts (username, minute, count)
             VALUES ($1, $2, 1)
             ON CONFLICT (username, minute) DO UPDATE SET count = submission_counts.count + 1",
        )
        .bind(username)
        .bind(minute)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, username: &str, minute: DateTime<Utc>) -> anyhow::Result<u64> {
        let minute = truncate_to_minute(minute);
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT count FROM submission_counts WHERE username = $1 AND minute = $2",
        )
        .bind(username)
        .bind(minute)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(c,)| c as u64).unwrap_or(0))
    }
}
