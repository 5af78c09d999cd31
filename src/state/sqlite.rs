//! SQLite-backed `StateStore` (WAL-mode `SqlitePool`, migrate-on-open).
//! Schema matches the job history, user state, used-nonce, and submission
//! count tables; migrations are embedded as string literals rather than
//! `include_str!`-ed `.sql` files since this crate carries no migrations
//! directory of its own.

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{PersistedJob, PersistedUserState, StateStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS job_history (
    job_id INTEGER PRIMARY KEY,
    server_nonce TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS user_state (
    username TEXT PRIMARY KEY,
    latest_job_id INTEGER NOT NULL,
    latest_server_nonce TEXT NOT NULL,
    last_submit_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS used_nonces (
    username TEXT NOT NULL,
    job_id INTEGER NOT NULL,
    client_nonce TEXT NOT NULL,
    PRIMARY KEY (username, job_id, client_nonce)
);
CREATE TABLE IF NOT EXISTS submission_counts (
    username TEXT NOT NULL,
    minute INTEGER NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (username, minute)
);
";

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn to_unix(t: SystemTime) -> i64 {
        t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
    }

    fn from_unix(secs: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save_job(
        &self,
        job_id: u64,
        server_nonce: &str,
        created_at: SystemTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO job_history (job_id, server_nonce, created_at) VALUES (?, ?, ?)
             ON CONFLICT (job_id) DO UPDATE SET server_nonce = excluded.server_nonce, created_at = excluded.created_at",
        )
        .bind(job_id as i64)
        .bind(server_nonce)
        .bind(Self::to_unix(created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_used_nonce(&self, username: &str, job_id: u64, client_nonce: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO used_nonces (username, job_id, client_nonce) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(job_id as i64)
        .bind(client_nonce)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_user_state(&self, state: &PersistedUserState) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_state (username, latest_job_id, latest_server_nonce, last_submit_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (username) DO UPDATE SET
                latest_job_id = excluded.latest_job_id,
                latest_server_nonce = excluded.latest_server_nonce,
                last_submit_at = excluded.last_submit_at",
        )
        .bind(&state.username)
        .bind(state.latest_job_id as i64)
        .bind(&state.latest_server_nonce)
        .bind(Self::to_unix(state.last_submit_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_latest_job(&self) -> anyhow::Result<Option<PersistedJob>> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT job_id, server_nonce, created_at FROM job_history ORDER BY job_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(job_id, server_nonce, created_at)| PersistedJob {
            job_id: job_id as u64,
            server_nonce,
            created_at: Self::from_unix(created_at),
        }))
    }

    async fn load_job_history(&self, window: Duration) -> anyhow::Result<Vec<PersistedJob>> {
        let cutoff = Self::to_unix(SystemTime::now() - window);
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT job_id, server_nonce, created_at FROM job_history WHERE created_at >= ? ORDER BY job_id ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(job_id, server_nonce, created_at)| PersistedJob {
                job_id: job_id as u64,
                server_nonce,
                created_at: Self::from_unix(created_at),
            })
            .collect())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_latest_job_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = SqliteStateStore::open(path.to_str().unwrap()).await.unwrap();
        store.save_job(1, "aabb", SystemTime::now()).await.unwrap();
        store.save_job(2, "ccdd", SystemTime::now()).await.unwrap();
        let latest = store.load_latest_job().await.unwrap().unwrap();
        assert_eq!(latest.job_id, 2);
        assert_eq!(latest.server_nonce, "ccdd");
    }

    #[tokio::test]
    async fn save_used_nonce_is_idempotent_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = SqliteStateStore::open(path.to_str().unwrap()).await.unwrap();
        store.save_used_nonce("alice", 1, "n1").await.unwrap();
        store.save_used_nonce("alice", 1, "n1").await.unwrap();
    }
}
