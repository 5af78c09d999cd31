//! CLI surface. Flags layer over `KUP_`-prefixed environment variables via
//! clap's `env` attribute. No TOML config layer — the informative CLI
//! surface is flags + env only.

use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreKind {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MqKind {
    Memory,
    #[value(name = "rabbit")]
    Rabbitmq,
}

#[derive(Debug, Parser)]
#[command(name = "kupool-server", about = "mining-pool-style session/job coordination server")]
pub struct Args {
    /// TCP listen address, e.g. 0.0.0.0:3333.
    #[arg(long, env = "KUP_ADDR", default_value = "0.0.0.0:3333")]
    pub addr: String,

    /// Job rotation interval, in seconds.
    #[arg(long, env = "KUP_INTERVAL", default_value_t = 30)]
    pub interval: u64,

    /// Submission expiration window, in seconds. 0 disables expiration.
    #[arg(long, env = "KUP_EXPIRE", default_value_t = 0)]
    pub expire: u64,

    /// History window, in seconds, bounding how far back a job remains
    /// submittable and how long used-nonce entries are retained.
    #[arg(long, env = "KUP_HISTORY_WINDOW", default_value_t = 600)]
    pub history_window: u64,

    /// Durable/aux store backend.
    #[arg(long, value_enum, env = "KUP_STORE", default_value = "memory")]
    pub store: StoreKind,

    /// Path to the SQLite database file, when `--store sqlite`.
    #[arg(long, env = "KUP_STATE_DB", default_value = "kupool.db")]
    pub state_db: String,

    /// Postgres connection string, when `--store postgres`.
    #[arg(long, env = "KUP_POSTGRES_URL")]
    pub postgres_url: Option<String>,

    /// Message queue backend.
    #[arg(long, value_enum, env = "KUP_MQ", default_value = "memory")]
    pub mq: MqKind,

    /// RabbitMQ AMQP URI, when `--mq rabbit`.
    #[arg(long, env = "KUP_RABBITMQ_URL")]
    pub rabbitmq_url: Option<String>,

    /// Admin HTTP bind address.
    #[arg(long, env = "KUP_ADMIN_ADDR", default_value = "127.0.0.1:8080")]
    pub admin_addr: String,

    /// Tracing filter directive, e.g. `info` or `kupool=debug`.
    #[arg(long, env = "KUP_LOG", default_value = "info")]
    pub log: String,
}

impl Args {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn expire_after(&self) -> Duration {
        Duration::from_secs(self.expire)
    }

    pub fn history_window(&self) -> Duration {
        Duration::from_secs(self.history_window)
    }
}
