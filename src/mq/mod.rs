//! Message queue: publish/subscribe of accepted-submission events between
//! the submit validator and the event pump.

pub mod memory;
#[cfg(feature = "rabbitmq")]
pub mod rabbit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryQueue;

/// Emitted on every accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEvent {
    pub username: String,
    pub time: DateTime<Utc>,
}

/// Publish/subscribe of accepted-submission events. A single publisher
/// (the submit validator) and a single logical subscriber (the event pump)
/// are all this system needs, but the trait allows multiple subscribers
/// since that's how the in-memory and RabbitMQ backends both naturally
/// work.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, event: SubmitEvent) -> anyhow::Result<()>;

    /// Subscribe and receive events until the queue is closed. Returns a
    /// receiver the caller polls; there is exactly one consumer in this
    /// system (the event pump), so a simple channel suffices.
    async fn subscribe(&self) -> anyhow::Result<tokio::sync::mpsc::Receiver<SubmitEvent>>;

    /// Best-effort close; used during shutdown with retries.
    async fn close(&self) -> anyhow::Result<()>;
}
