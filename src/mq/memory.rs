//! In-memory default `MessageQueue`: a bounded mpsc channel, so a wedged
//! event pump applies backpressure to publishers instead of letting memory
//! grow without limit.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{MessageQueue, SubmitEvent};

const QUEUE_CAPACITY: usize = 1024;

pub struct MemoryQueue {
    tx: mpsc::Sender<SubmitEvent>,
    rx: Mutex<Option<mpsc::Receiver<SubmitEvent>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn publish(&self, event: SubmitEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("memory queue closed: {e}"))
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<SubmitEvent>> {
        self.rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("memory queue already has a subscriber"))
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
