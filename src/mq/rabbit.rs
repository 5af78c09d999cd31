//! Optional RabbitMQ-backed `MessageQueue`, behind the `rabbitmq` feature.
//! One durable queue; publish and consume each get their own channel.

use async_trait::async_trait;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::mpsc;

use super::{MessageQueue, SubmitEvent};

const QUEUE_NAME: &str = "kupool.submit_events";
const BRIDGE_CAPACITY: usize = 1024;

pub struct RabbitQueue {
    channel: Channel,
    connection: Connection,
}

impl RabbitQueue {
    pub async fn connect(uri: &str) -> anyhow::Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .queue_declare(
                QUEUE_NAME,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Self {
            channel,
            connection,
        })
    }
}

#[async_trait]
impl MessageQueue for RabbitQueue {
    async fn publish(&self, event: SubmitEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&event)?;
        self.channel
            .basic_publish(
                "",
                QUEUE_NAME,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<SubmitEvent>> {
        use futures_util::StreamExt;

        let mut consumer = self
            .channel
            .basic_consume(
                QUEUE_NAME,
                "kupool-event-pump",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        let (tx, rx) = mpsc::channel(BRIDGE_CAPACITY);
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else { continue };
                if let Ok(event) = serde_json::from_slice::<SubmitEvent>(&delivery.data) {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                let _ = delivery.ack(lapin::options::BasicAckOptions::default()).await;
            }
        });
        Ok(rx)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.channel.close(200, "shutdown").await?;
        self.connection.close(200, "shutdown").await?;
        Ok(())
    }
}
