//! AMQP-backed queue variant.
//!
//! Envelopes are published as JSON to a named queue; a consumer task decodes
//! deliveries and forwards them onto the same output channel the in-process
//! queue uses, so the rest of the pipeline cannot tell the variants apart.
//! Consumption is auto-ack: an envelope lost in flight across a crash is
//! acceptable because the store's restore scan re-seeds unfinished orders.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::mpsc;

use crate::model::QueueOrder;

use super::queue::OrderQueue;

pub struct BrokerQueue {
    /// Held so the connection outlives the channel.
    _conn: Connection,
    channel: Channel,
    queue: String,
}

impl BrokerQueue {
    /// Connect, declare the queue and start the consumer task delivering
    /// onto `output`.
    pub async fn open(
        url: &str,
        name: &str,
        output: mpsc::Sender<QueueOrder>,
    ) -> Result<Arc<Self>, lapin::Error> {
        let conn = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = conn.create_channel().await?;

        channel
            .queue_declare(name, QueueDeclareOptions::default(), FieldTable::default())
            .await?;

        let mut consumer = channel
            .basic_consume(
                name,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let queue_name = name.to_string();
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => match serde_json::from_slice::<QueueOrder>(&delivery.data) {
                        Ok(order) => {
                            if output.send(order).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(queue = %queue_name, "discarding malformed envelope: {e}");
                        }
                    },
                    Err(e) => {
                        tracing::error!(queue = %queue_name, "consumer error: {e}");
                        break;
                    }
                }
            }
            tracing::debug!(queue = %queue_name, "broker consumer stopped");
        });

        tracing::info!(queue = %name, "broker queue ready");
        Ok(Arc::new(Self {
            _conn: conn,
            channel,
            queue: name.to_string(),
        }))
    }
}

#[async_trait]
impl OrderQueue for BrokerQueue {
    async fn push(&self, order: QueueOrder) {
        let payload = match serde_json::to_vec(&order) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(order = order.number, "failed to encode envelope: {e}");
                return;
            }
        };

        if let Err(e) = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
        {
            tracing::error!(queue = %self.queue, order = order.number, "publish failed: {e}");
        }
    }

    fn close(&self) {
        let channel = self.channel.clone();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.close(200, "shutdown").await {
                tracing::warn!(queue = %queue, "channel close failed: {e}");
            }
        });
    }
}
