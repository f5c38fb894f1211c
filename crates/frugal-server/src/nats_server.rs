//! NATS-subscribed server (§4.8).

use std::sync::Arc;

use bytes::Bytes;
use frugal_client::nats_transport::NATS_MAX_MESSAGE_SIZE;
use frugal_core::broker::{BrokerMessage, NatsClient};
use frugal_core::error::Result;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::processor::FBaseProcessor;

/// Subscribes one or more subjects to a [`FBaseProcessor`], publishing
/// replies back to each message's reply subject unless the reply is the
/// oneway/empty sentinel.
pub struct NatsServer {
    broker: Arc<dyn NatsClient>,
    subjects: Vec<String>,
    queue: String,
    processor: Arc<FBaseProcessor>,
    stop: Arc<Notify>,
}

impl NatsServer {
    /// Construct a server dispatching messages on `subjects` (joined by
    /// `queue`, empty = no group) to `processor`.
    #[must_use]
    pub fn new(
        broker: Arc<dyn NatsClient>,
        subjects: Vec<String>,
        queue: impl Into<String>,
        processor: Arc<FBaseProcessor>,
    ) -> Self {
        Self {
            broker,
            subjects,
            queue: queue.into(),
            processor,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Subscribe every configured subject and process messages until
    /// `stop` is called. Each accepted message is dispatched onto its own
    /// spawned task so a slow handler cannot stall delivery of other
    /// in-flight requests on the same subject.
    pub async fn serve(&self) -> Result<()> {
        let mut receivers = Vec::new();
        for subject in &self.subjects {
            let (_sid, rx) = self.broker.subscribe(subject, &self.queue).await?;
            receivers.push(rx);
        }

        let mut tasks = Vec::new();
        for mut rx in receivers {
            let broker = self.broker.clone();
            let processor = self.processor.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    let broker = broker.clone();
                    let processor = processor.clone();
                    tokio::spawn(async move {
                        handle_message(&broker, &processor, message).await;
                    });
                }
            }));
        }

        self.stop.notified().await;
        for task in tasks {
            task.abort();
        }
        Ok(())
    }

    /// Signal `serve` to stop accepting further messages.
    pub fn stop(&self) {
        self.stop.notify_one();
    }
}

#[allow(clippy::expect_used, reason = "length checked just above, so the slice is exactly 4 bytes")]
async fn handle_message(broker: &Arc<dyn NatsClient>, processor: &FBaseProcessor, message: BrokerMessage) {
    let Some(reply_to) = message.reply_to.clone() else {
        debug!(subject = %message.subject, "dropping message with no reply subject");
        return;
    };

    if message.data.len() < 4 {
        warn!(subject = %message.subject, "dropping undersized message");
        return;
    }
    let declared_len =
        u32::from_be_bytes(message.data[0..4].try_into().expect("length checked above")) as usize;
    if declared_len > NATS_MAX_MESSAGE_SIZE - 4 {
        warn!(subject = %message.subject, declared_len, "dropping oversized message");
        return;
    }

    let body = &message.data[4..];
    let out = match processor.process(body, NATS_MAX_MESSAGE_SIZE).await {
        Ok(out) => out,
        Err(err) => {
            warn!(subject = %message.subject, %err, "processor failed, dropping reply");
            return;
        }
    };

    if out.is_oneway_sentinel() {
        debug!(subject = %message.subject, "suppressing reply to oneway call");
        return;
    }

    let framed = out.finish();
    if let Err(err) = broker.publish(&reply_to, Bytes::from(framed), None).await {
        warn!(subject = %message.subject, %err, "failed to publish reply");
    }
}
