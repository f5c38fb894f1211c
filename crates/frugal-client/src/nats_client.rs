//! A [`NatsClient`] backed by a live `async-nats` connection (§4.7).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use frugal_core::broker::{BrokerMessage, NatsClient, SubscriptionId};
use frugal_core::error::{FrugalError, Result, TransportErrorKind};
use futures_util::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

fn wrap_nats(message: impl std::fmt::Display) -> FrugalError {
    FrugalError::Transport {
        kind: TransportErrorKind::Unknown,
        message: message.to_string(),
    }
}

/// A `NatsClient` that connects to a real NATS server via `async-nats`,
/// forwarding each subscription's messages to its caller on a dedicated
/// task so a slow consumer on one subject cannot stall delivery on
/// another.
pub struct RealNatsClient {
    url: String,
    client: Mutex<Option<async_nats::Client>>,
    forwarders: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
    next_sid: AtomicU64,
    next_inbox: AtomicU64,
}

impl RealNatsClient {
    /// Construct a client that will connect to `url` (e.g.
    /// `nats://127.0.0.1:4222`) on [`NatsClient::connect`].
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Mutex::new(None),
            forwarders: Mutex::new(HashMap::new()),
            next_sid: AtomicU64::new(1),
            next_inbox: AtomicU64::new(1),
        }
    }

    async fn connected_client(&self) -> Result<async_nats::Client> {
        self.client.lock().await.clone().ok_or_else(|| FrugalError::Transport {
            kind: TransportErrorKind::NotOpen,
            message: "NATS client is not connected".to_string(),
        })
    }
}

#[async_trait]
impl NatsClient for RealNatsClient {
    async fn connect(&self) -> Result<()> {
        let client = async_nats::connect(&self.url)
            .await
            .map_err(|err| wrap_nats(format!("failed to connect to {}: {err}", self.url)))?;
        *self.client.lock().await = Some(client);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.client
            .lock()
            .await
            .as_ref()
            .is_some_and(|client| client.connection_state() == async_nats::connection::State::Connected)
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue: &str,
    ) -> Result<(SubscriptionId, mpsc::Receiver<BrokerMessage>)> {
        let client = self.connected_client().await?;
        let mut subscriber = if queue.is_empty() {
            client.subscribe(subject.to_string()).await
        } else {
            client.queue_subscribe(subject.to_string(), queue.to_string()).await
        }
        .map_err(|err| wrap_nats(format!("subscribe to {subject} failed: {err}")))?;

        let (tx, rx) = mpsc::channel(64);
        let sid = self.next_sid.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let broker_message = BrokerMessage {
                    subject: message.subject.to_string(),
                    reply_to: message.reply.map(|reply| reply.to_string()),
                    data: message.payload,
                };
                if tx.send(broker_message).await.is_err() {
                    break;
                }
            }
        });
        self.forwarders.lock().await.insert(sid, handle);
        Ok((sid, rx))
    }

    async fn unsubscribe(&self, sid: SubscriptionId) -> Result<()> {
        if let Some(handle) = self.forwarders.lock().await.remove(&sid) {
            handle.abort();
        }
        Ok(())
    }

    async fn publish(&self, subject: &str, data: Bytes, reply_to: Option<&str>) -> Result<()> {
        let client = self.connected_client().await?;
        let result = match reply_to {
            Some(reply) => client.publish_with_reply(subject.to_string(), reply.to_string(), data).await,
            None => client.publish(subject.to_string(), data).await,
        };
        result.map_err(|err| wrap_nats(format!("publish to {subject} failed: {err}")))
    }

    async fn flush(&self) -> Result<()> {
        let client = self.connected_client().await?;
        client.flush().await.map_err(|err| wrap_nats(format!("flush failed: {err}")))
    }

    async fn close(&self) -> Result<()> {
        for (_, handle) in self.forwarders.lock().await.drain() {
            handle.abort();
        }
        self.client.lock().await.take();
        Ok(())
    }

    fn new_inbox(&self) -> String {
        let n = self.next_inbox.fetch_add(1, Ordering::SeqCst);
        format!("_INBOX.{n:016x}")
    }
}
