//! The broker contract consumed by NATS-backed transports and the server,
//! plus a deterministic in-memory double used by this crate's own tests
//! and by the client/server crates' integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::error::{FrugalError, Result, TransportErrorKind};

/// A message delivered to a subject subscription.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// The subject the message was published to.
    pub subject: String,
    /// The subject the recipient should publish a reply to, if any.
    pub reply_to: Option<String>,
    /// The message body.
    pub data: Bytes,
}

/// An opaque subscription id returned by `subscribe`.
pub type SubscriptionId = u64;

/// The broker capability set consumed by NATS-backed transports and the
/// server. Implemented in production by a thin wrapper over `async-nats`;
/// implemented for tests by [`MockBroker`].
#[async_trait]
pub trait NatsClient: Send + Sync {
    /// Connect to the broker. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Whether the client currently holds a live connection.
    async fn is_connected(&self) -> bool;

    /// Subscribe to `subject`, optionally as part of queue group `queue`
    /// (empty string = no group), delivering messages to the returned
    /// channel. Returns a subscription id usable with `unsubscribe`.
    async fn subscribe(
        &self,
        subject: &str,
        queue: &str,
    ) -> Result<(SubscriptionId, mpsc::Receiver<BrokerMessage>)>;

    /// Cancel a subscription.
    async fn unsubscribe(&self, sid: SubscriptionId) -> Result<()>;

    /// Publish `data` to `subject`, optionally requesting replies be sent
    /// to `reply_to`.
    async fn publish(&self, subject: &str, data: Bytes, reply_to: Option<&str>) -> Result<()>;

    /// Flush any buffered outbound messages, ensuring prior `publish`
    /// calls have reached the broker.
    async fn flush(&self) -> Result<()>;

    /// Close the connection, releasing all subscriptions.
    async fn close(&self) -> Result<()>;

    /// Generate a globally unique inbox subject for this client.
    fn new_inbox(&self) -> String;
}

struct Subscription {
    subject: String,
    sender: mpsc::Sender<BrokerMessage>,
}

/// An in-process broker double reproducing NATS's request/reply and
/// subject-matching semantics (exact-match only; no wildcard subjects)
/// without a network dependency. Used by this workspace's own tests.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<Mutex<MockBrokerState>>,
    connected: Arc<std::sync::atomic::AtomicBool>,
    next_sid: Arc<AtomicU64>,
    next_inbox: Arc<AtomicU64>,
}

#[derive(Default)]
struct MockBrokerState {
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// Construct a fresh, disconnected broker double.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockBrokerState::default())),
            connected: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            next_sid: Arc::new(AtomicU64::new(1)),
            next_inbox: Arc::new(AtomicU64::new(1)),
        }
    }
}

#[async_trait]
impl NatsClient for MockBroker {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(
        &self,
        subject: &str,
        _queue: &str,
    ) -> Result<(SubscriptionId, mpsc::Receiver<BrokerMessage>)> {
        if !self.is_connected().await {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::NotOpen,
                message: "broker is not connected".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(64);
        let sid = self.next_sid.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state.subscriptions.insert(
            sid,
            Subscription {
                subject: subject.to_string(),
                sender: tx,
            },
        );
        Ok((sid, rx))
    }

    async fn unsubscribe(&self, sid: SubscriptionId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.subscriptions.remove(&sid);
        Ok(())
    }

    async fn publish(&self, subject: &str, data: Bytes, reply_to: Option<&str>) -> Result<()> {
        if !self.is_connected().await {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::NotOpen,
                message: "broker is not connected".to_string(),
            });
        }
        let state = self.state.lock().await;
        for sub in state.subscriptions.values() {
            if sub.subject == subject {
                let message = BrokerMessage {
                    subject: subject.to_string(),
                    reply_to: reply_to.map(ToString::to_string),
                    data: data.clone(),
                };
                // A full or closed receiver is a slow/gone subscriber, not
                // a broker failure.
                let _ = sub.sender.try_send(message);
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.state.lock().await.subscriptions.clear();
        Ok(())
    }

    fn new_inbox(&self) -> String {
        let n = self.next_inbox.fetch_add(1, Ordering::SeqCst);
        format!("_INBOX.{n:016x}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_matching_subscribers_only() {
        let broker = MockBroker::new();
        broker.connect().await.unwrap();

        let (_sid_a, mut rx_a) = broker.subscribe("foo", "").await.unwrap();
        let (_sid_b, mut rx_b) = broker.subscribe("bar", "").await.unwrap();

        broker
            .publish("foo", Bytes::from_static(b"hello"), Some("_INBOX.1"))
            .await
            .unwrap();

        let msg = rx_a.try_recv().unwrap();
        assert_eq!(msg.subject, "foo");
        assert_eq!(msg.reply_to.as_deref(), Some("_INBOX.1"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = MockBroker::new();
        broker.connect().await.unwrap();
        let (sid, mut rx) = broker.subscribe("foo", "").await.unwrap();
        broker.unsubscribe(sid).await.unwrap();
        broker.publish("foo", Bytes::from_static(b"x"), None).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_before_connect_fails() {
        let broker = MockBroker::new();
        let err = broker.publish("foo", Bytes::new(), None).await.unwrap_err();
        assert!(matches!(
            err,
            FrugalError::Transport { kind: TransportErrorKind::NotOpen, .. }
        ));
    }

    #[test]
    fn new_inbox_is_unique_per_call() {
        let broker = MockBroker::new();
        let a = broker.new_inbox();
        let b = broker.new_inbox();
        assert_ne!(a, b);
    }
}
