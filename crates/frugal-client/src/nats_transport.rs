//! Stateless NATS request/reply transport (§4.7.1).

#![allow(clippy::expect_used, reason = "mutex poisoning should cause a panic")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use frugal_core::broker::NatsClient;
use frugal_core::error::{FrugalError, Result, TransportErrorKind};
use frugal_core::registry::Registry;
use frugal_proto::{Context, FramedOutputBuffer};
use tracing::{debug, warn};

use crate::transport::{wrap_unknown, BaseTransport};

/// Maximum payload NATS will carry for a single message, matching the
/// broker's own default. Used to size server-side output buffers and to
/// bound client-side preflight checks.
pub const NATS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// A client transport that publishes requests to a fixed subject and
/// receives replies on a private inbox subject, subscribed once at `open`
/// time and shared by every in-flight request via the [`Registry`].
pub struct NatsRequestTransport {
    broker: Arc<dyn NatsClient>,
    registry: Registry,
    subject: String,
    request_capacity: usize,
    open: AtomicBool,
    inbox: std::sync::Mutex<Option<String>>,
    sid: std::sync::Mutex<Option<frugal_core::broker::SubscriptionId>>,
}

impl NatsRequestTransport {
    /// Construct a transport publishing to `subject`, bounding outbound
    /// payloads by `request_capacity` (0 = unbounded).
    #[must_use]
    pub fn new(broker: Arc<dyn NatsClient>, subject: impl Into<String>, request_capacity: usize) -> Self {
        Self {
            broker,
            registry: Registry::new(),
            subject: subject.into(),
            request_capacity,
            open: AtomicBool::new(false),
            inbox: std::sync::Mutex::new(None),
            sid: std::sync::Mutex::new(None),
        }
    }

    /// The registry backing this transport's in-flight calls. Exposed so
    /// generated client methods can register/unregister contexts per
    /// §4.10.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn build_frame(&self, ctx: &Context, payload: &[u8]) -> Result<Bytes> {
        let mut buf = FramedOutputBuffer::new(0);
        let header = frugal_proto::header::encode(ctx.request_headers());
        buf.write(&header)?;
        buf.write(payload)?;
        Ok(Bytes::from(buf.finish()))
    }
}

#[async_trait]
impl BaseTransport for NatsRequestTransport {
    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<()> {
        if self.is_open().await {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::AlreadyOpen,
                message: "NATS request transport is already open".to_string(),
            });
        }
        if !self.broker.is_connected().await {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::NotOpen,
                message: "broker is not connected".to_string(),
            });
        }

        let inbox = self.broker.new_inbox();
        let (sid, mut rx) = self.broker.subscribe(&inbox, "").await?;
        *self.inbox.lock().expect("mutex poisoned") = Some(inbox.clone());
        *self.sid.lock().expect("mutex poisoned") = Some(sid);
        self.open.store(true, Ordering::SeqCst);

        let registry = self.registry.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if message.data.len() < 4 {
                    warn!("dropping undersized inbox message");
                    continue;
                }
                let body = &message.data[4..];
                if let Err(err) = registry.execute(body).await {
                    warn!(%err, "failed to route inbox reply");
                }
            }
        });

        debug!(subject = %self.subject, inbox = %inbox, "opened NATS request transport");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let sid = self.sid.lock().expect("mutex poisoned").take();
        if let Some(sid) = sid {
            self.broker.unsubscribe(sid).await?;
        }
        self.broker.flush().await?;
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn oneway(&self, ctx: &Context, payload: Bytes) -> Result<()> {
        self.preflight_check(&payload)?;
        let frame = self.build_frame(ctx, &payload)?;
        self.broker
            .publish(&self.subject, frame, None)
            .await
            .map_err(|err| match err {
                FrugalError::Transport { kind, message } => FrugalError::Transport { kind, message },
                other => wrap_unknown(other.to_string()),
            })
    }

    async fn request(&self, ctx: &mut Context, payload: Bytes) -> Result<Bytes> {
        self.preflight_check(&payload)?;
        if !self.is_open().await {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::NotOpen,
                message: "NATS request transport is not open".to_string(),
            });
        }

        let inbox = self
            .inbox
            .lock()
            .expect("mutex poisoned")
            .clone()
            .ok_or_else(|| wrap_unknown("transport open but inbox missing"))?;

        let rx = self.registry.register(ctx).await?;
        let frame = self.build_frame(ctx, &payload)?;
        self.broker.publish(&self.subject, frame, Some(&inbox)).await?;

        let timeout_ms = ctx.timeout_ms();
        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await;
        self.registry.unregister(ctx).await;

        match result {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(wrap_unknown("reply channel dropped before completion")),
            Err(_) => Err(FrugalError::Timeout { timeout_ms }),
        }
    }

    fn request_capacity(&self) -> usize {
        self.request_capacity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use frugal_core::broker::MockBroker;

    async fn connected_broker() -> Arc<dyn NatsClient> {
        let broker = MockBroker::new();
        broker.connect().await.unwrap();
        Arc::new(broker)
    }

    #[tokio::test]
    async fn open_twice_fails_with_already_open() {
        let broker = connected_broker().await;
        let transport = NatsRequestTransport::new(broker, "foo", 0);
        transport.open().await.unwrap();
        let err = transport.open().await.unwrap_err();
        assert!(matches!(
            err,
            FrugalError::Transport { kind: TransportErrorKind::AlreadyOpen, .. }
        ));
    }

    #[tokio::test]
    async fn request_before_open_fails_not_open() {
        let broker = connected_broker().await;
        let transport = NatsRequestTransport::new(broker, "foo", 0);
        let mut ctx = Context::new(None);
        let err = transport.request(&mut ctx, Bytes::new()).await.unwrap_err();
        assert!(matches!(
            err,
            FrugalError::Transport { kind: TransportErrorKind::NotOpen, .. }
        ));
    }

    #[tokio::test]
    async fn preflight_rejects_oversized_payload() {
        let broker = connected_broker().await;
        let transport = NatsRequestTransport::new(broker, "foo", 4);
        let err = transport.preflight_check(b"too big").unwrap_err();
        assert!(matches!(err, FrugalError::MessageTooLarge { .. }));
    }

    #[tokio::test]
    async fn request_times_out_when_no_reply_arrives() {
        let broker = connected_broker().await;
        let transport = NatsRequestTransport::new(broker, "foo", 0);
        transport.open().await.unwrap();

        let mut ctx = Context::new(None);
        ctx.set_timeout_ms(20);
        let err = transport.request(&mut ctx, Bytes::from_static(b"ping")).await.unwrap_err();
        assert!(matches!(err, FrugalError::Timeout { .. }));
        assert!(transport.registry().is_empty().await);
    }
}
