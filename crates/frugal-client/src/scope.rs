//! NATS scope publisher/subscriber transports (§4.7.3).

use std::sync::Arc;

use bytes::Bytes;
use frugal_core::broker::NatsClient;
use frugal_core::error::{FrugalError, Result, TransportErrorKind};
use frugal_proto::{header, Context, FramedOutputBuffer};
use tracing::debug;

use crate::nats_transport::NATS_MAX_MESSAGE_SIZE;

const SCOPE_PREFIX: &str = "frugal.";

fn scoped_subject(topic: &str) -> String {
    format!("{SCOPE_PREFIX}{topic}")
}

/// Publishes events to a scope topic, prefixed with `frugal.`.
pub struct NatsScopePublisherTransport {
    broker: Arc<dyn NatsClient>,
}

impl NatsScopePublisherTransport {
    /// Wrap a connected broker client.
    #[must_use]
    pub fn new(broker: Arc<dyn NatsClient>) -> Self {
        Self { broker }
    }

    /// Publish `payload` under `ctx`'s headers to `topic`.
    pub async fn publish(&self, ctx: &Context, topic: &str, payload: &[u8]) -> Result<()> {
        if !self.broker.is_connected().await {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::NotOpen,
                message: "broker is not connected".to_string(),
            });
        }

        let mut buf = FramedOutputBuffer::new(NATS_MAX_MESSAGE_SIZE);
        let header_bytes = header::encode(ctx.request_headers());
        buf.write(&header_bytes)?;
        buf.write(payload)?;
        let frame = buf.finish();

        self.broker
            .publish(&scoped_subject(topic), Bytes::from(frame), None)
            .await
    }
}

/// Delivers `(Context, event_bytes)` pairs decoded from a scope topic.
pub type ScopeCallback = Arc<dyn Fn(Context, Bytes) + Send + Sync>;

/// Subscribes to a scope topic, prefixed with `frugal.`, optionally joining
/// a queue group.
pub struct NatsScopeSubscriberTransport {
    broker: Arc<dyn NatsClient>,
}

impl NatsScopeSubscriberTransport {
    /// Wrap a connected broker client.
    #[must_use]
    pub fn new(broker: Arc<dyn NatsClient>) -> Self {
        Self { broker }
    }

    /// Subscribe to `topic` (queue group `queue`, empty = no group),
    /// invoking `callback` for each decoded event. The broker is flushed
    /// before returning to ensure the subscription is active.
    pub async fn subscribe(&self, topic: &str, queue: &str, callback: ScopeCallback) -> Result<()> {
        let subject = scoped_subject(topic);
        let (_sid, mut rx) = self.broker.subscribe(&subject, queue).await?;
        self.broker.flush().await?;

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if message.data.len() < 4 {
                    debug!("dropping undersized scope event");
                    continue;
                }
                let body = &message.data[4..];
                match header::decode(body, 0) {
                    Ok((headers, consumed)) => {
                        let mut ctx = Context::new(headers.get("_cid").cloned());
                        for (key, value) in &headers {
                            ctx.set_request_header(key.clone(), value.clone());
                        }
                        let event = Bytes::copy_from_slice(&body[consumed..]);
                        callback(ctx, event);
                    }
                    Err(err) => {
                        debug!(%err, "dropping malformed scope event");
                    }
                }
            }
        });

        Ok(())
    }
}
