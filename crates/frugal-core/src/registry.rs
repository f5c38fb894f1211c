//! Operation-id allocation, callback parking, and reply dispatch.
//!
//! One [`Registry`] is owned by one client transport. Its op id counter is
//! per-instance, not process-global: this keeps live registrations from
//! one transport from colliding with another's, and removes the need for
//! any process-wide synchronization.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use frugal_proto::{header, Context};
use tokio::sync::{oneshot, Mutex};
use tracing::{trace, warn};

use crate::error::{FrugalError, Result};

/// The sending half of a one-shot completion, fulfilled exactly once when
/// a matching reply arrives. This plays the role the distilled design
/// calls a "callback": firing is observably identical to invoking a
/// callback once.
pub type ReplySender = oneshot::Sender<Bytes>;

struct Entry {
    sender: ReplySender,
}

/// Routes replies to the caller that registered the matching operation id.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<u64, Entry>>>,
    next_op_id: Arc<AtomicU64>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Construct an empty registry with its own op id counter, starting
    /// at 1 (0 is reserved to mean "unregistered").
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_op_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register `ctx` for reply delivery, returning the receiving half of
    /// the completion that will be fulfilled with the reply's body (the
    /// frame bytes following the header block).
    ///
    /// Fails with [`FrugalError::ContextAlreadyRegistered`] if `ctx`'s
    /// current op id is still live in this registry.
    pub async fn register(&self, ctx: &mut Context) -> Result<oneshot::Receiver<Bytes>> {
        let mut map = self.inner.lock().await;
        if ctx.op_id() != 0 && map.contains_key(&ctx.op_id()) {
            return Err(FrugalError::ContextAlreadyRegistered { op_id: ctx.op_id() });
        }

        let op_id = self.next_op_id.fetch_add(1, Ordering::SeqCst);
        ctx.set_op_id(op_id);

        let (tx, rx) = oneshot::channel();
        map.insert(op_id, Entry { sender: tx });
        Ok(rx)
    }

    /// Remove `ctx`'s registration, if any. Absence is a no-op.
    pub async fn unregister(&self, ctx: &Context) {
        let mut map = self.inner.lock().await;
        map.remove(&ctx.op_id());
    }

    /// Decode the header block from `frame`, look up `_opid`, and deliver
    /// the remaining bytes to the matching registration. A frame with no
    /// matching registration is dropped silently (the caller may already
    /// have timed out and unregistered). A frame with no `_opid` header at
    /// all is a protocol error.
    pub async fn execute(&self, frame: &[u8]) -> Result<()> {
        let (headers, consumed) = header::decode(frame, 0)?;
        let op_id: u64 = headers
            .get("_opid")
            .ok_or(frugal_proto::ProtocolError::MissingHeader { key: "_opid" })?
            .parse()
            .map_err(|_| frugal_proto::ProtocolError::InvalidData {
                reason: "_opid header is not a valid integer".to_string(),
            })?;

        let entry = {
            let mut map = self.inner.lock().await;
            map.remove(&op_id)
        };

        match entry {
            Some(entry) => {
                trace!(op_id, "dispatching reply to registered caller");
                let body = Bytes::copy_from_slice(&frame[consumed..]);
                // A dropped receiver (caller already timed out) is not an
                // error: the reply simply has nowhere to go.
                let _ = entry.sender.send(body);
            }
            None => {
                warn!(op_id, "no registration for incoming reply, dropping");
            }
        }
        Ok(())
    }

    /// Number of live registrations. Intended for tests asserting
    /// quiescence.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the registry has no live registrations.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assigns_strictly_increasing_op_ids() {
        let registry = Registry::new();
        let mut seen = Vec::new();
        for _ in 0..5 {
            let mut ctx = Context::new(None);
            let _rx = registry.register(&mut ctx).await.unwrap();
            seen.push(ctx.op_id());
        }
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted);
        assert_eq!(seen.iter().collect::<std::collections::HashSet<_>>().len(), seen.len());
    }

    #[tokio::test]
    async fn routes_reply_to_the_matching_registration() {
        let registry = Registry::new();
        let mut ctx = Context::new(None);
        let rx = registry.register(&mut ctx).await.unwrap();

        let mut reply_headers = header::Headers::new();
        reply_headers.insert("_opid".to_string(), ctx.op_id().to_string());
        let mut frame = header::encode(&reply_headers);
        frame.extend_from_slice(b"reply-body");

        registry.execute(&frame).await.unwrap();
        let body = rx.await.unwrap();
        assert_eq!(&body[..], b"reply-body");
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn unmatched_opid_is_dropped_silently() {
        let registry = Registry::new();
        let mut reply_headers = header::Headers::new();
        reply_headers.insert("_opid".to_string(), "9999".to_string());
        let frame = header::encode(&reply_headers);

        registry.execute(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_registration_of_a_live_context_fails() {
        let registry = Registry::new();
        let mut ctx = Context::new(None);
        let _rx = registry.register(&mut ctx).await.unwrap();

        let err = registry.register(&mut ctx).await.unwrap_err();
        assert!(matches!(err, FrugalError::ContextAlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn unregister_is_a_no_op_when_absent() {
        let registry = Registry::new();
        let ctx = Context::new(None);
        registry.unregister(&ctx).await;
    }

    #[tokio::test]
    async fn missing_opid_header_is_a_protocol_error() {
        let registry = Registry::new();
        let empty = header::Headers::new();
        let frame = header::encode(&empty);
        let err = registry.execute(&frame).await.unwrap_err();
        assert!(matches!(err, FrugalError::Protocol(_)));
    }

    #[tokio::test]
    async fn concurrent_registrations_each_see_a_distinct_op_id() {
        let registry = Registry::new();
        let mut handles = Vec::new();
        for _ in 0..100 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let mut ctx = Context::new(None);
                let _rx = registry.register(&mut ctx).await.unwrap();
                ctx.op_id()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(registry.len().await, 100);
    }
}
