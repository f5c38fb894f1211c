//! The client transport contract shared by every concrete transport.

use async_trait::async_trait;
use bytes::Bytes;
use frugal_core::error::{FrugalError, Result, TransportErrorKind};
use frugal_proto::Context;

/// Common capability set shared by every client transport: open/close
/// lifecycle, size preflight, and the oneway/request send paths.
#[async_trait]
pub trait BaseTransport: Send + Sync {
    /// Whether the transport is currently open.
    async fn is_open(&self) -> bool;

    /// Open the transport. Fails with `AlreadyOpen` if already open.
    async fn open(&self) -> Result<()>;

    /// Close the transport. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Send `payload` without expecting a reply.
    async fn oneway(&self, ctx: &Context, payload: Bytes) -> Result<()>;

    /// Send `payload` and await the reply, honoring `ctx`'s timeout.
    async fn request(&self, ctx: &mut Context, payload: Bytes) -> Result<Bytes>;

    /// The maximum outbound payload this transport will accept, or 0 for
    /// unbounded.
    fn request_capacity(&self) -> usize {
        0
    }

    /// Fail with `MessageTooLarge` if `payload` exceeds `request_capacity`.
    fn preflight_check(&self, payload: &[u8]) -> Result<()> {
        let capacity = self.request_capacity();
        if capacity != 0 && payload.len() > capacity {
            return Err(FrugalError::MessageTooLarge {
                size: payload.len(),
                limit: capacity,
            });
        }
        Ok(())
    }
}

/// Remap a raw broker/IO error string into a [`FrugalError::Transport`]
/// with kind `Unknown`, following the convention used throughout this
/// crate for wrapping foreign error types at the transport boundary.
pub(crate) fn wrap_unknown(message: impl Into<String>) -> FrugalError {
    FrugalError::Transport {
        kind: TransportErrorKind::Unknown,
        message: message.into(),
    }
}
