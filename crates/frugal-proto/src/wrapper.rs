//! Header-aware wrapper around a [`Protocol`], adding request/response
//! header read/write on message boundaries.

use crate::context::Context;
use crate::error::{ProtocolError, Result};
use crate::header;
use crate::protocol::Protocol;

/// Wraps a codec-level [`Protocol`] with header framing. All struct,
/// field, and scalar operations pass through to the inner protocol
/// unchanged; this type only adds the header read/write operations
/// described in the component design.
pub struct ProtocolWrapper<P> {
    inner: P,
}

impl<P: Protocol> ProtocolWrapper<P> {
    /// Wrap an inner protocol.
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    /// Borrow the inner protocol for struct/field/scalar operations.
    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    /// Consume the wrapper, returning the inner protocol.
    pub fn into_inner(self) -> P {
        self.inner
    }

    /// Encode `ctx`'s request headers and hand the resulting bytes to the
    /// caller to prepend to the outgoing frame.
    pub fn write_request_headers(&self, ctx: &Context) -> Vec<u8> {
        header::encode(ctx.request_headers())
    }

    /// Decode a header block from `frame` at `offset`, constructing a fresh
    /// context from the decoded request headers. The decoded `_opid` is
    /// mirrored into the new context's response headers so a server's
    /// reply will echo it back to the caller.
    pub fn read_request_headers(&self, frame: &[u8], offset: usize) -> Result<(Context, usize)> {
        let (headers, consumed) = header::decode(frame, offset)?;
        let mut ctx = Context::new(headers.get("_cid").cloned());
        for (key, value) in &headers {
            ctx.set_request_header(key.clone(), value.clone());
        }
        if let Some(opid) = headers.get("_opid") {
            let opid: u64 = opid.parse().map_err(|_| ProtocolError::InvalidData {
                reason: "_opid header is not a valid integer".to_string(),
            })?;
            ctx.set_op_id(opid);
            ctx.set_response_header("_opid", opid.to_string());
        } else {
            return Err(ProtocolError::MissingHeader { key: "_opid" });
        }
        if let Some(timeout) = headers.get("_timeout") {
            if let Ok(timeout_ms) = timeout.parse() {
                ctx.set_timeout_ms(timeout_ms);
            }
        }
        Ok((ctx, consumed))
    }

    /// Encode `ctx`'s response headers.
    pub fn write_response_headers(&self, ctx: &Context) -> Vec<u8> {
        header::encode(ctx.response_headers())
    }

    /// Decode a header block from `frame` at `offset`, updating `ctx`'s
    /// response headers in place.
    pub fn read_response_headers(
        &self,
        ctx: &mut Context,
        frame: &[u8],
        offset: usize,
    ) -> Result<usize> {
        let (headers, consumed) = header::decode(frame, offset)?;
        ctx.set_response_headers(headers);
        Ok(consumed)
    }
}
