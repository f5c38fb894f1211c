//! Base64-wrapped unary HTTP transport (§4.7.2).

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use frugal_core::error::{FrugalError, Result, TransportErrorKind};
use frugal_proto::{Context, FramedOutputBuffer};
use tracing::trace;

use crate::transport::{wrap_unknown, BaseTransport};

const CONTENT_TYPE: &str = "application/x-frugal";
const PAYLOAD_LIMIT_HEADER: &str = "x-frugal-payload-limit";

/// A stateless client transport issuing a single HTTP POST per request,
/// base64-encoding the request and response bodies.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_capacity: usize,
    response_capacity: usize,
}

impl HttpTransport {
    /// Construct a transport posting to `url`. `request_capacity` bounds
    /// outbound payloads (0 = unbounded); `response_capacity`, if nonzero,
    /// is advertised to the server via `x-frugal-payload-limit`.
    #[must_use]
    pub fn new(url: impl Into<String>, request_capacity: usize, response_capacity: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_capacity,
            response_capacity,
        }
    }

    fn build_frame(&self, ctx: &Context, payload: &[u8]) -> Result<Vec<u8>> {
        let mut buf = FramedOutputBuffer::new(0);
        let header = frugal_proto::header::encode(ctx.request_headers());
        buf.write(&header)?;
        buf.write(payload)?;
        Ok(buf.finish())
    }
}

#[async_trait]
impl BaseTransport for HttpTransport {
    async fn is_open(&self) -> bool {
        true
    }

    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn oneway(&self, ctx: &Context, payload: Bytes) -> Result<()> {
        let mut ctx = ctx.clone();
        self.request(&mut ctx, payload).await.map(|_| ())
    }

    async fn request(&self, ctx: &mut Context, payload: Bytes) -> Result<Bytes> {
        self.preflight_check(&payload)?;

        let frame = self.build_frame(ctx, &payload)?;
        let body = BASE64.encode(frame);

        let mut request = self
            .client
            .post(&self.url)
            .header("content-type", CONTENT_TYPE)
            .header("content-transfer-encoding", "base64")
            .header("accept", CONTENT_TYPE)
            .body(body);

        if self.response_capacity != 0 {
            request = request.header(PAYLOAD_LIMIT_HEADER, self.response_capacity.to_string());
        }

        let timeout = Duration::from_millis(ctx.timeout_ms());
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| FrugalError::Transport {
                kind: TransportErrorKind::TimedOut,
                message: format!("HTTP request exceeded {}ms", ctx.timeout_ms()),
            })?
            .map_err(|err| wrap_unknown(err.to_string()))?;

        let status = response.status();
        if status.as_u16() == 413 {
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::ResponseTooLarge,
                message: "server reported response too large".to_string(),
            });
        }
        if status.as_u16() >= 300 {
            let text = response.text().await.unwrap_or_default();
            return Err(FrugalError::Transport {
                kind: TransportErrorKind::Unknown,
                message: format!("HTTP {status}: {text}"),
            });
        }

        let text = response.text().await.map_err(|err| wrap_unknown(err.to_string()))?;
        let decoded = BASE64
            .decode(text.trim())
            .map_err(|err| wrap_unknown(format!("invalid base64 response body: {err}")))?;

        if decoded.len() < 4 {
            return Err(wrap_unknown("HTTP response body shorter than the length prefix"));
        }

        let body = &decoded[4..];
        if body.is_empty() {
            trace!("oneway/empty HTTP reply");
            return Ok(Bytes::new());
        }

        Ok(Bytes::copy_from_slice(body))
    }

    fn request_capacity(&self) -> usize {
        self.request_capacity
    }
}

impl HttpTransport {
    /// Raised by [`Self::request`] when `response_capacity` is nonzero but
    /// absent from configuration; kept as an associated constant so the
    /// 413 path in server implementations can compare against the same
    /// status this transport special-cases.
    pub const RESPONSE_TOO_LARGE_STATUS: u16 = 413;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn is_open_is_always_true() {
        let transport = HttpTransport::new("http://example.invalid/rpc", 0, 0);
        assert!(transport.is_open().await);
        transport.open().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn preflight_rejects_oversized_payload() {
        let transport = HttpTransport::new("http://example.invalid/rpc", 4, 0);
        let err = transport.preflight_check(b"too big").unwrap_err();
        assert!(matches!(err, FrugalError::MessageTooLarge { .. }));
    }
}
