//! Per-request metadata carried alongside every message.

use crate::header::Headers;

/// Reserved request header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "_cid";
/// Reserved request/response header carrying the operation id.
pub const OP_ID_HEADER: &str = "_opid";
/// Reserved request header carrying the per-call timeout, in milliseconds.
pub const TIMEOUT_HEADER: &str = "_timeout";

/// Default per-call timeout, in milliseconds, used when a context is
/// constructed without one.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

fn is_reserved(key: &str) -> bool {
    matches!(key, CORRELATION_ID_HEADER | OP_ID_HEADER | TIMEOUT_HEADER)
}

/// Per-request context: correlation id, operation id, timeout, and user
/// headers.
///
/// A context is owned by the caller and is not safe for concurrent use by
/// two in-flight calls. It may be reused sequentially.
#[derive(Debug, Clone)]
pub struct Context {
    correlation_id: String,
    op_id: u64,
    timeout_ms: u64,
    request_headers: Headers,
    response_headers: Headers,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Context {
    /// Construct a new context. A falsy (`None` or empty) correlation id
    /// generates a fresh random 128-bit identifier rendered as 32 hex
    /// characters.
    #[must_use]
    pub fn new(correlation_id: Option<String>) -> Self {
        let correlation_id = match correlation_id {
            Some(cid) if !cid.is_empty() => cid,
            _ => generate_correlation_id(),
        };

        let mut request_headers = Headers::new();
        request_headers.insert(CORRELATION_ID_HEADER.to_string(), correlation_id.clone());
        request_headers.insert(TIMEOUT_HEADER.to_string(), DEFAULT_TIMEOUT_MS.to_string());
        request_headers.insert(OP_ID_HEADER.to_string(), "0".to_string());

        Self {
            correlation_id,
            op_id: 0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_headers,
            response_headers: Headers::new(),
        }
    }

    /// The correlation id, fixed at construction time.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The operation id assigned by a registry, or 0 if unregistered.
    #[must_use]
    pub fn op_id(&self) -> u64 {
        self.op_id
    }

    /// Set the operation id and mirror it into the request and response
    /// headers. Called by the registry on registration.
    pub fn set_op_id(&mut self, op_id: u64) {
        self.op_id = op_id;
        self.request_headers
            .insert(OP_ID_HEADER.to_string(), op_id.to_string());
    }

    /// Per-call timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Set the per-call timeout, updating the mirrored header.
    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
        self.request_headers
            .insert(TIMEOUT_HEADER.to_string(), timeout_ms.to_string());
    }

    /// Read a request header. Returns `None` if unset.
    #[must_use]
    pub fn request_header(&self, key: &str) -> Option<&str> {
        self.request_headers.get(key).map(String::as_str)
    }

    /// Set a request header. Writes to reserved keys are silently ignored.
    pub fn set_request_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if is_reserved(&key) {
            return;
        }
        self.request_headers.insert(key, value.into());
    }

    /// All request headers, including the reserved ones.
    #[must_use]
    pub fn request_headers(&self) -> &Headers {
        &self.request_headers
    }

    /// Read a response header. Returns `None` if unset.
    #[must_use]
    pub fn response_header(&self, key: &str) -> Option<&str> {
        self.response_headers.get(key).map(String::as_str)
    }

    /// Set a response header. Writes to reserved keys are silently ignored.
    pub fn set_response_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if is_reserved(&key) {
            return;
        }
        self.response_headers.insert(key, value.into());
    }

    /// All response headers.
    #[must_use]
    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    /// Replace the response headers wholesale, used when decoding a reply's
    /// header block.
    pub fn set_response_headers(&mut self, headers: Headers) {
        self.response_headers = headers;
    }

    /// Duplicate this context's headers but drop the assigned operation id,
    /// so the clone can be registered fresh without colliding with the
    /// original's still-live registration.
    #[must_use]
    pub fn clone_for_reuse(&self) -> Self {
        let mut clone = self.clone();
        clone.set_op_id(0);
        clone
    }
}

fn generate_correlation_id() -> String {
    let mut bytes = [0u8; 16];
    getrandom_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn getrandom_bytes(buf: &mut [u8]) {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(buf);
}
