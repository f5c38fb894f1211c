//! Error taxonomy shared by every transport, server, and processor.

use thiserror::Error;

/// A method-level error carried back to the caller on the wire, as
/// opposed to a local transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationExceptionKind {
    /// An unclassified handler failure.
    Unknown,
    /// The requested method name is not registered on the processor.
    UnknownMethod,
    /// The handler rejected the call due to rate limiting.
    RateLimitExceeded,
    /// The handler's reply exceeded the response size limit.
    ResponseTooLarge,
}

impl std::fmt::Display for ApplicationExceptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ResponseTooLarge => "RESPONSE_TOO_LARGE",
        };
        f.write_str(s)
    }
}

/// A sub-kind of [`FrugalError::Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The transport has not been opened.
    NotOpen,
    /// The transport is already open.
    AlreadyOpen,
    /// The call exceeded its deadline.
    TimedOut,
    /// The reply exceeded the receiver's size limit.
    ResponseTooLarge,
    /// Any other broker or I/O failure.
    Unknown,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotOpen => "NOT_OPEN",
            Self::AlreadyOpen => "ALREADY_OPEN",
            Self::TimedOut => "TIMED_OUT",
            Self::ResponseTooLarge => "RESPONSE_TOO_LARGE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// The unified error type surfaced by the registry, transports, server,
/// and processor.
#[derive(Debug, Error)]
pub enum FrugalError {
    /// A broker- or HTTP-level transport failure.
    #[error("transport error ({kind}): {message}")]
    Transport {
        /// Which sub-kind of transport failure occurred.
        kind: TransportErrorKind,
        /// Human-readable detail, often the broker's own error text.
        message: String,
    },

    /// A local write exceeded a configured size limit.
    #[error("message too large: {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the rejected write.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The header frame or message frame was malformed.
    #[error("protocol error: {0}")]
    Protocol(#[from] frugal_proto::ProtocolError),

    /// A call's deadline elapsed before a reply arrived.
    #[error("timed out waiting for a reply after {timeout_ms}ms")]
    Timeout {
        /// The deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// A context was registered while its operation id was still live.
    #[error("context with op id {op_id} is already registered")]
    ContextAlreadyRegistered {
        /// The operation id that collided.
        op_id: u64,
    },

    /// A method-level error returned by the remote handler.
    #[error("application exception ({kind}): {message}")]
    Application {
        /// Which sub-kind of application exception occurred.
        kind: ApplicationExceptionKind,
        /// Human-readable detail.
        message: String,
    },

    /// The server-side handler rejected the call due to rate limiting.
    /// Translated to [`ApplicationExceptionKind::RateLimitExceeded`] on the
    /// wire by the processor, and translated back to this variant on
    /// receipt by the client.
    #[error("rate limit exceeded")]
    RateLimit,

    /// The peer is running an incompatible frugal wire version.
    #[error("incompatible frugal version: {0}")]
    Version(String),
}

/// Convenience alias for results using [`FrugalError`].
pub type Result<T> = std::result::Result<T, FrugalError>;

impl FrugalError {
    /// Build an `Application` error of kind `UNKNOWN_METHOD` for `method`.
    #[must_use]
    pub fn unknown_method(method: &str) -> Self {
        Self::Application {
            kind: ApplicationExceptionKind::UnknownMethod,
            message: format!("Unknown function: {method}"),
        }
    }
}
