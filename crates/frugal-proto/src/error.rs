//! Error kinds for header framing and the codec seam.

use thiserror::Error;

/// Errors raised while encoding or decoding header frames and message
/// frames, or while operating the codec seam.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The header frame's version byte was not `0x00`.
    #[error("unsupported header version: {found:#04x}")]
    BadVersion {
        /// The version byte actually present on the wire.
        found: u8,
    },

    /// A length field in the header body or message frame pointed past
    /// the end of the available bytes.
    #[error("malformed header body: {reason}")]
    InvalidData {
        /// Human-readable description of what was malformed.
        reason: String,
    },

    /// The buffer was too short to contain a complete header or frame.
    #[error("frame too short: need at least {needed} bytes, have {have}")]
    FrameTooShort {
        /// Minimum number of bytes required.
        needed: usize,
        /// Number of bytes actually available.
        have: usize,
    },

    /// A write would exceed the configured size limit.
    #[error("message too large: {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the write that was rejected.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The header frame decoded without a `_opid` entry.
    #[error("missing required header: {key}")]
    MissingHeader {
        /// The header key that was required but absent.
        key: &'static str,
    },
}

/// Convenience alias for results from this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
