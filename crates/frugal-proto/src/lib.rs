//! Header framing, request context, and the codec seam shared by the
//! frugal client and server crates.
//!
//! This crate has no knowledge of any particular transport or broker; it
//! defines the wire-level primitives (§3/§4.1-4.4 of the design) that the
//! transport and server crates build on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod binary;
pub mod context;
pub mod error;
pub mod framed;
pub mod header;
pub mod protocol;
pub mod wrapper;

pub use binary::{BinaryProtocol, BinaryProtocolFactory};
pub use context::Context;
pub use error::{ProtocolError, Result};
pub use framed::FramedOutputBuffer;
pub use header::{Headers, HEADER_VERSION};
pub use protocol::{FieldType, MessageType, Protocol, ProtocolFactory};
pub use wrapper::ProtocolWrapper;
