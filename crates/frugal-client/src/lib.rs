//! Client-side transports for the frugal RPC core: stateless NATS
//! request/reply, NATS scope pub/sub, and HTTP unary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod demo;
pub mod http_transport;
pub mod nats_client;
pub mod nats_transport;
pub mod scope;
pub mod transport;

pub use demo::BaseServiceClient;
pub use http_transport::HttpTransport;
pub use nats_client::RealNatsClient;
pub use nats_transport::{NatsRequestTransport, NATS_MAX_MESSAGE_SIZE};
pub use scope::{NatsScopePublisherTransport, NatsScopeSubscriberTransport, ScopeCallback};
pub use transport::BaseTransport;
