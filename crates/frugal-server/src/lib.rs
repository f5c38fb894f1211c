//! Server-side method dispatch and the NATS-subscribed server for the
//! frugal RPC core.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod demo;
pub mod nats_server;
pub mod processor;

pub use demo::{base_service_processor, BaseOnewayHandler, BasePingHandler};
pub use nats_server::NatsServer;
pub use processor::{FBaseProcessor, MethodProcessor};
