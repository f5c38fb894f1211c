//! Registry, middleware chain, broker contract, and error taxonomy shared
//! by the frugal client and server crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod error;
pub mod middleware;
pub mod registry;

pub use broker::{BrokerMessage, MockBroker, NatsClient, SubscriptionId};
pub use error::{ApplicationExceptionKind, FrugalError, Result, TransportErrorKind};
pub use middleware::{Invoker, MethodDescriptor, Middleware, MiddlewareChain};
pub use registry::Registry;
