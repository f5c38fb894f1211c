//! A hand-written stand-in for generated server dispatch code: handlers
//! for the toy `BaseService` used in this workspace's integration tests.

use async_trait::async_trait;
use frugal_core::error::FrugalError;
use frugal_proto::binary::BinaryProtocolFactory;
use frugal_proto::protocol::{MessageType, Protocol, ProtocolFactory};
use frugal_proto::Context;

use crate::processor::{FBaseProcessor, MethodProcessor};

/// Replies to `basePing` with an empty result struct.
pub struct BasePingHandler;

#[async_trait]
impl MethodProcessor for BasePingHandler {
    async fn process(&self, _ctx: &Context, _args: &[u8]) -> Result<Vec<u8>, FrugalError> {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_message_begin("basePing", MessageType::Reply, 0)?;
        writer.write_struct_begin("basePing_result")?;
        writer.write_field_stop()?;
        writer.write_struct_end()?;
        writer.write_message_end()?;
        Ok(writer.take_buffer())
    }
}

/// Accepts `baseOneway` calls without producing any observable reply
/// (the processor's oneway handling is a transport-level concern; this
/// handler simply returns an empty body, matching scenario S1's sibling
/// fire-and-forget path).
pub struct BaseOnewayHandler;

#[async_trait]
impl MethodProcessor for BaseOnewayHandler {
    async fn process(&self, _ctx: &Context, _args: &[u8]) -> Result<Vec<u8>, FrugalError> {
        Ok(Vec::new())
    }
}

/// Build a processor for the toy `BaseService`, with `basePing` and
/// `baseOneway` registered. Calling an unregistered method name exercises
/// the `UNKNOWN_METHOD` application exception path.
#[must_use]
pub fn base_service_processor() -> FBaseProcessor {
    FBaseProcessor::new("BaseService")
        .add_method("basePing", std::sync::Arc::new(BasePingHandler))
        .add_method("baseOneway", std::sync::Arc::new(BaseOnewayHandler))
}
