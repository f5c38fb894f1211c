//! Method-name dispatch with error marshalling (§4.9).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use frugal_core::error::{ApplicationExceptionKind, FrugalError};
use frugal_core::middleware::MiddlewareChain;
use frugal_proto::binary::BinaryProtocolFactory;
use frugal_proto::protocol::{FieldType, MessageType, Protocol, ProtocolFactory};
use frugal_proto::{Context, FramedOutputBuffer, ProtocolWrapper};
use tokio::sync::Mutex;
use tracing::{error, warn};

/// A single service method: reads its own arguments from the decoded
/// request body and writes its own reply body, generated per-method by a
/// code generator in a full implementation.
#[async_trait]
pub trait MethodProcessor: Send + Sync {
    /// Handle one call, given the request context and the codec body
    /// bytes following the header block. Returns the reply body bytes
    /// (not yet length-prefixed or header-wrapped); the base processor
    /// wraps it in a reply message and header block.
    async fn process(&self, ctx: &Context, args: &[u8]) -> Result<Vec<u8>, FrugalError>;
}

/// Maps method names to [`MethodProcessor`]s and marshals errors into
/// `ApplicationException` replies, per the component design.
pub struct FBaseProcessor {
    service_name: String,
    methods: HashMap<String, Arc<dyn MethodProcessor>>,
    middleware: MiddlewareChain,
    write_lock: Mutex<()>,
}

impl FBaseProcessor {
    /// Construct an empty processor for `service_name`.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            methods: HashMap::new(),
            middleware: MiddlewareChain::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Install the middleware chain wrapping every method invocation.
    #[must_use]
    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    /// Register a handler for `method`.
    #[must_use]
    pub fn add_method(mut self, method: impl Into<String>, handler: Arc<dyn MethodProcessor>) -> Self {
        self.methods.insert(method.into(), handler);
        self
    }

    fn write_application_exception(
        name: &str,
        seqid: i32,
        kind: ApplicationExceptionKind,
        message: &str,
    ) -> frugal_proto::Result<Vec<u8>> {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_message_begin(name, MessageType::Exception, seqid)?;
        writer.write_struct_begin("TApplicationException")?;
        writer.write_field_begin("message", FieldType::String, 1)?;
        writer.write_string(message)?;
        writer.write_field_end()?;
        writer.write_field_begin("kind", FieldType::String, 2)?;
        writer.write_string(&kind.to_string())?;
        writer.write_field_end()?;
        writer.write_field_stop()?;
        writer.write_struct_end()?;
        writer.write_message_end()?;
        Ok(writer.take_buffer())
    }

    /// Read request headers, dispatch to the matching method, and produce
    /// a framed reply buffer. Unknown methods get an `UNKNOWN_METHOD`
    /// application exception reply instead of a dropped connection;
    /// handler failures are translated per the table in the component
    /// design; anything else propagates so the caller (the server) can log
    /// it and drop the reply.
    pub async fn process(&self, frame: &[u8], limit: usize) -> Result<FramedOutputBuffer, FrugalError> {
        let wrapper = ProtocolWrapper::new(BinaryProtocolFactory.new_reader(Vec::new()));
        let (ctx, consumed) = wrapper.read_request_headers(frame, 0)?;
        let body = &frame[consumed..];

        let factory = BinaryProtocolFactory;
        let mut reader = factory.new_reader(body.to_vec());
        let (name, _kind, seqid) = reader.read_message_begin()?;
        let args = reader.remaining().to_vec();

        let _guard = self.write_lock.lock().await;

        let mut out = FramedOutputBuffer::new(limit);
        let response_header_bytes = wrapper.write_response_headers(&ctx);

        let Some(handler) = self.methods.get(&name).cloned() else {
            warn!(method = %name, "dispatch to unknown method");
            out.write(&response_header_bytes)?;
            let reply = Self::write_application_exception(
                &name,
                seqid,
                ApplicationExceptionKind::UnknownMethod,
                &format!("Unknown function: {name}"),
            )?;
            out.write(&reply)?;
            return Ok(out);
        };

        let service = self.service_name.clone();
        let method_name = name.clone();

        let descriptor = frugal_core::middleware::MethodDescriptor {
            service,
            method: method_name.clone(),
        };
        let handler_clone = handler.clone();
        let ctx_clone = ctx.clone();
        let invoker: frugal_core::middleware::Invoker = Arc::new(move |_desc, args_bytes| {
            let handler = handler_clone.clone();
            let ctx = ctx_clone.clone();
            Box::pin(async move { handler.process(&ctx, &args_bytes).await.map(bytes::Bytes::from) })
        });

        let invoker = self.middleware.compose(invoker);
        let result = invoker(descriptor, bytes::Bytes::from(args)).await;

        out.write(&response_header_bytes)?;

        match result {
            Ok(reply_body) => {
                out.write(&reply_body)?;
            }
            Err(FrugalError::RateLimit) => {
                let reply = Self::write_application_exception(
                    &name,
                    seqid,
                    ApplicationExceptionKind::RateLimitExceeded,
                    "rate limit exceeded",
                )?;
                out.write(&reply)?;
            }
            Err(FrugalError::MessageTooLarge { .. }) => {
                let reply = Self::write_application_exception(
                    &name,
                    seqid,
                    ApplicationExceptionKind::ResponseTooLarge,
                    "response exceeded the configured size limit",
                )?;
                out.write(&reply)?;
            }
            Err(other) => {
                error!(method = %name, error = %other, "handler failed");
                let reply = Self::write_application_exception(
                    &name,
                    seqid,
                    ApplicationExceptionKind::Unknown,
                    &other.to_string(),
                )?;
                out.write(&reply)?;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Ping;

    #[async_trait]
    impl MethodProcessor for Ping {
        async fn process(&self, _ctx: &Context, _args: &[u8]) -> Result<Vec<u8>, FrugalError> {
            let factory = BinaryProtocolFactory;
            let mut writer = factory.new_writer();
            writer.write_message_begin("basePing", MessageType::Reply, 0).unwrap();
            writer.write_struct_begin("basePing_result").unwrap();
            writer.write_field_stop().unwrap();
            writer.write_struct_end().unwrap();
            writer.write_message_end().unwrap();
            Ok(writer.take_buffer())
        }
    }

    fn encode_call(name: &str) -> Vec<u8> {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_message_begin(name, MessageType::Call, 0).unwrap();
        writer.write_struct_begin(&format!("{name}_args")).unwrap();
        writer.write_field_stop().unwrap();
        writer.write_struct_end().unwrap();
        writer.write_message_end().unwrap();
        writer.take_buffer()
    }

    fn frame_for(ctx: &Context, name: &str) -> Vec<u8> {
        let headers = frugal_proto::header::encode(ctx.request_headers());
        let mut frame = headers;
        frame.extend_from_slice(&encode_call(name));
        frame
    }

    #[tokio::test]
    async fn unknown_method_returns_application_exception() {
        let processor = FBaseProcessor::new("BaseService");
        let ctx = Context::new(None);
        let frame = frame_for(&ctx, "unknownMethod");

        let out = processor.process(&frame, 0).await.unwrap();
        assert!(!out.is_oneway_sentinel());
    }

    #[tokio::test]
    async fn known_method_dispatches_to_handler() {
        let processor = FBaseProcessor::new("BaseService").add_method("basePing", Arc::new(Ping));
        let ctx = Context::new(None);
        let frame = frame_for(&ctx, "basePing");

        let out = processor.process(&frame, 0).await.unwrap();
        assert!(!out.is_oneway_sentinel());
    }
}
