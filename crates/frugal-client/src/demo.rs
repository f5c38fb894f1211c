//! A hand-written stand-in for what a code generator would emit: one
//! request/reply method and one oneway method, exercising the generated
//! client method contract of §4.10. Not part of this crate's public
//! surface beyond what the integration tests need.

use bytes::Bytes;
use frugal_core::error::Result;
use frugal_proto::binary::BinaryProtocolFactory;
use frugal_proto::protocol::{FieldType, MessageType, Protocol, ProtocolFactory};
use frugal_proto::Context;

use crate::transport::BaseTransport;

/// Client for a toy `BaseService` with a `base_ping` request/reply method
/// and a `base_oneway` fire-and-forget method, matching scenario S1.
pub struct BaseServiceClient<T> {
    transport: T,
}

impl<T: BaseTransport> BaseServiceClient<T> {
    /// Wrap a transport implementing the client contract.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    fn encode_call(name: &str) -> frugal_proto::Result<Vec<u8>> {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_message_begin(name, MessageType::Call, 0)?;
        writer.write_struct_begin(&format!("{name}_args"))?;
        writer.write_field_stop()?;
        writer.write_struct_end()?;
        writer.write_message_end()?;
        Ok(writer.take_buffer())
    }

    /// Call `basePing`, awaiting the server's (empty) reply.
    pub async fn base_ping(&self, ctx: &mut Context) -> Result<()> {
        let payload = Bytes::from(Self::encode_call("basePing")?);
        let reply = self.transport.request(ctx, payload).await?;

        if reply.is_empty() {
            return Ok(());
        }

        let factory = BinaryProtocolFactory;
        let mut reader = factory.new_reader(reply.to_vec());
        let (_name, kind, _seqid) = reader.read_message_begin()?;
        if kind == MessageType::Exception {
            reader.read_struct_begin()?;
            let mut message = String::new();
            loop {
                let (_, field_kind, id) = reader.read_field_begin()?;
                if field_kind == FieldType::Stop {
                    break;
                }
                if field_kind == FieldType::String && id == 1 {
                    message = reader.read_string()?;
                } else {
                    reader.skip(field_kind)?;
                }
            }
            return Err(crate::demo::decode_application_exception(&message));
        }
        Ok(())
    }

    /// Fire-and-forget `baseOneway`, returning once the send completes.
    pub async fn base_oneway(&self, ctx: &Context) -> Result<()> {
        let payload = Bytes::from(Self::encode_call("baseOneway")?);
        self.transport.oneway(ctx, payload).await
    }
}

/// Decode a server-supplied application exception message into a
/// [`frugal_core::FrugalError::Application`] of the matching kind,
/// recognizing the exact strings the processor (§4.9) writes.
pub(crate) fn decode_application_exception(message: &str) -> frugal_core::FrugalError {
    use frugal_core::error::ApplicationExceptionKind;

    let kind = if message.starts_with("Unknown function:") {
        ApplicationExceptionKind::UnknownMethod
    } else {
        ApplicationExceptionKind::Unknown
    };
    frugal_core::FrugalError::Application {
        kind,
        message: message.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use frugal_core::error::FrugalError;
    use std::sync::Mutex;

    struct EchoTransport {
        reply: Mutex<Option<Bytes>>,
    }

    #[async_trait]
    impl BaseTransport for EchoTransport {
        async fn is_open(&self) -> bool {
            true
        }
        async fn open(&self) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
        async fn oneway(&self, _ctx: &Context, _payload: Bytes) -> Result<()> {
            Ok(())
        }
        async fn request(&self, _ctx: &mut Context, _payload: Bytes) -> Result<Bytes> {
            Ok(self.reply.lock().unwrap().take().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn base_ping_with_empty_reply_succeeds() {
        let client = BaseServiceClient::new(EchoTransport { reply: Mutex::new(None) });
        let mut ctx = Context::new(None);
        client.base_ping(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn base_ping_surfaces_application_exception() {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_message_begin("basePing", MessageType::Exception, 0).unwrap();
        writer.write_struct_begin("TApplicationException").unwrap();
        writer.write_field_begin("message", FieldType::String, 1).unwrap();
        writer.write_string("Unknown function: basePing").unwrap();
        writer.write_field_end().unwrap();
        writer.write_field_stop().unwrap();
        writer.write_struct_end().unwrap();
        writer.write_message_end().unwrap();
        let reply = Bytes::from(writer.take_buffer());

        let client = BaseServiceClient::new(EchoTransport {
            reply: Mutex::new(Some(reply)),
        });
        let mut ctx = Context::new(None);
        let err = client.base_ping(&mut ctx).await.unwrap_err();
        assert!(matches!(err, FrugalError::Application { .. }));
    }
}
