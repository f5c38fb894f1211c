//! A minimal length-prefixed binary codec implementing [`Protocol`].
//!
//! This is used only by this crate's own tests and the demonstration
//! service; it carries no interoperability guarantee and is not "the"
//! codec contemplated by the core. Field names are not transmitted: field
//! lookups are positional by field id alone, which is sufficient for the
//! handful of structs exercised in tests.

#![allow(
    clippy::expect_used,
    reason = "read_exact(n) guarantees exactly n bytes, so the try_into() below it cannot fail"
)]

use crate::error::{ProtocolError, Result};
use crate::protocol::{FieldType, MessageType, Protocol, ProtocolFactory};

/// Factory for [`BinaryProtocol`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryProtocolFactory;

impl ProtocolFactory for BinaryProtocolFactory {
    type Protocol = BinaryProtocol;

    fn new_writer(&self) -> Self::Protocol {
        BinaryProtocol {
            buf: Vec::new(),
            cursor: 0,
        }
    }

    fn new_reader(&self, bytes: Vec<u8>) -> Self::Protocol {
        BinaryProtocol { buf: bytes, cursor: 0 }
    }
}

/// A simple binary protocol: every scalar is a fixed-width big-endian
/// encoding, strings/binary are length-prefixed, and field headers are
/// `(type_tag: u8, id: i16)`.
#[derive(Debug, Default)]
pub struct BinaryProtocol {
    buf: Vec<u8>,
    cursor: usize,
}

impl BinaryProtocol {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn read_exact(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.cursor + len;
        let slice = self
            .buf
            .get(self.cursor..end)
            .ok_or(ProtocolError::FrameTooShort {
                needed: end,
                have: self.buf.len(),
            })?;
        self.cursor = end;
        Ok(slice)
    }

    fn field_type_tag(kind: FieldType) -> u8 {
        match kind {
            FieldType::Bool => 1,
            FieldType::Byte => 2,
            FieldType::I16 => 3,
            FieldType::I32 => 4,
            FieldType::I64 => 5,
            FieldType::Double => 6,
            FieldType::String => 7,
            FieldType::Binary => 8,
            FieldType::Struct => 9,
            FieldType::List => 10,
            FieldType::Set => 11,
            FieldType::Map => 12,
            FieldType::Stop => 0,
        }
    }

    fn tag_to_field_type(tag: u8) -> Result<FieldType> {
        Ok(match tag {
            0 => FieldType::Stop,
            1 => FieldType::Bool,
            2 => FieldType::Byte,
            3 => FieldType::I16,
            4 => FieldType::I32,
            5 => FieldType::I64,
            6 => FieldType::Double,
            7 => FieldType::String,
            8 => FieldType::Binary,
            9 => FieldType::Struct,
            10 => FieldType::List,
            11 => FieldType::Set,
            12 => FieldType::Map,
            other => {
                return Err(ProtocolError::InvalidData {
                    reason: format!("unknown field type tag {other}"),
                });
            }
        })
    }
}

impl Protocol for BinaryProtocol {
    fn write_message_begin(&mut self, name: &str, kind: MessageType, seqid: i32) -> Result<()> {
        let tag: u8 = match kind {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Oneway => 3,
            MessageType::Exception => 4,
        };
        self.write_bytes(&(name.len() as u32).to_be_bytes());
        self.write_bytes(name.as_bytes());
        self.write_bytes(&[tag]);
        self.write_bytes(&seqid.to_be_bytes());
        Ok(())
    }

    fn write_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, _name: &str, kind: FieldType, id: i16) -> Result<()> {
        self.write_bytes(&[Self::field_type_tag(kind)]);
        self.write_bytes(&id.to_be_bytes());
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<()> {
        self.write_bytes(&[0u8]);
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_bytes(&[u8::from(value)]);
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&value.to_be_bytes());
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes());
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes());
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes());
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes());
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(&(value.len() as u32).to_be_bytes());
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<()> {
        self.write_bytes(&(value.len() as u32).to_be_bytes());
        self.write_bytes(value);
        Ok(())
    }

    fn read_message_begin(&mut self) -> Result<(String, MessageType, i32)> {
        let len = u32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length")) as usize;
        let name = std::str::from_utf8(self.read_exact(len)?)
            .map_err(|_| ProtocolError::InvalidData {
                reason: "message name is not valid UTF-8".to_string(),
            })?
            .to_string();
        let tag = self.read_exact(1)?[0];
        let kind = match tag {
            1 => MessageType::Call,
            2 => MessageType::Reply,
            3 => MessageType::Oneway,
            4 => MessageType::Exception,
            other => {
                return Err(ProtocolError::InvalidData {
                    reason: format!("unknown message type tag {other}"),
                });
            }
        };
        let seqid = i32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length"));
        Ok((name, kind, seqid))
    }

    fn read_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<String> {
        Ok(String::new())
    }

    fn read_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<(String, FieldType, i16)> {
        let tag = self.read_exact(1)?[0];
        let kind = Self::tag_to_field_type(tag)?;
        if kind == FieldType::Stop {
            return Ok((String::new(), FieldType::Stop, 0));
        }
        let id = i16::from_be_bytes(self.read_exact(2)?.try_into().expect("read_exact returns exactly the requested length"));
        Ok((String::new(), kind, id))
    }

    fn read_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_exact(1)?[0] != 0)
    }

    fn read_byte(&mut self) -> Result<i8> {
        Ok(self.read_exact(1)?[0] as i8)
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_exact(2)?.try_into().expect("read_exact returns exactly the requested length")))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length")))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_exact(8)?.try_into().expect("read_exact returns exactly the requested length")))
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_exact(8)?.try_into().expect("read_exact returns exactly the requested length")))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = u32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length")) as usize;
        std::str::from_utf8(self.read_exact(len)?)
            .map(ToString::to_string)
            .map_err(|_| ProtocolError::InvalidData {
                reason: "string is not valid UTF-8".to_string(),
            })
    }

    fn read_binary(&mut self) -> Result<Vec<u8>> {
        let len = u32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length")) as usize;
        Ok(self.read_exact(len)?.to_vec())
    }

    fn skip(&mut self, kind: FieldType) -> Result<()> {
        match kind {
            FieldType::Bool | FieldType::Byte => {
                self.read_exact(1)?;
            }
            FieldType::I16 => {
                self.read_exact(2)?;
            }
            FieldType::I32 => {
                self.read_exact(4)?;
            }
            FieldType::I64 | FieldType::Double => {
                self.read_exact(8)?;
            }
            FieldType::String | FieldType::Binary => {
                let len = u32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length")) as usize;
                self.read_exact(len)?;
            }
            FieldType::Struct => loop {
                let (_, field_kind, _) = self.read_field_begin()?;
                if field_kind == FieldType::Stop {
                    break;
                }
                self.skip(field_kind)?;
            },
            FieldType::List | FieldType::Set => {
                let elem_tag = self.read_exact(1)?[0];
                let elem_kind = Self::tag_to_field_type(elem_tag)?;
                let count = u32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length"));
                for _ in 0..count {
                    self.skip(elem_kind)?;
                }
            }
            FieldType::Map => {
                let key_tag = self.read_exact(1)?[0];
                let key_kind = Self::tag_to_field_type(key_tag)?;
                let val_tag = self.read_exact(1)?[0];
                let val_kind = Self::tag_to_field_type(val_tag)?;
                let count = u32::from_be_bytes(self.read_exact(4)?.try_into().expect("read_exact returns exactly the requested length"));
                for _ in 0..count {
                    self.skip(key_kind)?;
                    self.skip(val_kind)?;
                }
            }
            FieldType::Stop => {}
        }
        Ok(())
    }

    fn take_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

impl BinaryProtocol {
    /// The unconsumed tail of the reader's buffer. Used by callers that
    /// need to hand off mid-stream position to another reader, such as
    /// the demonstration processor splitting a method's argument bytes
    /// from its message-begin framing.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.cursor.min(self.buf.len())..]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_simple_message() {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_message_begin("basePing", MessageType::Call, 1).unwrap();
        writer.write_struct_begin("basePing_args").unwrap();
        writer.write_field_stop().unwrap();
        writer.write_struct_end().unwrap();
        writer.write_message_end().unwrap();
        let bytes = writer.take_buffer();

        let mut reader = factory.new_reader(bytes);
        let (name, kind, seqid) = reader.read_message_begin().unwrap();
        assert_eq!(name, "basePing");
        assert_eq!(kind, MessageType::Call);
        assert_eq!(seqid, 1);
        reader.read_struct_begin().unwrap();
        let (_, field_kind, _) = reader.read_field_begin().unwrap();
        assert_eq!(field_kind, FieldType::Stop);
    }

    #[test]
    fn round_trips_scalars_through_a_field() {
        let factory = BinaryProtocolFactory;
        let mut writer = factory.new_writer();
        writer.write_field_begin("count", FieldType::I32, 1).unwrap();
        writer.write_i32(42).unwrap();
        writer.write_field_end().unwrap();
        writer.write_field_stop().unwrap();
        let bytes = writer.take_buffer();

        let mut reader = factory.new_reader(bytes);
        let (_, kind, id) = reader.read_field_begin().unwrap();
        assert_eq!(kind, FieldType::I32);
        assert_eq!(id, 1);
        assert_eq!(reader.read_i32().unwrap(), 42);
        let (_, stop_kind, _) = reader.read_field_begin().unwrap();
        assert_eq!(stop_kind, FieldType::Stop);
    }
}
