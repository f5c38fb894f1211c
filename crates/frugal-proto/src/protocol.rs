//! The codec seam: `Protocol` and `ProtocolFactory` traits consumed by the
//! core, plus a minimal reference implementation used by this crate's own
//! tests and the demonstration service.
//!
//! Production users bring their own codec (binary, JSON, compact) produced
//! by a code generator; the core never depends on a specific wire format
//! for message bodies, only on this trait seam.

use crate::error::Result;

/// The kind of a message: request, reply, or oneway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A call expecting a reply.
    Call,
    /// A reply to a prior call.
    Reply,
    /// A fire-and-forget call.
    Oneway,
    /// An exception reply.
    Exception,
}

/// Field and container type tags used by `skip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Boolean.
    Bool,
    /// Signed byte.
    Byte,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Raw bytes.
    Binary,
    /// Nested struct.
    Struct,
    /// Homogeneous list.
    List,
    /// Homogeneous set.
    Set,
    /// Key-value map.
    Map,
    /// Marks the end of a field list.
    Stop,
}

/// Message-level and structural framing, plus scalar and collection
/// read/write, implemented by a specific wire codec.
pub trait Protocol {
    /// Begin writing a message: name, type, and a sequence id.
    fn write_message_begin(&mut self, name: &str, kind: MessageType, seqid: i32) -> Result<()>;
    /// End a message.
    fn write_message_end(&mut self) -> Result<()>;
    /// Begin a struct.
    fn write_struct_begin(&mut self, name: &str) -> Result<()>;
    /// End a struct.
    fn write_struct_end(&mut self) -> Result<()>;
    /// Begin a field: name, type, and field id. `name` may be empty for
    /// codecs that identify fields purely by id.
    fn write_field_begin(&mut self, name: &str, kind: FieldType, id: i16) -> Result<()>;
    /// End a field.
    fn write_field_end(&mut self) -> Result<()>;
    /// Mark the end of a field list.
    fn write_field_stop(&mut self) -> Result<()>;
    /// Write a boolean scalar.
    fn write_bool(&mut self, value: bool) -> Result<()>;
    /// Write a signed byte scalar.
    fn write_byte(&mut self, value: i8) -> Result<()>;
    /// Write a 16-bit signed integer scalar.
    fn write_i16(&mut self, value: i16) -> Result<()>;
    /// Write a 32-bit signed integer scalar.
    fn write_i32(&mut self, value: i32) -> Result<()>;
    /// Write a 64-bit signed integer scalar.
    fn write_i64(&mut self, value: i64) -> Result<()>;
    /// Write a 64-bit float scalar.
    fn write_double(&mut self, value: f64) -> Result<()>;
    /// Write a UTF-8 string scalar.
    fn write_string(&mut self, value: &str) -> Result<()>;
    /// Write a raw bytes scalar.
    fn write_binary(&mut self, value: &[u8]) -> Result<()>;

    /// Begin reading a message; returns name, type, and sequence id.
    fn read_message_begin(&mut self) -> Result<(String, MessageType, i32)>;
    /// End reading a message.
    fn read_message_end(&mut self) -> Result<()>;
    /// Begin reading a struct; returns its name if the codec carries one.
    fn read_struct_begin(&mut self) -> Result<String>;
    /// End reading a struct.
    fn read_struct_end(&mut self) -> Result<()>;
    /// Begin reading the next field; `FieldType::Stop` signals no more
    /// fields remain.
    fn read_field_begin(&mut self) -> Result<(String, FieldType, i16)>;
    /// End reading a field.
    fn read_field_end(&mut self) -> Result<()>;
    /// Read a boolean scalar.
    fn read_bool(&mut self) -> Result<bool>;
    /// Read a signed byte scalar.
    fn read_byte(&mut self) -> Result<i8>;
    /// Read a 16-bit signed integer scalar.
    fn read_i16(&mut self) -> Result<i16>;
    /// Read a 32-bit signed integer scalar.
    fn read_i32(&mut self) -> Result<i32>;
    /// Read a 64-bit signed integer scalar.
    fn read_i64(&mut self) -> Result<i64>;
    /// Read a 64-bit float scalar.
    fn read_double(&mut self) -> Result<f64>;
    /// Read a UTF-8 string scalar.
    fn read_string(&mut self) -> Result<String>;
    /// Read a raw bytes scalar.
    fn read_binary(&mut self) -> Result<Vec<u8>>;

    /// Skip a value of the given type without interpreting it, recursing
    /// into structs/lists/sets/maps as needed.
    fn skip(&mut self, kind: FieldType) -> Result<()>;

    /// Drain the codec's internal write buffer, if it has one, returning
    /// everything written so far. Implementations that write directly to
    /// an external sink may return an empty vector.
    fn take_buffer(&mut self) -> Vec<u8>;
}

/// Produces a `Protocol` bound to an in-memory byte source (for reads) or
/// sink (for writes).
pub trait ProtocolFactory {
    /// Concrete protocol type this factory produces.
    type Protocol: Protocol;

    /// Construct a protocol for writing, starting from an empty buffer.
    fn new_writer(&self) -> Self::Protocol;

    /// Construct a protocol for reading the given bytes.
    fn new_reader(&self, bytes: Vec<u8>) -> Self::Protocol;
}
