//! Schema-driven message encoding and decoding.
//!
//! [`MessageCodec`] walks a [`MessageSchema`] and hands each field to the
//! scalar codecs in [`crate::wire`], recursing for embedded messages. The
//! textual projection lives in [`crate::textual`] and is exposed through the
//! same type.
//!
//! ## Decode
//!
//! The read loop consumes tag/value pairs until the declared end or the end of
//! the buffer. Known fields are merged into the message (repeated fields
//! append, scalars are last-wins, embedded messages merge); unknown fields are
//! skipped whole by wire type. Any error aborts the call without a partial
//! result.
//!
//! ## Encode
//!
//! Fields are written in ascending number order so output is deterministic.
//! Implicit-presence fields holding their zero value are not written at all.

mod config;

use crate::error::{Error, Result};
use crate::integer::from_host_integer;
use crate::schema::{FieldDescriptor, LogicalType, MessageSchema, SchemaRegistry, SchemaResolver};
use crate::value::{Message, Value};
use crate::wire::{
    decode_string, decode_zigzag32, decode_zigzag64, encode_bool, encode_length_delimited,
    encode_tag, encode_varint, encode_zigzag32, encode_zigzag64, put_double, put_fixed32,
    put_fixed64, put_float, WireReader, WireType,
};
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

pub use config::{CodecConfig, DEFAULT_RECURSION_LIMIT};

/// Encodes, decodes and projects messages described by schemas.
///
/// The codec borrows its resolver and owns only configuration, so one
/// instance can serve any number of threads.
pub struct MessageCodec<'r, R: ?Sized = SchemaRegistry> {
    pub(crate) resolver: &'r R,
    pub(crate) config: CodecConfig,
}

impl<R: ?Sized> Clone for MessageCodec<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ?Sized> Copy for MessageCodec<'_, R> {}

impl<R: ?Sized> std::fmt::Debug for MessageCodec<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'r, R: SchemaResolver + ?Sized> MessageCodec<'r, R> {
    /// Creates a codec with default configuration
    pub fn new(resolver: &'r R) -> Self {
        Self {
            resolver,
            config: CodecConfig::default(),
        }
    }

    /// Replaces the configuration
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The resolver used for type references
    pub fn resolver(&self) -> &'r R {
        self.resolver
    }

    /// Encode a message to wire bytes
    pub fn encode(&self, message: &Message, schema: &MessageSchema) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_to(message, schema, &mut buf)?;
        debug!("Encoded {} into {} bytes", schema.name(), buf.len());
        Ok(buf.freeze())
    }

    /// Encode a message, appending to `buf`
    pub fn encode_to(&self, message: &Message, schema: &MessageSchema, buf: &mut BytesMut) -> Result<()> {
        self.encode_message(message, schema, buf, 0)
    }

    /// Encode a message preceded by its varint length
    pub fn encode_length_delimited(&self, message: &Message, schema: &MessageSchema) -> Result<Bytes> {
        let body = self.encode(message, schema)?;
        let mut buf = BytesMut::with_capacity(body.len() + 5);
        encode_length_delimited(&body, &mut buf);
        Ok(buf.freeze())
    }

    /// Decode a whole buffer
    pub fn decode(&self, data: &[u8], schema: &MessageSchema) -> Result<Message> {
        self.decode_with_length(data, schema, None)
    }

    /// Decode the first `declared_len` bytes of `data`, or all of it when `None`
    pub fn decode_with_length(
        &self,
        data: &[u8],
        schema: &MessageSchema,
        declared_len: Option<usize>,
    ) -> Result<Message> {
        let mut reader = WireReader::new(data);
        if let Some(len) = declared_len {
            reader.push_limit(len)?;
        }

        let mut message = self.default_message(schema);
        self.merge_message(&mut reader, schema, &mut message, 0)?;
        debug!("Decoded {} from {} bytes", schema.name(), reader.position());
        Ok(message)
    }

    /// Decode a message preceded by its varint length.
    ///
    /// Returns the message and the number of bytes consumed, prefix included.
    pub fn decode_length_delimited(&self, data: &[u8], schema: &MessageSchema) -> Result<(Message, usize)> {
        let mut reader = WireReader::new(data);
        let len = reader.read_length()?;
        reader.push_limit(len)?;

        let mut message = self.default_message(schema);
        self.merge_message(&mut reader, schema, &mut message, 0)?;
        Ok((message, reader.position()))
    }

    /// The message obtained by decoding an empty buffer.
    ///
    /// Implicit scalars hold their zero value, repeated fields are empty and
    /// fields with explicit presence are absent.
    pub fn default_message(&self, schema: &MessageSchema) -> Message {
        schema
            .fields()
            .iter()
            .filter_map(|field| field.initial_value().map(|v| (field.name().to_string(), v)))
            .collect()
    }

    /// Complete a partially built message.
    ///
    /// Missing implicit scalars get their zero value and missing repeated
    /// fields an empty list, recursively through present embedded messages.
    /// Entries that match no declared field are dropped.
    pub fn from_partial(&self, partial: &Message, schema: &MessageSchema) -> Result<Message> {
        self.complete_message(partial, schema, 0)
    }

    fn complete_message(&self, partial: &Message, schema: &MessageSchema, depth: usize) -> Result<Message> {
        self.check_depth(depth)?;
        let mut message = self.default_message(schema);

        for field in schema.fields() {
            let Some(value) = partial.get(field.name()) else {
                continue;
            };

            let completed = match (field.field_type(), value) {
                (LogicalType::Message(type_name), Value::Message(nested)) => {
                    let nested_schema = self.resolver.resolve_message(type_name)?;
                    Value::Message(self.complete_message(nested, nested_schema, depth + 1)?)
                }
                (LogicalType::Message(type_name), Value::List(items)) => {
                    let nested_schema = self.resolver.resolve_message(type_name)?;
                    let items = items
                        .iter()
                        .map(|item| match item {
                            Value::Message(nested) => self
                                .complete_message(nested, nested_schema, depth + 1)
                                .map(Value::Message),
                            _ => Err(Error::type_mismatch(field.name(), "a message")),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Value::List(items)
                }
                _ => value.clone(),
            };
            message.insert(field.name(), completed);
        }

        Ok(message)
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.recursion_limit {
            return Err(Error::RecursionLimit {
                limit: self.config.recursion_limit,
            });
        }
        Ok(())
    }

    fn encode_message(
        &self,
        message: &Message,
        schema: &MessageSchema,
        buf: &mut BytesMut,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;

        for field in schema.fields() {
            let Some(value) = message.get(field.name()) else {
                continue;
            };

            if !field.is_repeated() {
                if !field.has_presence() && value.is_default() {
                    continue;
                }
                encode_tag(field.number(), field.field_type().wire_type(), buf);
                self.encode_value(field, value, buf, depth)?;
                continue;
            }

            let items = value
                .as_list()
                .ok_or_else(|| Error::type_mismatch(field.name(), "a list"))?;
            if items.is_empty() {
                continue;
            }

            if field.is_packed() {
                let mut packed = BytesMut::new();
                for item in items {
                    self.encode_value(field, item, &mut packed, depth)?;
                }
                encode_tag(field.number(), WireType::Len, buf);
                encode_length_delimited(&packed, buf);
            } else {
                for item in items {
                    encode_tag(field.number(), field.field_type().wire_type(), buf);
                    self.encode_value(field, item, buf, depth)?;
                }
            }
        }

        Ok(())
    }

    /// Write one value without its tag
    fn encode_value(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        buf: &mut BytesMut,
        depth: usize,
    ) -> Result<()> {
        match (field.field_type(), value) {
            (LogicalType::Int32, Value::I32(v)) => encode_varint(*v as i64 as u64, buf),
            (LogicalType::Int64, Value::I64(v)) => encode_varint(from_host_integer(*v), buf),
            (LogicalType::UInt32, Value::U32(v)) => encode_varint(*v as u64, buf),
            (LogicalType::UInt64, Value::U64(v)) => encode_varint(*v, buf),
            (LogicalType::SInt32, Value::I32(v)) => encode_varint(encode_zigzag32(*v), buf),
            (LogicalType::SInt64, Value::I64(v)) => encode_varint(encode_zigzag64(*v), buf),
            (LogicalType::Fixed32, Value::U32(v)) => put_fixed32(*v, buf),
            (LogicalType::Fixed64, Value::U64(v)) => put_fixed64(*v, buf),
            (LogicalType::SFixed32, Value::I32(v)) => put_fixed32(*v as u32, buf),
            (LogicalType::SFixed64, Value::I64(v)) => put_fixed64(from_host_integer(*v), buf),
            (LogicalType::Bool, Value::Bool(v)) => encode_bool(*v, buf),
            (LogicalType::Float, Value::F32(v)) => put_float(*v, buf),
            (LogicalType::Double, Value::F64(v)) => put_double(*v, buf),
            (LogicalType::Enum(_), Value::Enum(v)) => encode_varint(*v as i64 as u64, buf),
            (LogicalType::String, Value::String(v)) => encode_length_delimited(v.as_bytes(), buf),
            (LogicalType::Bytes, Value::Bytes(v)) => encode_length_delimited(v, buf),
            (LogicalType::Message(type_name), Value::Message(nested)) => {
                let nested_schema = self.resolver.resolve_message(type_name)?;
                let mut body = BytesMut::new();
                self.encode_message(nested, nested_schema, &mut body, depth + 1)?;
                encode_length_delimited(&body, buf);
            }
            (field_type, _) => {
                return Err(Error::type_mismatch(field.name(), field_type.expected_value()));
            }
        }
        Ok(())
    }

    fn merge_message(
        &self,
        reader: &mut WireReader<'_>,
        schema: &MessageSchema,
        message: &mut Message,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;

        while !reader.is_exhausted() {
            let offset = reader.position();
            let (number, wire_type) = reader.read_tag()?;

            let Some(field) = schema.field_by_number(number) else {
                trace!("{}: skipping unknown field {} at offset {}", schema.name(), number, offset);
                reader.skip_field(number, wire_type)?;
                continue;
            };

            self.merge_field(reader, field, wire_type, message, offset, depth)?;
        }

        Ok(())
    }

    fn merge_field(
        &self,
        reader: &mut WireReader<'_>,
        field: &FieldDescriptor,
        wire_type: WireType,
        message: &mut Message,
        offset: usize,
        depth: usize,
    ) -> Result<()> {
        let expected = field.field_type().wire_type();

        // Packed and unpacked forms are both accepted for any packable repeated field
        if field.is_repeated() && wire_type == WireType::Len && field.field_type().is_packable() {
            let len = reader.read_length()?;
            let old = reader.push_limit(len)?;
            let mut items = Vec::new();
            while !reader.is_exhausted() {
                items.push(self.read_scalar(reader, field.field_type())?);
            }
            reader.pop_limit(old);

            trace!("{}: {} packed values", field.name(), items.len());
            append(message, field, items);
            return Ok(());
        }

        if wire_type != expected {
            return Err(Error::WireTypeMismatch {
                field: field.name().to_string(),
                expected: expected as u8,
                found: wire_type as u8,
                offset,
            });
        }

        if let LogicalType::Message(type_name) = field.field_type() {
            let nested_schema = self.resolver.resolve_message(type_name)?;
            let len = reader.read_length()?;
            let old = reader.push_limit(len)?;

            if field.is_repeated() {
                let mut nested = self.default_message(nested_schema);
                self.merge_message(reader, nested_schema, &mut nested, depth + 1)?;
                append(message, field, vec![Value::Message(nested)]);
            } else {
                // A repeated occurrence of a singular message merges into the first
                let mut nested = match message.remove(field.name()) {
                    Some(Value::Message(existing)) => existing,
                    _ => self.default_message(nested_schema),
                };
                self.merge_message(reader, nested_schema, &mut nested, depth + 1)?;
                message.insert(field.name(), Value::Message(nested));
            }

            reader.pop_limit(old);
            return Ok(());
        }

        let value = self.read_scalar(reader, field.field_type())?;
        if field.is_repeated() {
            append(message, field, vec![value]);
        } else {
            message.insert(field.name(), value);
        }
        Ok(())
    }

    /// Read one non-message value whose tag has already been consumed
    fn read_scalar(&self, reader: &mut WireReader<'_>, field_type: &LogicalType) -> Result<Value> {
        let integers = self.config.integers;
        let value = match field_type {
            LogicalType::Int32 => Value::I32(reader.read_varint()? as i32),
            LogicalType::Int64 => Value::I64(integers.to_host_i64(reader.read_varint()? as i64)?),
            LogicalType::UInt32 => Value::U32(reader.read_varint()? as u32),
            LogicalType::UInt64 => Value::U64(integers.to_host_u64(reader.read_varint()?)?),
            LogicalType::SInt32 => Value::I32(decode_zigzag32(reader.read_varint()?)),
            LogicalType::SInt64 => {
                Value::I64(integers.to_host_i64(decode_zigzag64(reader.read_varint()?))?)
            }
            LogicalType::Fixed32 => Value::U32(reader.read_fixed32()?),
            LogicalType::Fixed64 => Value::U64(integers.to_host_u64(reader.read_fixed64()?)?),
            LogicalType::SFixed32 => Value::I32(reader.read_fixed32()? as i32),
            LogicalType::SFixed64 => Value::I64(integers.to_host_i64(reader.read_fixed64()? as i64)?),
            LogicalType::Bool => Value::Bool(reader.read_varint()? != 0),
            LogicalType::Float => Value::F32(f32::from_bits(reader.read_fixed32()?)),
            LogicalType::Double => Value::F64(f64::from_bits(reader.read_fixed64()?)),
            LogicalType::Enum(_) => Value::Enum(reader.read_varint()? as i32),
            LogicalType::String => {
                let payload = reader.read_bytes()?;
                let offset = reader.position() - payload.len();
                Value::String(decode_string(payload, self.config.utf8, offset)?)
            }
            LogicalType::Bytes => Value::Bytes(Bytes::copy_from_slice(reader.read_bytes()?)),
            LogicalType::Message(type_name) => {
                return Err(Error::invalid_schema(type_name.as_str(), "message read as a scalar"));
            }
        };
        Ok(value)
    }
}

fn append(message: &mut Message, field: &FieldDescriptor, items: Vec<Value>) {
    match message.get_mut(field.name()) {
        Some(Value::List(existing)) => existing.extend(items),
        _ => {
            message.insert(field.name(), Value::List(items));
        }
    }
}

#[cfg(test)]
mod tests;
