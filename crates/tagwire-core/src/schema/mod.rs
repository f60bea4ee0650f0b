//! Schema descriptors that drive the codec.
//!
//! A [`MessageSchema`] is an ordered table of [`FieldDescriptor`]s. Message
//! and enum fields refer to other types by fully qualified name; a
//! [`SchemaResolver`] (usually a [`SchemaRegistry`]) supplies them at
//! encode/decode time, which also allows recursive message types.
//!
//! Schemas are immutable once built and are meant to be shared across threads.

mod registry;

use crate::error::{Error, Result};
use crate::value::Value;
use crate::wire::WireType;
use crate::MAX_FIELD_NUMBER;
use bytes::Bytes;
use std::collections::HashSet;

pub use registry::SchemaRegistry;

/// Code of the conventional "unrecognized" enum value
pub const UNRECOGNIZED_CODE: i32 = -1;

/// Symbolic name of the unrecognized sentinel
pub const UNRECOGNIZED_NAME: &str = "UNRECOGNIZED";

/// Name rendered for enum codes without a symbol
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// Logical type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Varint, 32-bit two's complement
    Int32,
    /// Varint, 64-bit two's complement
    Int64,
    /// Varint, unsigned 32-bit
    UInt32,
    /// Varint, unsigned 64-bit
    UInt64,
    /// Zig-zag varint, signed 32-bit
    SInt32,
    /// Zig-zag varint, signed 64-bit
    SInt64,
    /// Little-endian unsigned 32-bit
    Fixed32,
    /// Little-endian unsigned 64-bit
    Fixed64,
    /// Little-endian signed 32-bit
    SFixed32,
    /// Little-endian signed 64-bit
    SFixed64,
    /// Varint 0/1
    Bool,
    /// IEEE-754 binary32
    Float,
    /// IEEE-754 binary64
    Double,
    /// UTF-8 text
    String,
    /// Raw bytes
    Bytes,
    /// Enum, by fully qualified name
    Enum(String),
    /// Embedded message, by fully qualified name
    Message(String),
}

impl LogicalType {
    /// Wire type used for a single value of this type
    pub fn wire_type(&self) -> WireType {
        match self {
            LogicalType::Int32
            | LogicalType::Int64
            | LogicalType::UInt32
            | LogicalType::UInt64
            | LogicalType::SInt32
            | LogicalType::SInt64
            | LogicalType::Bool
            | LogicalType::Enum(_) => WireType::Varint,
            LogicalType::Fixed64 | LogicalType::SFixed64 | LogicalType::Double => WireType::I64,
            LogicalType::Fixed32 | LogicalType::SFixed32 | LogicalType::Float => WireType::I32,
            LogicalType::String | LogicalType::Bytes | LogicalType::Message(_) => WireType::Len,
        }
    }

    /// Whether repeated values of this type may share one packed region
    pub fn is_packable(&self) -> bool {
        self.wire_type() != WireType::Len
    }

    /// Whether values of this type are 64 bits wide
    pub fn is_64bit(&self) -> bool {
        matches!(
            self,
            LogicalType::Int64
                | LogicalType::UInt64
                | LogicalType::SInt64
                | LogicalType::Fixed64
                | LogicalType::SFixed64
        )
    }

    /// Zero value of the type; `None` for messages, which have no default
    pub fn default_value(&self) -> Option<Value> {
        let value = match self {
            LogicalType::Int32 | LogicalType::SInt32 | LogicalType::SFixed32 => Value::I32(0),
            LogicalType::Int64 | LogicalType::SInt64 | LogicalType::SFixed64 => Value::I64(0),
            LogicalType::UInt32 | LogicalType::Fixed32 => Value::U32(0),
            LogicalType::UInt64 | LogicalType::Fixed64 => Value::U64(0),
            LogicalType::Bool => Value::Bool(false),
            LogicalType::Float => Value::F32(0.0),
            LogicalType::Double => Value::F64(0.0),
            LogicalType::String => Value::String(String::new()),
            LogicalType::Bytes => Value::Bytes(Bytes::new()),
            LogicalType::Enum(_) => Value::Enum(0),
            LogicalType::Message(_) => return None,
        };
        Some(value)
    }

    /// Describes the [`Value`] variant this type expects, for error messages
    pub fn expected_value(&self) -> &'static str {
        match self {
            LogicalType::Int32 | LogicalType::SInt32 | LogicalType::SFixed32 => "an i32",
            LogicalType::Int64 | LogicalType::SInt64 | LogicalType::SFixed64 => "an i64",
            LogicalType::UInt32 | LogicalType::Fixed32 => "a u32",
            LogicalType::UInt64 | LogicalType::Fixed64 => "a u64",
            LogicalType::Bool => "a bool",
            LogicalType::Float => "an f32",
            LogicalType::Double => "an f64",
            LogicalType::String => "a string",
            LogicalType::Bytes => "a bytes",
            LogicalType::Enum(_) => "an enum",
            LogicalType::Message(_) => "a message",
        }
    }
}

/// How many values a field holds and how repeated values are framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one value
    Singular,
    /// Any number of values, one tag each
    Repeated,
    /// Any number of values, written as one length-delimited run
    Packed,
}

/// Whether "unset" is distinguishable from the zero value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Zero value and absence are the same thing on the wire
    Implicit,
    /// Absence is tracked; a present zero value is still written
    Explicit,
}

/// Describes one field of a message type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    json_name: String,
    number: u32,
    field_type: LogicalType,
    cardinality: Cardinality,
    presence: Presence,
}

impl FieldDescriptor {
    /// Creates a singular field.
    ///
    /// Message fields get explicit presence; everything else starts implicit.
    pub fn new(name: impl Into<String>, number: u32, field_type: LogicalType) -> Self {
        let name = name.into();
        let presence = match field_type {
            LogicalType::Message(_) => Presence::Explicit,
            _ => Presence::Implicit,
        };
        Self {
            json_name: name.clone(),
            name,
            number,
            field_type,
            cardinality: Cardinality::Singular,
            presence,
        }
    }

    /// Marks the field repeated with one tag per element
    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Marks the field repeated and packed
    pub fn packed(mut self) -> Self {
        self.cardinality = Cardinality::Packed;
        self
    }

    /// Gives the field explicit presence (`optional` in schema terms)
    pub fn optional(mut self) -> Self {
        self.presence = Presence::Explicit;
        self
    }

    /// Sets the key used by the textual projection
    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = json_name.into();
        self
    }

    /// Declared field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used in textual form
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Logical type
    pub fn field_type(&self) -> &LogicalType {
        &self.field_type
    }

    /// Cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Presence tracking
    pub fn presence(&self) -> Presence {
        match self.cardinality {
            Cardinality::Singular => self.presence,
            _ => Presence::Implicit,
        }
    }

    /// True for repeated and packed fields
    pub fn is_repeated(&self) -> bool {
        self.cardinality != Cardinality::Singular
    }

    /// True when the field is written as a packed run
    pub fn is_packed(&self) -> bool {
        self.cardinality == Cardinality::Packed
    }

    /// True when absence must be preserved
    pub fn has_presence(&self) -> bool {
        self.presence() == Presence::Explicit
    }

    /// Value a freshly decoded message holds for this field, if any
    pub fn initial_value(&self) -> Option<Value> {
        if self.is_repeated() {
            return Some(Value::List(Vec::new()));
        }
        if self.has_presence() {
            return None;
        }
        self.field_type.default_value()
    }
}

/// An ordered collection of field descriptors for one message type
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    /// Builds a schema, sorting fields by number and validating them.
    ///
    /// Field numbers must be unique and within `1..=MAX_FIELD_NUMBER`, names
    /// must be unique, and only numeric, bool and enum fields may be packed.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = FieldDescriptor>) -> Result<Self> {
        let name = name.into();
        let mut fields: Vec<FieldDescriptor> = fields.into_iter().collect();
        fields.sort_by_key(|f| f.number);

        let mut names = HashSet::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if field.number == 0 || field.number > MAX_FIELD_NUMBER {
                return Err(Error::invalid_schema(
                    &name,
                    format!(
                        "field '{}' has number {}, expected 1..={}",
                        field.name, field.number, MAX_FIELD_NUMBER
                    ),
                ));
            }
            if i > 0 && fields[i - 1].number == field.number {
                return Err(Error::invalid_schema(
                    &name,
                    format!("field number {} is declared twice", field.number),
                ));
            }
            if !names.insert(field.name.as_str()) {
                return Err(Error::invalid_schema(
                    &name,
                    format!("field name '{}' is declared twice", field.name),
                ));
            }
            if field.is_packed() && !field.field_type.is_packable() {
                return Err(Error::invalid_schema(
                    &name,
                    format!("field '{}' cannot be packed", field.name),
                ));
            }
        }
        drop(names);

        Ok(Self { name, fields })
    }

    /// Fully qualified type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in ascending number order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by number
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields
            .binary_search_by_key(&number, |f| f.number)
            .ok()
            .map(|i| &self.fields[i])
    }

    /// Looks up a field by declared name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Symbol table of an enum type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema {
    name: String,
    values: Vec<(String, i32)>,
    unrecognized: bool,
}

impl EnumSchema {
    /// Builds an enum table. Codes may repeat (aliases); names may not.
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = (N, i32)>,
    ) -> Result<Self> {
        let name = name.into();
        let values: Vec<(String, i32)> = values.into_iter().map(|(n, c)| (n.into(), c)).collect();

        let mut names = HashSet::new();
        for (symbol, _) in &values {
            if !names.insert(symbol.as_str()) {
                return Err(Error::invalid_schema(
                    &name,
                    format!("enum value '{}' is declared twice", symbol),
                ));
            }
        }
        drop(names);

        Ok(Self {
            name,
            values,
            unrecognized: false,
        })
    }

    /// Adds the `UNRECOGNIZED = -1` sentinel
    pub fn with_unrecognized(mut self) -> Self {
        self.unrecognized = true;
        self
    }

    /// Fully qualified type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared `(name, code)` pairs
    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }

    /// Whether the sentinel is defined
    pub fn has_unrecognized(&self) -> bool {
        self.unrecognized
    }

    /// First symbol declared for a code
    pub fn name_of(&self, code: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(n, _)| n.as_str())
            .or_else(|| (self.unrecognized && code == UNRECOGNIZED_CODE).then_some(UNRECOGNIZED_NAME))
    }

    /// Code of a symbol
    pub fn code_of(&self, symbol: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(n, _)| n == symbol)
            .map(|(_, c)| *c)
            .or_else(|| (self.unrecognized && symbol == UNRECOGNIZED_NAME).then_some(UNRECOGNIZED_CODE))
    }
}

/// Supplies schemas for type references.
///
/// Implement this to back the codec with something other than a
/// [`SchemaRegistry`], e.g. a lazily populated cache.
pub trait SchemaResolver: Send + Sync {
    /// Looks up a message schema by fully qualified name
    fn message(&self, name: &str) -> Option<&MessageSchema>;

    /// Looks up an enum schema by fully qualified name
    fn enumeration(&self, name: &str) -> Option<&EnumSchema>;

    /// Like [`SchemaResolver::message`], failing with [`Error::UnknownType`]
    fn resolve_message(&self, name: &str) -> Result<&MessageSchema> {
        self.message(name).ok_or_else(|| Error::unknown_type(name))
    }

    /// Like [`SchemaResolver::enumeration`], failing with [`Error::UnknownType`]
    fn resolve_enum(&self, name: &str) -> Result<&EnumSchema> {
        self.enumeration(name).ok_or_else(|| Error::unknown_type(name))
    }
}
