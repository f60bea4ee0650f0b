//! JSON projection of structured messages.
//!
//! The projection is a pure value-tree transform:
//!
//! - keys are the field's JSON name (input also accepts the declared name)
//! - bytes are standard, padded base64
//! - 64-bit integers are JSON numbers, bounded by the codec's
//!   [`IntegerStrategy`](crate::IntegerStrategy)
//! - enums are symbolic names on output; names or codes on input
//! - unset message fields are omitted, never rendered as `null`
//!
//! Input is coerced rather than validated: a value that cannot be read as the
//! field's type falls back to the type's zero value, and an enum input that
//! matches no declared symbol or code becomes `UNRECOGNIZED`. Numbers that do
//! not fit the field, fractional integers and malformed base64 are errors.

use crate::codec::MessageCodec;
use crate::error::{Error, Result};
use crate::schema::{
    FieldDescriptor, LogicalType, MessageSchema, SchemaResolver, UNKNOWN_NAME, UNRECOGNIZED_CODE,
};
use crate::value::{Message, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;

impl<R: SchemaResolver + ?Sized> MessageCodec<'_, R> {
    /// Project a message to a JSON value
    pub fn to_textual(&self, message: &Message, schema: &MessageSchema) -> Result<JsonValue> {
        self.project_message(message, schema, 0)
    }

    /// Build a message from a JSON value
    pub fn from_textual(&self, value: &JsonValue, schema: &MessageSchema) -> Result<Message> {
        self.parse_message(value, schema, 0)
    }

    /// Parse JSON text and build a message from it
    pub fn from_textual_str(&self, text: &str, schema: &MessageSchema) -> Result<Message> {
        let value: JsonValue = serde_json::from_str(text)?;
        self.from_textual(&value, schema)
    }

    fn project_message(&self, message: &Message, schema: &MessageSchema, depth: usize) -> Result<JsonValue> {
        self.check_depth(depth)?;
        let mut object = Map::new();

        for field in schema.fields() {
            let value = message.get(field.name());

            let projected = if field.is_repeated() {
                match value {
                    Some(Value::List(items)) if !items.is_empty() => {
                        let items = items
                            .iter()
                            .map(|item| self.project_value(field, item, depth))
                            .collect::<Result<Vec<_>>>()?;
                        JsonValue::Array(items)
                    }
                    Some(Value::List(_)) | None if self.config.emit_defaults => JsonValue::Array(Vec::new()),
                    Some(Value::List(_)) | None => continue,
                    Some(_) => return Err(Error::type_mismatch(field.name(), "a list")),
                }
            } else if field.has_presence() {
                match value {
                    Some(value) => self.project_value(field, value, depth)?,
                    None => continue,
                }
            } else {
                match value {
                    Some(value) if !value.is_default() => self.project_value(field, value, depth)?,
                    _ if self.config.emit_defaults => match field.field_type().default_value() {
                        Some(default) => self.project_value(field, &default, depth)?,
                        None => continue,
                    },
                    _ => continue,
                }
            };

            object.insert(field.json_name().to_string(), projected);
        }

        Ok(JsonValue::Object(object))
    }

    fn project_value(&self, field: &FieldDescriptor, value: &Value, depth: usize) -> Result<JsonValue> {
        let integers = self.config.integers;
        let projected = match (field.field_type(), value) {
            (LogicalType::Bool, Value::Bool(v)) => JsonValue::Bool(*v),
            (LogicalType::Int32 | LogicalType::SInt32 | LogicalType::SFixed32, Value::I32(v)) => {
                JsonValue::from(*v)
            }
            (LogicalType::UInt32 | LogicalType::Fixed32, Value::U32(v)) => JsonValue::from(*v),
            (LogicalType::Int64 | LogicalType::SInt64 | LogicalType::SFixed64, Value::I64(v)) => {
                JsonValue::from(integers.to_host_i64(*v)?)
            }
            (LogicalType::UInt64 | LogicalType::Fixed64, Value::U64(v)) => {
                JsonValue::from(integers.to_host_u64(*v)?)
            }
            (LogicalType::Float, Value::F32(v)) => project_float(*v as f64),
            (LogicalType::Double, Value::F64(v)) => project_float(*v),
            (LogicalType::String, Value::String(v)) => JsonValue::String(v.clone()),
            (LogicalType::Bytes, Value::Bytes(v)) => JsonValue::String(STANDARD.encode(v)),
            (LogicalType::Enum(type_name), Value::Enum(code)) => {
                if self.config.enums_as_numbers {
                    JsonValue::from(*code)
                } else {
                    let schema = self.resolver.resolve_enum(type_name)?;
                    JsonValue::String(schema.name_of(*code).unwrap_or(UNKNOWN_NAME).to_string())
                }
            }
            (LogicalType::Message(type_name), Value::Message(nested)) => {
                let schema = self.resolver.resolve_message(type_name)?;
                self.project_message(nested, schema, depth + 1)?
            }
            (field_type, _) => {
                return Err(Error::type_mismatch(field.name(), field_type.expected_value()));
            }
        };
        Ok(projected)
    }

    fn parse_message(&self, value: &JsonValue, schema: &MessageSchema, depth: usize) -> Result<Message> {
        self.check_depth(depth)?;
        let mut message = self.default_message(schema);

        let Some(object) = value.as_object() else {
            debug!("{}: expected a JSON object, using defaults", schema.name());
            return Ok(message);
        };

        for field in schema.fields() {
            let input = object
                .get(field.json_name())
                .or_else(|| object.get(field.name()))
                .filter(|v| !v.is_null());
            let Some(input) = input else {
                continue;
            };

            let parsed = if field.is_repeated() {
                let items = match input {
                    JsonValue::Array(items) => items
                        .iter()
                        .map(|item| self.parse_value(field, item, depth))
                        .collect::<Result<Vec<_>>>()?,
                    single => vec![self.parse_value(field, single, depth)?],
                };
                Value::List(items)
            } else {
                self.parse_value(field, input, depth)?
            };

            message.insert(field.name(), parsed);
        }

        Ok(message)
    }

    fn parse_value(&self, field: &FieldDescriptor, input: &JsonValue, depth: usize) -> Result<Value> {
        let value = match field.field_type() {
            LogicalType::Int32 | LogicalType::SInt32 | LogicalType::SFixed32 => {
                Value::I32(parse_integer(field, input, i32::MAX as u64)?)
            }
            LogicalType::Int64 | LogicalType::SInt64 | LogicalType::SFixed64 => {
                let value = parse_integer(field, input, i64::MAX as u64)?;
                Value::I64(self.config.integers.to_host_i64(value)?)
            }
            LogicalType::UInt32 | LogicalType::Fixed32 => {
                Value::U32(parse_integer(field, input, u32::MAX as u64)?)
            }
            LogicalType::UInt64 | LogicalType::Fixed64 => {
                let value = parse_integer(field, input, u64::MAX)?;
                Value::U64(self.config.integers.to_host_u64(value)?)
            }
            LogicalType::Float => Value::F32(coerce_f64(input).unwrap_or(0.0) as f32),
            LogicalType::Double => Value::F64(coerce_f64(input).unwrap_or(0.0)),
            LogicalType::Bool => Value::Bool(coerce_bool(input)),
            LogicalType::String => Value::String(match input {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            }),
            LogicalType::Bytes => match input {
                JsonValue::String(s) => {
                    let decoded = STANDARD.decode(s).map_err(|source| Error::InvalidBase64 {
                        field: field.name().to_string(),
                        source,
                    })?;
                    Value::Bytes(Bytes::from(decoded))
                }
                _ => Value::Bytes(Bytes::new()),
            },
            LogicalType::Enum(type_name) => {
                let schema = self.resolver.resolve_enum(type_name)?;
                // Only declared symbols and codes are kept
                let code = match input {
                    JsonValue::String(symbol) => schema.code_of(symbol),
                    JsonValue::Number(n) => n
                        .as_i64()
                        .and_then(|code| i32::try_from(code).ok())
                        .filter(|&code| schema.name_of(code).is_some()),
                    _ => None,
                };
                Value::Enum(code.unwrap_or(UNRECOGNIZED_CODE))
            }
            LogicalType::Message(type_name) => {
                let schema = self.resolver.resolve_message(type_name)?;
                Value::Message(self.parse_message(input, schema, depth + 1)?)
            }
        };
        Ok(value)
    }
}

/// Finite floats become numbers; the rest use their conventional names
fn project_float(value: f64) -> JsonValue {
    match Number::from_f64(value) {
        Some(number) => JsonValue::Number(number),
        None if value.is_nan() => JsonValue::String("NaN".to_string()),
        None if value > 0.0 => JsonValue::String("Infinity".to_string()),
        None => JsonValue::String("-Infinity".to_string()),
    }
}

/// Exact integer held by a JSON number, numeric string or bool.
///
/// `None` when the input is not numeric at all.
fn integer_input(field: &FieldDescriptor, input: &JsonValue) -> Result<Option<i128>> {
    let float = match input {
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                return Ok(Some(v.into()));
            }
            if let Some(v) = n.as_u64() {
                return Ok(Some(v.into()));
            }
            n.as_f64()
        }
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i128>() {
                return Ok(Some(v));
            }
            s.parse::<f64>().ok()
        }
        JsonValue::Bool(b) => return Ok(Some(i128::from(*b))),
        _ => None,
    };

    match float {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i128)),
        Some(_) => Err(Error::type_mismatch(field.name(), "an integral number")),
    }
}

/// Integer input narrowed to the field's width; zero for non-numeric input
fn parse_integer<T>(field: &FieldDescriptor, input: &JsonValue, ceiling: u64) -> Result<T>
where
    T: TryFrom<i128> + Default,
{
    match integer_input(field, input)? {
        Some(value) => T::try_from(value).map_err(|_| Error::integer_overflow(value, ceiling)),
        None => Ok(T::default()),
    }
}

fn coerce_f64(input: &JsonValue) -> Option<f64> {
    match input {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => match s.trim() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse::<f64>().ok(),
        },
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn coerce_bool(input: &JsonValue) -> bool {
    match input {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s.trim() == "true",
        JsonValue::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}
