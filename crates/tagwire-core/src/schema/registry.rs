//! Process-wide schema registry.
//!
//! Schemas are registered once at start-up, either by hand or from compiled
//! `FileDescriptorSet`s (`protoc --descriptor_set_out`), and only read after
//! that.

use super::{EnumSchema, FieldDescriptor, LogicalType, MessageSchema, SchemaResolver, UNRECOGNIZED_CODE};
use crate::error::{Error, Result};
use prost_reflect::{DescriptorPool, EnumDescriptor, Kind, MessageDescriptor};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

/// Message and enum schemas keyed by fully qualified name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    messages: BTreeMap<String, MessageSchema>,
    enums: BTreeMap<String, EnumSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message schema, returning any schema it replaces
    pub fn register_message(&mut self, schema: MessageSchema) -> Option<MessageSchema> {
        trace!("Registering message {}", schema.name());
        self.messages.insert(schema.name().to_string(), schema)
    }

    /// Adds an enum schema, returning any schema it replaces
    pub fn register_enum(&mut self, schema: EnumSchema) -> Option<EnumSchema> {
        trace!("Registering enum {}", schema.name());
        self.enums.insert(schema.name().to_string(), schema)
    }

    /// Builder-style [`SchemaRegistry::register_message`]
    pub fn with_message(mut self, schema: MessageSchema) -> Self {
        self.register_message(schema);
        self
    }

    /// Builder-style [`SchemaRegistry::register_enum`]
    pub fn with_enum(mut self, schema: EnumSchema) -> Self {
        self.register_enum(schema);
        self
    }

    /// Builds a registry from every message and enum in a descriptor pool
    pub fn from_descriptor_pool(pool: &DescriptorPool) -> Result<Self> {
        let mut registry = Self::new();
        registry.extend_from_pool(pool)?;
        Ok(registry)
    }

    /// Builds a registry from encoded `FileDescriptorSet`s.
    ///
    /// Sets may overlap; identical files are only loaded once.
    pub fn from_file_descriptor_sets<I, B>(sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut pool = DescriptorPool::new();
        for set in sets {
            pool.decode_file_descriptor_set(set.as_ref())
                .map_err(|e| Error::descriptor_build(e.to_string()))?;
        }
        Self::from_descriptor_pool(&pool)
    }

    /// Reads one encoded `FileDescriptorSet` from disk
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        debug!("Loading descriptor set {} ({} bytes)", path.display(), data.len());
        Self::from_file_descriptor_sets([data])
    }

    /// Adds every message and enum in a descriptor pool
    pub fn extend_from_pool(&mut self, pool: &DescriptorPool) -> Result<()> {
        let mut messages = 0;
        for descriptor in pool.all_messages() {
            self.register_message(convert_message(&descriptor)?);
            messages += 1;
        }

        let mut enums = 0;
        for descriptor in pool.all_enums() {
            self.register_enum(convert_enum(&descriptor)?);
            enums += 1;
        }

        debug!("Loaded {} message and {} enum schemas", messages, enums);
        Ok(())
    }

    /// Registered message type names, sorted
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Registered enum type names, sorted
    pub fn enum_names(&self) -> impl Iterator<Item = &str> {
        self.enums.keys().map(String::as_str)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.messages.len() + self.enums.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.enums.is_empty()
    }
}

impl SchemaResolver for SchemaRegistry {
    fn message(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.get(name.trim_start_matches('.'))
    }

    fn enumeration(&self, name: &str) -> Option<&EnumSchema> {
        self.enums.get(name.trim_start_matches('.'))
    }
}

fn convert_message(descriptor: &MessageDescriptor) -> Result<MessageSchema> {
    let fields = descriptor.fields().map(|field| {
        let field_type = match field.kind() {
            Kind::Double => LogicalType::Double,
            Kind::Float => LogicalType::Float,
            Kind::Int32 => LogicalType::Int32,
            Kind::Int64 => LogicalType::Int64,
            Kind::Uint32 => LogicalType::UInt32,
            Kind::Uint64 => LogicalType::UInt64,
            Kind::Sint32 => LogicalType::SInt32,
            Kind::Sint64 => LogicalType::SInt64,
            Kind::Fixed32 => LogicalType::Fixed32,
            Kind::Fixed64 => LogicalType::Fixed64,
            Kind::Sfixed32 => LogicalType::SFixed32,
            Kind::Sfixed64 => LogicalType::SFixed64,
            Kind::Bool => LogicalType::Bool,
            Kind::String => LogicalType::String,
            Kind::Bytes => LogicalType::Bytes,
            Kind::Message(message) => LogicalType::Message(message.full_name().to_string()),
            Kind::Enum(enumeration) => LogicalType::Enum(enumeration.full_name().to_string()),
        };

        let converted = FieldDescriptor::new(field.name(), field.number(), field_type)
            .with_json_name(field.json_name());

        // Map fields travel as repeated entry messages
        if field.is_list() || field.is_map() {
            if field.is_packed() {
                converted.packed()
            } else {
                converted.repeated()
            }
        } else if field.supports_presence() {
            converted.optional()
        } else {
            converted
        }
    });

    MessageSchema::new(descriptor.full_name(), fields)
}

fn convert_enum(descriptor: &EnumDescriptor) -> Result<EnumSchema> {
    let values: Vec<(String, i32)> = descriptor
        .values()
        .map(|value| (value.name().to_string(), value.number()))
        .collect();
    let declares_sentinel = values.iter().any(|(_, code)| *code == UNRECOGNIZED_CODE);

    let schema = EnumSchema::new(descriptor.full_name(), values)?;
    Ok(if declares_sentinel {
        schema
    } else {
        schema.with_unrecognized()
    })
}
