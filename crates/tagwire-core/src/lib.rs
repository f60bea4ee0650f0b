//! # tagwire-core
//!
//! A schema-driven codec for the Protocol Buffers binary wire format, with a
//! JSON projection of the same messages.
//!
//! This crate provides:
//! - Scalar wire codecs: varints, fixed-width values and length-delimited payloads
//! - A bridge that keeps 64-bit integers within what the host can represent
//! - [`MessageCodec`], which encodes and decodes [`Message`]s against a [`MessageSchema`]
//! - A JSON projection with base64 bytes and symbolic enums
//!
//! ## Architecture
//!
//! - [`wire`]: Tags, varints, fixed-width values and the bounded [`wire::WireReader`]
//! - [`integer`]: The 64-bit integer bridge
//! - [`schema`]: Field and message descriptors plus [`SchemaRegistry`]
//! - [`value`]: The in-memory message representation
//! - [`codec`]: Binary encode and decode
//! - [`textual`]: JSON projection
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use tagwire_core::{FieldDescriptor, LogicalType, Message, MessageCodec, MessageSchema, SchemaRegistry, SchemaResolver};
//!
//! let registry = SchemaRegistry::new().with_message(MessageSchema::new(
//!     "demo.Block",
//!     [
//!         FieldDescriptor::new("height", 1, LogicalType::Int64),
//!         FieldDescriptor::new("hash", 2, LogicalType::Bytes),
//!     ],
//! )?);
//! let schema = registry.resolve_message("demo.Block")?;
//! let codec = MessageCodec::new(&registry);
//!
//! let message = codec.decode(&[0x08, 0xB9, 0x60, 0x12, 0x02, 0x01, 0x02], schema)?;
//! let json = codec.to_textual(&message, schema)?;
//! assert_eq!(json.to_string(), r#"{"hash":"AQI=","height":12345}"#);
//!
//! let encoded = codec.encode(&Message::new().with("height", 12345i64), schema)?;
//! assert_eq!(encoded.as_ref(), &[0x08, 0xB9, 0x60]);
//! # Ok::<(), tagwire_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! Type references inside schemas are resolved through [`SchemaResolver`].
//! [`SchemaRegistry`] is the stock implementation; anything that can look up
//! schemas by fully qualified name can stand in for it.
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod error;
pub mod integer;
pub mod schema;
pub mod textual;
pub mod value;
pub mod wire;

// Re-export primary types for convenience
pub use codec::{CodecConfig, MessageCodec};
pub use error::{Error, Result};
pub use integer::{IntegerStrategy, MAX_SAFE_INTEGER};
pub use schema::{
    Cardinality, EnumSchema, FieldDescriptor, LogicalType, MessageSchema, Presence, SchemaRegistry,
    SchemaResolver,
};
pub use value::{Message, Value};
pub use wire::{Utf8Policy, WireType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
