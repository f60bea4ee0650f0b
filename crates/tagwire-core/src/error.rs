//! Error types for the tagwire-core library.
//!
//! Every failure the codec can report is a variant of [`Error`]. Decode errors
//! carry the byte offset at which the problem was detected, relative to the
//! start of the buffer handed to the top-level decode call.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tagwire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all tagwire operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A varint ran past ten bytes or past the end of the buffer
    #[error("malformed varint at offset {offset}: unterminated or longer than 10 bytes")]
    MalformedVarint {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// A declared or implied length exceeds the remaining bytes
    #[error("truncated buffer at offset {offset}: need {needed} bytes, have {remaining}")]
    TruncatedBuffer {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes required by the read
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// The low three bits of a tag name no defined wire type
    #[error("unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType {
        /// The raw wire type bits
        wire_type: u8,
        /// Byte offset of the tag
        offset: usize,
    },

    /// Field number outside `1..=MAX_FIELD_NUMBER`
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u64,
        /// Maximum valid field number
        max: u32,
    },

    /// A known field arrived with a wire type its descriptor cannot accept
    #[error("field '{field}' at offset {offset}: expected wire type {expected}, found {found}")]
    WireTypeMismatch {
        /// Field name
        field: String,
        /// Wire type derived from the descriptor
        expected: u8,
        /// Wire type found on the wire
        found: u8,
        /// Byte offset of the tag
        offset: usize,
    },

    /// A 64-bit value does not fit the host's exact-integer range
    #[error("integer {value} exceeds the host safe-integer ceiling {ceiling}")]
    IntegerOverflow {
        /// Textual form of the offending value (it may be negative)
        value: String,
        /// The configured ceiling
        ceiling: u64,
    },

    /// A bytes field in textual form is not valid standard base64
    #[error("field '{field}' is not valid base64: {source}")]
    InvalidBase64 {
        /// Field name
        field: String,
        /// Underlying decode error
        #[source]
        source: base64::DecodeError,
    },

    /// A string field holds invalid UTF-8 and the policy is strict
    #[error("invalid UTF-8 in string at offset {offset}: {source}")]
    InvalidUtf8 {
        /// Byte offset of the string payload
        offset: usize,
        /// Underlying UTF-8 error
        #[source]
        source: std::str::Utf8Error,
    },

    /// Nested messages exceed the configured recursion limit
    #[error("recursion limit of {limit} nested messages exceeded")]
    RecursionLimit {
        /// Configured limit
        limit: usize,
    },

    /// A structured value does not match its field descriptor
    #[error("field '{field}' expects {expected} value")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Human readable description of the expected value
        expected: &'static str,
    },

    /// A message or enum type reference could not be resolved
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// A schema violates a structural invariant
    #[error("invalid schema for '{type_name}': {details}")]
    InvalidSchema {
        /// Type being built
        type_name: String,
        /// Detailed description of the violation
        details: String,
    },

    /// Failed to build schemas from a descriptor set
    #[error("failed to build descriptor pool: {0}")]
    DescriptorBuild(String),

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON text
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated buffer error
    pub fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::TruncatedBuffer {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a new unknown wire type error
    pub fn unknown_wire_type(wire_type: u8, offset: usize) -> Self {
        Self::UnknownWireType { wire_type, offset }
    }

    /// Creates a new integer overflow error
    pub fn integer_overflow(value: impl ToString, ceiling: u64) -> Self {
        Self::IntegerOverflow {
            value: value.to_string(),
            ceiling,
        }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
        }
    }

    /// Creates a new unknown type error
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType(name.into())
    }

    /// Creates a new schema validation error
    pub fn invalid_schema(type_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidSchema {
            type_name: type_name.into(),
            details: details.into(),
        }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error means the input does not conform to the schema.
    ///
    /// Such errors are deterministic: retrying with the same bytes or text
    /// fails the same way.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint { .. }
                | Self::TruncatedBuffer { .. }
                | Self::UnknownWireType { .. }
                | Self::InvalidFieldNumber { .. }
                | Self::WireTypeMismatch { .. }
                | Self::IntegerOverflow { .. }
                | Self::InvalidBase64 { .. }
                | Self::InvalidUtf8 { .. }
                | Self::RecursionLimit { .. }
                | Self::Json(_)
        )
    }
}
