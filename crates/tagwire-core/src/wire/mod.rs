//! Low-level protobuf wire format.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated, skipped on read, never written)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! The scalar codecs live in [`varint`], [`fixed`] and [`delimited`] and work
//! on plain slices. [`WireReader`] ties them to a cursor with nested length
//! limits so that errors report absolute offsets.

pub mod delimited;
pub mod fixed;
pub mod varint;

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use bytes::BufMut;
use tracing::trace;

pub use delimited::{decode_length_delimited, decode_string, encode_length_delimited, Utf8Policy};
pub use fixed::{get_double, get_fixed32, get_fixed64, get_float, put_double, put_fixed32, put_fixed64, put_float};
pub use varint::{
    decode_varint, decode_zigzag32, decode_zigzag64, encode_bool, encode_varint,
    encode_zigzag32, encode_zigzag64, encoded_len_varint, MAX_VARINT_LEN,
};

/// Maximum nesting of deprecated groups skipped inside one field
const MAX_GROUP_DEPTH: usize = 100;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::unknown_wire_type(value, 0)),
        }
    }
}

/// Combine a field number and wire type into a tag value
pub fn make_tag(field_number: u32, wire_type: WireType) -> u64 {
    ((field_number as u64) << 3) | wire_type as u64
}

/// Write a field tag
pub fn encode_tag(field_number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    encode_varint(make_tag(field_number, wire_type), buf);
}

/// Forward-only cursor over an encoded buffer.
///
/// The reader never looks past its current limit; [`WireReader::push_limit`]
/// narrows it to an embedded message and [`WireReader::pop_limit`] restores it.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over the whole buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len(),
        }
    }

    /// Current absolute offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the current limit
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    /// True once the cursor has reached the current limit
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.limit
    }

    /// Restrict reads to the next `len` bytes; returns the previous limit.
    pub fn push_limit(&mut self, len: usize) -> Result<usize> {
        if len > self.remaining() {
            return Err(Error::truncated(self.pos, len, self.remaining()));
        }
        let old = self.limit;
        self.limit = self.pos + len;
        Ok(old)
    }

    /// Restore a limit returned by [`WireReader::push_limit`]
    pub fn pop_limit(&mut self, old: usize) {
        self.limit = old;
    }

    fn window(&self) -> &'a [u8] {
        &self.data[self.pos..self.limit]
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::truncated(self.pos, len, self.remaining()));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    /// Read a varint
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, len) =
            decode_varint(self.window()).map_err(|_| Error::malformed_varint(self.pos))?;
        self.pos += len;
        Ok(value)
    }

    /// Read a field tag, validating the field number and wire type
    pub fn read_tag(&mut self) -> Result<(u32, WireType)> {
        let offset = self.pos;
        let tag = self.read_varint()?;
        let bits = (tag & 0x07) as u8;
        let wire_type =
            WireType::try_from(bits).map_err(|_| Error::unknown_wire_type(bits, offset))?;

        let number = tag >> 3;
        if number == 0 || number > MAX_FIELD_NUMBER as u64 {
            return Err(Error::InvalidFieldNumber {
                number,
                max: MAX_FIELD_NUMBER,
            });
        }

        Ok((number as u32, wire_type))
    }

    /// Read a little-endian 32-bit value
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        get_fixed32(bytes)
    }

    /// Read a little-endian 64-bit value
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        get_fixed64(bytes)
    }

    /// Read a length prefix and return the payload it covers
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_length()?;
        self.take(len)
    }

    /// Read a length prefix without consuming the payload
    pub fn read_length(&mut self) -> Result<usize> {
        let offset = self.pos;
        let len = self.read_varint()?;
        usize::try_from(len)
            .ok()
            .filter(|&len| len <= self.remaining())
            .ok_or_else(|| Error::truncated(offset, len as usize, self.remaining()))
    }

    /// Skip the value of a field whose tag has already been read
    pub fn skip_field(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        self.skip_field_at_depth(field_number, wire_type, 0)
    }

    fn skip_field_at_depth(
        &mut self,
        field_number: u32,
        wire_type: WireType,
        depth: usize,
    ) -> Result<()> {
        trace!(
            "Skipping field {} ({:?}) at offset {}",
            field_number,
            wire_type,
            self.pos
        );

        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::I64 => {
                self.take(8)?;
            }
            WireType::I32 => {
                self.take(4)?;
            }
            WireType::Len => {
                self.read_bytes()?;
            }
            WireType::StartGroup => {
                if depth >= MAX_GROUP_DEPTH {
                    return Err(Error::RecursionLimit {
                        limit: MAX_GROUP_DEPTH,
                    });
                }
                loop {
                    if self.is_exhausted() {
                        return Err(Error::truncated(self.pos, 1, 0));
                    }
                    let (number, inner) = self.read_tag()?;
                    if inner == WireType::EndGroup {
                        break;
                    }
                    self.skip_field_at_depth(number, inner, depth + 1)?;
                }
            }
            // A stray end marker carries no payload
            WireType::EndGroup => {}
        }

        Ok(())
    }
}
