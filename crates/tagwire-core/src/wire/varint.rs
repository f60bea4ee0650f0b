//! Base-128 variable-length integers.
//!
//! Every `int32`, `int64`, `uint32`, `uint64`, `bool` and `enum` value travels
//! as a plain varint of its 64-bit two's-complement bit pattern. `sint32` and
//! `sint64` are zig-zag mapped first.

use crate::error::{Error, Result};
use bytes::BufMut;

/// Longest possible encoding of a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a varint into the buffer, low-order group first.
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed. Offsets in
/// errors are relative to `data`.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        // The tenth byte holds only bit 63
        if i >= MAX_VARINT_LEN || (i == MAX_VARINT_LEN - 1 && byte > 0x01) {
            return Err(Error::malformed_varint(0));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::malformed_varint(0))
}

/// Number of bytes `encode_varint` emits for `value`
pub fn encoded_len_varint(value: u64) -> usize {
    // Each byte carries 7 bits; a zero still takes one byte.
    ((64 - (value | 1).leading_zeros() as usize) + 6) / 7
}

/// Encode a bool as varint 0/1
pub fn encode_bool(value: bool, buf: &mut impl BufMut) {
    buf.put_u8(value as u8);
}

/// Zig-zag map a signed 32-bit value so small magnitudes stay short
pub fn encode_zigzag32(value: i32) -> u64 {
    ((value << 1) ^ (value >> 31)) as u32 as u64
}

/// Inverse of [`encode_zigzag32`]; only the low 32 bits are significant
pub fn decode_zigzag32(value: u64) -> i32 {
    let value = value as u32;
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Zig-zag map a signed 64-bit value
pub fn encode_zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`encode_zigzag64`]
pub fn decode_zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
