//! Fixed-width little-endian values (wire types I32 and I64).

use crate::error::{Error, Result};
use bytes::BufMut;

/// Write a 32-bit little-endian value
pub fn put_fixed32(value: u32, buf: &mut impl BufMut) {
    buf.put_u32_le(value);
}

/// Write a 64-bit little-endian value
pub fn put_fixed64(value: u64, buf: &mut impl BufMut) {
    buf.put_u64_le(value);
}

/// Write an IEEE-754 binary32
pub fn put_float(value: f32, buf: &mut impl BufMut) {
    buf.put_f32_le(value);
}

/// Write an IEEE-754 binary64
pub fn put_double(value: f64, buf: &mut impl BufMut) {
    buf.put_f64_le(value);
}

/// Read a 32-bit little-endian value from the start of `data`
pub fn get_fixed32(data: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::truncated(0, 4, data.len()))?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read a 64-bit little-endian value from the start of `data`
pub fn get_fixed64(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::truncated(0, 8, data.len()))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Read an IEEE-754 binary32
pub fn get_float(data: &[u8]) -> Result<f32> {
    get_fixed32(data).map(f32::from_bits)
}

/// Read an IEEE-754 binary64
pub fn get_double(data: &[u8]) -> Result<f64> {
    get_fixed64(data).map(f64::from_bits)
}
