//! Length-delimited values: bytes, strings, embedded messages and packed runs.

use super::varint::{decode_varint, encode_varint};
use crate::error::{Error, Result};
use bytes::BufMut;

/// How invalid UTF-8 in a string field is handled on decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8Policy {
    /// Substitute U+FFFD for each invalid sequence
    #[default]
    Replace,
    /// Fail with [`Error::InvalidUtf8`]
    Strict,
}

/// Write a varint byte count followed by the bytes themselves
pub fn encode_length_delimited(data: &[u8], buf: &mut impl BufMut) {
    encode_varint(data.len() as u64, buf);
    buf.put_slice(data);
}

/// Read a length-delimited region from the start of `data`.
///
/// Returns the payload and the total bytes consumed, prefix included.
pub fn decode_length_delimited(data: &[u8]) -> Result<(&[u8], usize)> {
    let (length, prefix_len) = decode_varint(data)?;
    let available = data.len() - prefix_len;
    let length = usize::try_from(length)
        .ok()
        .filter(|&len| len <= available)
        .ok_or_else(|| Error::truncated(prefix_len, length as usize, available))?;

    let end = prefix_len + length;
    Ok((&data[prefix_len..end], end))
}

/// Convert a string payload to an owned `String` under the given policy.
///
/// `offset` is only used to locate the payload in error reports.
pub fn decode_string(data: &[u8], policy: Utf8Policy, offset: usize) -> Result<String> {
    match std::str::from_utf8(data) {
        Ok(s) => Ok(s.to_owned()),
        Err(source) => match policy {
            Utf8Policy::Replace => Ok(String::from_utf8_lossy(data).into_owned()),
            Utf8Policy::Strict => Err(Error::InvalidUtf8 { offset, source }),
        },
    }
}
