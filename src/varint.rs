//! # Unsigned Varint
//!
//! LEB128-style unsigned varint encoding as used by the multicodec table
//! to prefix key bytes in a `did:key` identifier. Seven payload bits per
//! byte, least significant group first, high bit set on every byte
//! except the last.

use crate::error::Error;

/// Encode an unsigned integer as a varint byte string.
#[must_use]
pub fn encode(mut n: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2);
    while n & !0x7f != 0 {
        bytes.push((n & 0xff) as u8 | 0x80);
        n >>= 7;
    }
    bytes.push(n as u8);
    bytes
}

/// Decode a varint byte string back into an unsigned integer.
///
/// # Errors
///
/// Returns `Error::InvalidEncoding` when the input is empty, ends while
/// the continuation bit is still set, or encodes more than 64 bits.
pub fn decode(bytes: &[u8]) -> Result<u64, Error> {
    if bytes.is_empty() {
        return Err(Error::InvalidEncoding("empty varint".to_string()));
    }

    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate() {
        // 10 bytes carry up to 70 payload bits; byte 10 may only hold
        // the single bit that fits in a u64
        if i >= 10 || (i == 9 && byte & 0x7f > 1) {
            return Err(Error::InvalidEncoding("varint exceeds 64 bits".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(Error::InvalidEncoding("truncated varint".to_string()))
}
