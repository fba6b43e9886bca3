//! Unsigned variable-length integers
//!
//! Each byte carries 7 payload bits, least significant group first. The high
//! bit is set when more bytes follow and clear on the final byte, so a `u64`
//! takes between 1 and 10 bytes.

use crate::error::{Error, Result};
use bytes::BufMut;

/// Maximum number of bytes a `u64` varint can occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode `value` into a fresh buffer.
pub fn encode(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    encode_into(&mut buf, value);
    buf
}

/// Append the encoding of `value` to `buf`.
pub fn encode_into(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80;
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode one varint starting at `offset`.
///
/// Returns the value and the offset of the first byte after it. Fails with
/// `MalformedEncoding` when the buffer ends before a terminating byte or the
/// encoding does not fit in a `u64`.
pub fn decode(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;

    for (position, &byte) in bytes.iter().enumerate().skip(offset) {
        let payload = (byte & 0x7F) as u64;

        // The tenth byte may only contribute the top bit of a u64.
        if shift > 63 || (shift == 63 && payload > 1) {
            return Err(Error::MalformedEncoding(format!(
                "varint at offset {} overflows u64",
                offset
            )));
        }

        value |= payload << shift;

        if byte & 0x80 == 0 {
            return Ok((value, position + 1));
        }

        shift += 7;
    }

    Err(Error::MalformedEncoding(format!(
        "buffer ended before varint terminator (offset {}, length {})",
        offset,
        bytes.len()
    )))
}

/// Number of bytes `encode(value)` produces.
pub fn encoded_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}
