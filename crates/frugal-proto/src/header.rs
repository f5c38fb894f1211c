//! Versioned, length-prefixed header block.
//!
//! Every request, reply, oneway, and publish frame is preceded by a header
//! block:
//!
//! ```text
//! offset 0       : u8      version, must be 0x00
//! offset 1..5    : u32 be  size N of the header body
//! offset 5..5+N  : N bytes of header body
//! ```
//!
//! The body is a concatenation of `(u32 be key_len, key bytes, u32 be
//! value_len, value bytes)` tuples, UTF-8, with no padding or terminator.
//! Duplicate keys: the later occurrence wins.

use indexmap::IndexMap;

use crate::error::{ProtocolError, Result};

/// Wire version of the header block. Must be compared as an integer, not
/// the ASCII digit `'0'` (0x30).
pub const HEADER_VERSION: u8 = 0x00;

/// Ordered string-to-string header map, preserving insertion order of
/// first-seen keys across encode/decode round trips.
pub type Headers = IndexMap<String, String>;

/// Encode a header map into a version-prefixed, length-prefixed byte block.
#[must_use]
pub fn encode(headers: &Headers) -> Vec<u8> {
    let body_len: usize = headers
        .iter()
        .map(|(k, v)| 4 + k.len() + 4 + v.len())
        .sum();

    let mut out = Vec::with_capacity(5 + body_len);
    out.push(HEADER_VERSION);
    out.extend_from_slice(&u32_be(body_len));
    for (key, value) in headers {
        out.extend_from_slice(&u32_be(key.len()));
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&u32_be(value.len()));
        out.extend_from_slice(value.as_bytes());
    }
    out
}

/// Decode a header block starting at `offset` in `frame`.
///
/// Returns the decoded headers and the number of bytes consumed (including
/// the 5-byte version+size preamble).
pub fn decode(frame: &[u8], offset: usize) -> Result<(Headers, usize)> {
    let frame = frame.get(offset..).ok_or(ProtocolError::FrameTooShort {
        needed: offset + 5,
        have: frame.len(),
    })?;

    if frame.len() < 5 {
        return Err(ProtocolError::FrameTooShort {
            needed: 5,
            have: frame.len(),
        });
    }

    let version = frame[0];
    if version != HEADER_VERSION {
        return Err(ProtocolError::BadVersion { found: version });
    }

    let body_len = read_u32_be(&frame[1..5])? as usize;
    let body_end = 5usize
        .checked_add(body_len)
        .ok_or_else(|| ProtocolError::InvalidData {
            reason: "header size overflows usize".to_string(),
        })?;
    let body = frame.get(5..body_end).ok_or(ProtocolError::FrameTooShort {
        needed: body_end,
        have: frame.len(),
    })?;

    let mut headers = Headers::new();
    let mut pos = 0usize;
    while pos < body.len() {
        let key_len = read_u32_be(slice_at(body, pos, 4)?)? as usize;
        pos += 4;
        let key_bytes = slice_at(body, pos, key_len)?;
        let key = std::str::from_utf8(key_bytes)
            .map_err(|_| ProtocolError::InvalidData {
                reason: "header key is not valid UTF-8".to_string(),
            })?
            .to_string();
        pos += key_len;

        let value_len = read_u32_be(slice_at(body, pos, 4)?)? as usize;
        pos += 4;
        let value_bytes = slice_at(body, pos, value_len)?;
        let value = std::str::from_utf8(value_bytes)
            .map_err(|_| ProtocolError::InvalidData {
                reason: "header value is not valid UTF-8".to_string(),
            })?
            .to_string();
        pos += value_len;

        headers.insert(key, value);
    }

    Ok((headers, body_end))
}

fn slice_at(body: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    let end = pos.checked_add(len).ok_or_else(|| ProtocolError::InvalidData {
        reason: "header field length overflows usize".to_string(),
    })?;
    body.get(pos..end).ok_or(ProtocolError::InvalidData {
        reason: "header field runs past end of header body".to_string(),
    })
}

fn read_u32_be(bytes: &[u8]) -> Result<u32> {
    let arr: [u8; 4] = bytes.try_into().map_err(|_| ProtocolError::InvalidData {
        reason: "expected 4 bytes for length field".to_string(),
    })?;
    Ok(u32::from_be_bytes(arr))
}

fn u32_be(n: usize) -> [u8; 4] {
    (n as u32).to_be_bytes()
}
