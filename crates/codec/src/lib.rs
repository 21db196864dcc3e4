//! # Codec
//!
//! Length-prefixed framing primitives for the SiltKV storage engine.
//!
//! Every multi-byte integer in every on-disk structure — WAL records,
//! SSTable data records, index entries, and the footer — is an unsigned
//! 32-bit **big-endian** value. There are no varints, no alignment, and no
//! padding. This crate provides the four primitives the rest of the engine
//! composes:
//!
//! - [`put_u32`] / [`put_bytes`] append to an in-memory buffer;
//! - [`get_u32`] / [`get_bytes`] parse from a buffer, advancing an offset.
//!
//! Parsers fail with [`UnderflowError`] when the buffer is too short. That
//! error doubles as the engine's "torn record" signal: WAL replay and table
//! scans stop at the first underflow.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// A parse ran off the end of its buffer.
///
/// Carries enough context to say *where* the frame tore: the offset the
/// parser stood at, how many bytes it needed, and how many were left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer underflow at offset {offset}: needed {needed} bytes, {available} available")]
pub struct UnderflowError {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

/// Appends `n` to `buf` as 4 big-endian bytes.
pub fn put_u32(buf: &mut Vec<u8>, n: u32) {
    let mut word = [0u8; 4];
    BigEndian::write_u32(&mut word, n);
    buf.extend_from_slice(&word);
}

/// Appends `bytes` to `buf` verbatim.
pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(bytes);
}

/// Parses a big-endian u32 from `buf` at `*offset`, advancing it by 4.
///
/// # Errors
///
/// Returns [`UnderflowError`] if fewer than 4 bytes remain; `*offset` is
/// left unchanged in that case.
pub fn get_u32(buf: &[u8], offset: &mut usize) -> Result<u32, UnderflowError> {
    let remaining = buf.len().saturating_sub(*offset);
    if remaining < 4 {
        return Err(UnderflowError {
            offset: *offset,
            needed: 4,
            available: remaining,
        });
    }
    let n = BigEndian::read_u32(&buf[*offset..*offset + 4]);
    *offset += 4;
    Ok(n)
}

/// Parses `len` raw bytes from `buf` at `*offset`, advancing it by `len`.
///
/// # Errors
///
/// Returns [`UnderflowError`] if fewer than `len` bytes remain; `*offset`
/// is left unchanged in that case.
pub fn get_bytes<'a>(
    buf: &'a [u8],
    offset: &mut usize,
    len: usize,
) -> Result<&'a [u8], UnderflowError> {
    let remaining = buf.len().saturating_sub(*offset);
    if remaining < len {
        return Err(UnderflowError {
            offset: *offset,
            needed: len,
            available: remaining,
        });
    }
    let bytes = &buf[*offset..*offset + len];
    *offset += len;
    Ok(bytes)
}
