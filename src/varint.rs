//! Bounded decoding of LEB128-style unsigned varints.
//!
//! The encode side goes through [`varint_rs::VarintWriter`]; decoding is
//! done here so that corrupt archives surface [`S2PmtError::VarintOverflow`]
//! instead of running off the end of the buffer.

use bytes::Buf;

use crate::error::{S2PmtError, S2PmtResult};

/// Longest legal encoding of a 64-bit value: nine full 7-bit groups plus a
/// final byte contributing the topmost bit.
const MAX_VARINT_BYTES: usize = 10;

/// Decodes one unsigned varint from the front of `buf`.
pub(crate) fn read_u64(buf: &mut impl Buf) -> S2PmtResult<u64> {
    let mut value = 0_u64;
    for group in 0..MAX_VARINT_BYTES {
        if !buf.has_remaining() {
            return Err(S2PmtError::Reading(std::io::ErrorKind::UnexpectedEof.into()));
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << (group * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(S2PmtError::VarintOverflow)
}

/// Decodes a varint expected to fit a 32-bit field.
pub(crate) fn read_u32(buf: &mut impl Buf) -> S2PmtResult<u32> {
    u32::try_from(read_u64(buf)?).map_err(|_| S2PmtError::InvalidEntry)
}

/// Decodes a varint used as an element count.
pub(crate) fn read_usize(buf: &mut impl Buf) -> S2PmtResult<usize> {
    usize::try_from(read_u64(buf)?).map_err(|_| S2PmtError::InvalidEntry)
}
