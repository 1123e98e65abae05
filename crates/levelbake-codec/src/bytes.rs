//! Bounds-checked little-endian access to byte buffers.

use crate::error::{DecodeError, DecodeResult};

/// Copy `N` bytes starting at `offset`.
pub(crate) fn array<const N: usize>(
    buf: &[u8],
    offset: usize,
    context: &'static str,
) -> DecodeResult<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| DecodeError::truncated(context, offset.saturating_add(N), buf.len()))
}

/// Overwrite `bytes.len()` bytes starting at `offset`.
pub(crate) fn write(
    buf: &mut [u8],
    offset: usize,
    bytes: &[u8],
    context: &'static str,
) -> DecodeResult<()> {
    let len = buf.len();
    let end = offset.saturating_add(bytes.len());
    let target = buf
        .get_mut(offset..end)
        .ok_or_else(|| DecodeError::truncated(context, end, len))?;
    target.copy_from_slice(bytes);
    Ok(())
}

pub(crate) fn read_u32(buf: &[u8], offset: usize, context: &'static str) -> DecodeResult<u32> {
    array(buf, offset, context).map(u32::from_le_bytes)
}

pub(crate) fn read_f32(buf: &[u8], offset: usize, context: &'static str) -> DecodeResult<f32> {
    array(buf, offset, context).map(f32::from_le_bytes)
}

/// Fail unless `buf` holds at least `needed` bytes.
pub(crate) fn ensure_len(buf: &[u8], needed: usize, context: &'static str) -> DecodeResult<()> {
    if buf.len() < needed {
        return Err(DecodeError::truncated(context, needed, buf.len()));
    }
    Ok(())
}
