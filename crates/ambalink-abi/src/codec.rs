// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Little-endian field access on byte buffers.
//!
//! All readers return `None` when the field does not fit in the buffer.

#[inline]
pub fn get_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn get_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn get_i32(buf: &[u8], offset: usize) -> Option<i32> {
    get_u32(buf, offset).map(|v| v as i32)
}

#[inline]
pub fn get_i64(buf: &[u8], offset: usize) -> Option<i64> {
    let bytes = buf.get(offset..offset.checked_add(8)?)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(i64::from_le_bytes(raw))
}

#[inline]
pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) -> Option<()> {
    buf.get_mut(offset..offset.checked_add(2)?)?
        .copy_from_slice(&value.to_le_bytes());
    Some(())
}

#[inline]
pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) -> Option<()> {
    buf.get_mut(offset..offset.checked_add(4)?)?
        .copy_from_slice(&value.to_le_bytes());
    Some(())
}

#[inline]
pub fn put_i64(buf: &mut [u8], offset: usize, value: i64) -> Option<()> {
    buf.get_mut(offset..offset.checked_add(8)?)?
        .copy_from_slice(&value.to_le_bytes());
    Some(())
}

/// Length of the NUL-terminated string starting at `offset`.
///
/// Returns `None` if no terminator is found before the end of `buf`.
pub fn c_str_len(buf: &[u8], offset: usize) -> Option<usize> {
    buf.get(offset..)?.iter().position(|&b| b == 0)
}

/// Borrow the NUL-terminated string at `offset` (without the terminator).
pub fn get_c_str(buf: &[u8], offset: usize) -> Option<&[u8]> {
    let len = c_str_len(buf, offset)?;
    buf.get(offset..offset + len)
}

/// Write `s` followed by a NUL terminator at `offset`.
///
/// Returns the number of bytes written including the terminator.
pub fn put_c_str(buf: &mut [u8], offset: usize, s: &[u8]) -> Option<usize> {
    let total = s.len().checked_add(1)?;
    let dst = buf.get_mut(offset..offset.checked_add(total)?)?;
    dst[..s.len()].copy_from_slice(s);
    dst[s.len()] = 0;
    Some(total)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn fields_are_little_endian() {
        let mut buf = [0u8; 16];
        put_u32(&mut buf, 0, 0x1122_3344).unwrap();
        assert_eq!(&buf[..4], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(get_u32(&buf, 0), Some(0x1122_3344));

        put_i64(&mut buf, 8, -2).unwrap();
        assert_eq!(get_i64(&buf, 8), Some(-2));
    }

    #[test]
    fn out_of_bounds_is_none() {
        let mut buf = [0u8; 4];
        assert_eq!(get_u32(&buf, 1), None);
        assert_eq!(put_u16(&mut buf, 3, 1), None);
        assert_eq!(get_u32(&buf, usize::MAX), None);
    }

    #[test]
    fn c_strings() {
        let mut buf = [0xffu8; 8];
        assert_eq!(put_c_str(&mut buf, 1, b"abc"), Some(4));
        assert_eq!(get_c_str(&buf, 1), Some(&b"abc"[..]));
        assert_eq!(c_str_len(&buf, 1), Some(3));
        assert_eq!(put_c_str(&mut buf, 5, b"abc"), None);
        assert_eq!(get_c_str(&[1u8, 2, 3], 0), None);
    }
}
