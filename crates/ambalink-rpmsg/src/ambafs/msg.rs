// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Owned message buffers.

use ambalink_abi::ambafs::{Command, MSG_HEADER_SIZE, MSG_PARAM_OFFSET, MsgHeader, Stat};
use ambalink_abi::codec;

use super::FsError;

/// A request/reply buffer: header plus parameter area.
pub struct MsgBuffer {
    buf: Vec<u8>,
}

impl MsgBuffer {
    /// A zeroed buffer of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0; size.max(MSG_HEADER_SIZE)],
        }
    }

    /// Like [`MsgBuffer::new`], reporting allocation failure.
    pub fn try_new(size: usize) -> Result<Self, FsError> {
        let size = size.max(MSG_HEADER_SIZE);
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| FsError::OutOfMemory)?;
        buf.resize(size, 0);
        Ok(Self { buf })
    }

    /// Total size including the header.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always false; the header is always present.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The whole buffer.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The whole buffer, mutably.
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> MsgHeader {
        MsgHeader::read(&self.buf).unwrap_or_default()
    }

    /// Reply record count or status.
    #[inline]
    #[must_use]
    pub fn flag(&self) -> u8 {
        self.buf[1]
    }

    /// Prepare a request, keeping `xfr` from the previous exchange.
    pub fn set_request(&mut self, cmd: Command, flag: u8, len: usize) {
        let header = MsgHeader {
            cmd: cmd as u8,
            flag,
            len: u16::try_from(len).unwrap_or(u16::MAX),
            xfr: self.header().xfr,
        };
        let written = header.write(&mut self.buf);
        debug_assert!(written.is_some(), "buffer shorter than a message header");
    }

    /// Write `parts` back to back as one NUL-terminated string at parameter
    /// offset `at`.
    ///
    /// Returns the number of bytes written including the terminator.
    pub fn put_path(&mut self, at: usize, parts: &[&str]) -> Result<usize, FsError> {
        let start = MSG_PARAM_OFFSET + at;
        let total: usize = parts.iter().map(|part| part.len()).sum::<usize>() + 1;
        if start + total > self.buf.len() {
            return Err(FsError::NameTooLong);
        }
        let mut cursor = start;
        for part in parts {
            self.buf[cursor..cursor + part.len()].copy_from_slice(part.as_bytes());
            cursor += part.len();
        }
        self.buf[cursor] = 0;
        Ok(total)
    }

    /// Write a little-endian word at parameter offset `at`.
    pub fn put_param_u32(&mut self, at: usize, value: u32) -> Result<(), FsError> {
        codec::put_u32(&mut self.buf, MSG_PARAM_OFFSET + at, value).ok_or(FsError::NameTooLong)
    }

    /// The stat record at parameter offset `at`.
    #[must_use]
    pub fn stat(&self, at: usize) -> Stat {
        Stat::decode(&self.buf, MSG_PARAM_OFFSET + at).unwrap_or_default()
    }

    /// The listing record at absolute offset `offset`, with its name.
    #[must_use]
    pub fn record(&self, offset: usize) -> Option<(Stat, &[u8])> {
        Stat::decode_with_name(&self.buf, offset)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn path_parts_are_joined_and_terminated() {
        let mut msg = MsgBuffer::new(64);
        let len = msg.put_path(0, &["c:", "/dir", "/", "a.txt"]).unwrap();
        assert_eq!(len, 13);
        assert_eq!(
            codec::get_c_str(msg.as_bytes(), MSG_PARAM_OFFSET).unwrap(),
            b"c:/dir/a.txt"
        );
    }

    #[test]
    fn overlong_path_is_rejected() {
        let mut msg = MsgBuffer::new(16);
        assert_eq!(msg.put_path(0, &["12345678"]), Err(FsError::NameTooLong));
        assert_eq!(msg.put_path(0, &["1234567"]), Ok(8));
    }

    #[test]
    fn parameter_word_must_fit() {
        let mut msg = MsgBuffer::new(16);
        assert_eq!(msg.put_param_u32(4, 0x1234_5678), Ok(()));
        assert_eq!(
            codec::get_u32(msg.as_bytes(), MSG_PARAM_OFFSET + 4),
            Some(0x1234_5678)
        );
        assert_eq!(msg.put_param_u32(5, 1), Err(FsError::NameTooLong));
    }

    #[test]
    fn request_keeps_transfer_word() {
        let mut msg = MsgBuffer::new(32);
        codec::put_u32(msg.as_mut_bytes(), 4, 0xAB).unwrap();
        msg.set_request(Command::LsNext, 16, 4);
        let header = msg.header();
        assert_eq!(header.command(), Some(Command::LsNext));
        assert_eq!(header.flag, 16);
        assert_eq!(header.len, 4);
        assert_eq!(header.xfr, 0xAB);
    }
}
