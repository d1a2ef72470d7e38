// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Remote filesystem wire format.
//!
//! A message is an 8-byte header followed by a parameter area that carries the
//! request (usually a NUL-terminated path) and is overwritten in place by the
//! reply (stat records, or an error code in the first record's type field).
//!
//! ```text
//! +0  cmd   u8
//! +1  flag  u8    request: batch size / reply: record count or status
//! +2  len   u16   parameter length
//! +4  xfr   u32   opaque transfer pointer
//! +8  parameters
//! ```

mod stat;

#[cfg(test)]
mod ambafs_test;

pub use stat::{
    QSTAT_MAGIC, QSTAT_MAGIC_OFFSET, QSTAT_RECORD_OFFSET, QSTAT_SIZE, Qstat, STAT_NAME_OFFSET, Stat,
    StatType, stat_record_stride,
};

use crate::codec;

/// Size of the message header.
pub const MSG_HEADER_SIZE: usize = 8;

/// Offset of the parameter area within a message.
pub const MSG_PARAM_OFFSET: usize = MSG_HEADER_SIZE;

/// Offset of `cmd` in the header.
pub const MSG_CMD_OFFSET: usize = 0;

/// Offset of `flag` in the header.
pub const MSG_FLAG_OFFSET: usize = 1;

/// Offset of `len` in the header.
pub const MSG_LEN_OFFSET: usize = 2;

/// Offset of `xfr` in the header.
pub const MSG_XFR_OFFSET: usize = 4;

/// Records requested per directory-listing batch.
pub const LS_BATCH_RECORDS: u8 = 16;

/// Payload length of `LS_NEXT` and `LS_EXIT` requests.
pub const LS_CONTINUE_PAYLOAD: usize = 4;

/// Size of the namespace-operation message buffer.
pub const NAMEI_BUF_SIZE: usize = 512;

/// Size of the directory-listing page.
pub const READDIR_PAGE_SIZE: usize = 4096;

/// Size of the quick-stat scratch buffer.
pub const QSTAT_BUFF_SIZE: usize = 1024;

/// First inode number handed out by the client.
pub const INO_MAX_RESERVED: u64 = 256;

/// Remote filesystem command codes.
///
/// A closed enumeration: the RTOS peer dispatches on these exact values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Start a directory listing (glob path).
    LsInit = 0,
    /// Fetch the next listing batch.
    LsNext = 1,
    /// Finish a listing; no reply.
    LsExit = 2,
    /// Stat one path.
    Stat = 3,
    /// Open a file.
    Open = 4,
    /// Close a file.
    Close = 5,
    /// Read from a file.
    Read = 6,
    /// Write to a file.
    Write = 7,
    /// Create a file.
    Create = 8,
    /// Delete a file.
    Delete = 9,
    /// Create a directory.
    Mkdir = 10,
    /// Remove a directory.
    Rmdir = 11,
    /// Rename a file or directory.
    Rename = 12,
    /// Mount a volume.
    Mount = 13,
    /// Unmount a volume.
    Umount = 14,
    /// Reserved.
    Reserved0 = 15,
    /// Reserved.
    Reserved1 = 16,
    /// Query volume size.
    Volsize = 17,
    /// Polled stat answered through shared memory.
    QuickStat = 18,
}

impl Command {
    /// Decodes a command byte.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::LsInit,
            1 => Self::LsNext,
            2 => Self::LsExit,
            3 => Self::Stat,
            4 => Self::Open,
            5 => Self::Close,
            6 => Self::Read,
            7 => Self::Write,
            8 => Self::Create,
            9 => Self::Delete,
            10 => Self::Mkdir,
            11 => Self::Rmdir,
            12 => Self::Rename,
            13 => Self::Mount,
            14 => Self::Umount,
            15 => Self::Reserved0,
            16 => Self::Reserved1,
            17 => Self::Volsize,
            18 => Self::QuickStat,
            _ => return None,
        })
    }
}

/// Decoded message header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgHeader {
    /// Raw command byte.
    pub cmd: u8,
    /// Batch size, record count or status.
    pub flag: u8,
    /// Parameter length.
    pub len: u16,
    /// Opaque transfer pointer.
    pub xfr: u32,
}

impl MsgHeader {
    /// Reads a header from the front of `buf`.
    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            cmd: *buf.get(MSG_CMD_OFFSET)?,
            flag: *buf.get(MSG_FLAG_OFFSET)?,
            len: codec::get_u16(buf, MSG_LEN_OFFSET)?,
            xfr: codec::get_u32(buf, MSG_XFR_OFFSET)?,
        })
    }

    /// Writes this header to the front of `buf`.
    pub fn write(&self, buf: &mut [u8]) -> Option<()> {
        *buf.get_mut(MSG_CMD_OFFSET)? = self.cmd;
        *buf.get_mut(MSG_FLAG_OFFSET)? = self.flag;
        codec::put_u16(buf, MSG_LEN_OFFSET, self.len)?;
        codec::put_u32(buf, MSG_XFR_OFFSET, self.xfr)
    }

    /// The decoded command, if known.
    #[inline]
    #[must_use]
    pub const fn command(&self) -> Option<Command> {
        Command::from_u8(self.cmd)
    }
}
