// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Stat and quick-stat records.

use crate::codec;

/// Offset of the NUL-terminated name in a stat record.
pub const STAT_NAME_OFFSET: usize = 28;

/// Size of a quick-stat record.
pub const QSTAT_SIZE: usize = 64;

/// Offset of the stat fields (`statp`) inside a quick-stat record.
pub const QSTAT_RECORD_OFFSET: usize = 24;

/// Offset of the completion sentinel inside a quick-stat record.
pub const QSTAT_MAGIC_OFFSET: usize = 56;

/// Sentinel written by the peer once a quick-stat reply is complete.
pub const QSTAT_MAGIC: u32 = 0x9999_8888;

const STATP: usize = 0;
const TYPE: usize = 4;
const SIZE: usize = 8;
const ATIME: usize = 16;
const MTIME: usize = 20;
const CTIME: usize = 24;

/// Remote object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatType {
    /// No such object, or the stat failed.
    Null = 0,
    /// Regular file.
    File = 1,
    /// Directory.
    Dir = 2,
}

impl StatType {
    /// Decodes a type field. Unknown and negative values are `None`.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Null),
            1 => Some(Self::File),
            2 => Some(Self::Dir),
            _ => None,
        }
    }
}

/// Distance from one listing record to the next.
///
/// The name is NUL-terminated and every record starts 8-byte aligned.
#[inline]
#[must_use]
pub const fn stat_record_stride(name_len: usize) -> usize {
    (STAT_NAME_OFFSET + name_len + 1 + 7) & !7
}

/// Fixed part of a stat record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Opaque peer pointer.
    pub statp: u32,
    /// Raw type; negative values carry a remote error code.
    pub kind: i32,
    /// Size in bytes.
    pub size: i64,
    /// Access time (seconds).
    pub atime: u32,
    /// Modification time (seconds).
    pub mtime: u32,
    /// Change time (seconds).
    pub ctime: u32,
}

impl Stat {
    /// A stat of the given type with all other fields zero.
    #[inline]
    #[must_use]
    pub const fn of_type(kind: StatType) -> Self {
        Self {
            statp: 0,
            kind: kind as i32,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        }
    }

    /// Decoded type. Error codes and unknown values map to [`StatType::Null`].
    #[inline]
    #[must_use]
    pub const fn stat_type(&self) -> StatType {
        match StatType::from_raw(self.kind) {
            Some(kind) => kind,
            None => StatType::Null,
        }
    }

    /// The remote error code if the type field carries one.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> Option<i32> {
        if self.kind < 0 { Some(self.kind) } else { None }
    }

    /// Reads the fixed part of a stat record at `offset`.
    #[must_use]
    pub fn decode(buf: &[u8], offset: usize) -> Option<Self> {
        Self::decode_fields(buf, offset)
    }

    /// Reads a listing record at `offset` along with its name.
    #[must_use]
    pub fn decode_with_name(buf: &[u8], offset: usize) -> Option<(Self, &[u8])> {
        let stat = Self::decode_fields(buf, offset)?;
        let name = codec::get_c_str(buf, offset.checked_add(STAT_NAME_OFFSET)?)?;
        Some((stat, name))
    }

    /// Writes a stat record with `name` at `offset`.
    ///
    /// Returns the record stride, which is where the next record starts.
    pub fn encode(&self, buf: &mut [u8], offset: usize, name: &[u8]) -> Option<usize> {
        self.encode_fields(buf, offset)?;
        codec::put_c_str(buf, offset.checked_add(STAT_NAME_OFFSET)?, name)?;
        Some(stat_record_stride(name.len()))
    }

    fn decode_fields(buf: &[u8], base: usize) -> Option<Self> {
        Some(Self {
            statp: codec::get_u32(buf, base.checked_add(STATP)?)?,
            kind: codec::get_i32(buf, base.checked_add(TYPE)?)?,
            size: codec::get_i64(buf, base.checked_add(SIZE)?)?,
            atime: codec::get_u32(buf, base.checked_add(ATIME)?)?,
            mtime: codec::get_u32(buf, base.checked_add(MTIME)?)?,
            ctime: codec::get_u32(buf, base.checked_add(CTIME)?)?,
        })
    }

    fn encode_fields(&self, buf: &mut [u8], base: usize) -> Option<()> {
        codec::put_u32(buf, base.checked_add(STATP)?, self.statp)?;
        codec::put_u32(buf, base.checked_add(TYPE)?, self.kind as u32)?;
        codec::put_i64(buf, base.checked_add(SIZE)?, self.size)?;
        codec::put_u32(buf, base.checked_add(ATIME)?, self.atime)?;
        codec::put_u32(buf, base.checked_add(MTIME)?, self.mtime)?;
        codec::put_u32(buf, base.checked_add(CTIME)?, self.ctime)
    }
}

/// Quick-stat record: a [`Stat`] at [`QSTAT_RECORD_OFFSET`] plus a sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Qstat {
    /// The stat fields.
    pub stat: Stat,
    /// Completion sentinel ([`QSTAT_MAGIC`] once answered).
    pub magic: u32,
}

impl Qstat {
    /// Reads a quick-stat record whose first byte is at `offset`.
    #[must_use]
    pub fn decode(buf: &[u8], offset: usize) -> Option<Self> {
        Some(Self {
            stat: Stat::decode_fields(buf, offset.checked_add(QSTAT_RECORD_OFFSET)?)?,
            magic: codec::get_u32(buf, offset.checked_add(QSTAT_MAGIC_OFFSET)?)?,
        })
    }

    /// Writes the stat fields and the sentinel, leaving the padding untouched.
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> Option<()> {
        self.stat
            .encode_fields(buf, offset.checked_add(QSTAT_RECORD_OFFSET)?)?;
        codec::put_u32(buf, offset.checked_add(QSTAT_MAGIC_OFFSET)?, self.magic)
    }

    /// True once the peer has completed the reply.
    #[inline]
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.magic == QSTAT_MAGIC
    }
}

// The quick-stat record must fit the parameter area it overlays.
const _: () = {
    assert!(QSTAT_RECORD_OFFSET + CTIME + 4 <= QSTAT_MAGIC_OFFSET);
    assert!(QSTAT_MAGIC_OFFSET + 4 <= QSTAT_SIZE);
    assert!(stat_record_stride(0) == 32);
};
