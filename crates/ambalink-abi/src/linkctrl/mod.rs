// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Link-control wire format.
//!
//! Every message starts with a `u32` command. Most commands carry two `u32`
//! parameters; `SET_RTOS_MEM` carries the RTOS memory map instead.

#[cfg(test)]
mod linkctrl_test;

use crate::codec;

/// Size of a plain command message.
pub const CMD_MSG_SIZE: usize = 12;

/// Size of a memory-info command message.
pub const MEMINFO_CMD_SIZE: usize = 36;

/// Size of the memory-info reply record (one cache line).
pub const MEMINFO_RECORD_SIZE: usize = 32;

/// Link-control command codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LinkCtrlCmd {
    /// Linux asks the RTOS to prepare for hibernation.
    HiberPrepareFromLinux = 0,
    /// Linux enters hibernation.
    HiberEnterFromLinux = 1,
    /// Linux leaves hibernation.
    HiberExitFromLinux = 2,
    /// Acknowledgement of the pending request.
    HiberAck = 3,
    /// RTOS asks Linux to suspend.
    Suspend = 4,
    /// RTOS hands over the list of Linux-only GPIOs.
    GpioLinuxOnlyList = 5,
    /// Linux asks for a memory region description.
    GetMemInfo = 6,
    /// RTOS publishes its memory map.
    SetRtosMem = 7,
}

impl LinkCtrlCmd {
    /// Decodes a command word.
    #[must_use]
    pub const fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::HiberPrepareFromLinux,
            1 => Self::HiberEnterFromLinux,
            2 => Self::HiberExitFromLinux,
            3 => Self::HiberAck,
            4 => Self::Suspend,
            5 => Self::GpioLinuxOnlyList,
            6 => Self::GetMemInfo,
            7 => Self::SetRtosMem,
            _ => return None,
        })
    }
}

/// Where the RTOS wants Linux to suspend to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SuspendTarget {
    /// Hibernate to disk.
    Disk = 0,
    /// Suspend to DRAM.
    Dram = 1,
}

impl SuspendTarget {
    /// Decodes a suspend target parameter.
    #[must_use]
    pub const fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Disk),
            1 => Some(Self::Dram),
            _ => None,
        }
    }
}

/// Memory region kinds for `GET_MEM_INFO`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemType {
    /// Shared heap.
    Heap = 0,
    /// DSP working memory.
    Dsp = 1,
}

/// A plain `{cmd, param1, param2}` message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CtrlMsg {
    /// Raw command word.
    pub cmd: u32,
    /// First parameter.
    pub param1: u32,
    /// Second parameter.
    pub param2: u32,
}

impl CtrlMsg {
    /// Builds a message for a known command.
    #[inline]
    #[must_use]
    pub const fn new(cmd: LinkCtrlCmd, param1: u32, param2: u32) -> Self {
        Self {
            cmd: cmd as u32,
            param1,
            param2,
        }
    }

    /// Encodes to wire bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; CMD_MSG_SIZE] {
        let mut out = [0u8; CMD_MSG_SIZE];
        out[0..4].copy_from_slice(&self.cmd.to_le_bytes());
        out[4..8].copy_from_slice(&self.param1.to_le_bytes());
        out[8..12].copy_from_slice(&self.param2.to_le_bytes());
        out
    }

    /// Decodes from wire bytes.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        Some(Self {
            cmd: codec::get_u32(buf, 0)?,
            param1: codec::get_u32(buf, 4)?,
            param2: codec::get_u32(buf, 8)?,
        })
    }

    /// The decoded command, if known.
    #[inline]
    #[must_use]
    pub const fn command(&self) -> Option<LinkCtrlCmd> {
        LinkCtrlCmd::from_u32(self.cmd)
    }
}

/// The RTOS memory map carried by `SET_RTOS_MEM`.
///
/// All `*_end` fields are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemInfoCmd {
    /// Whole RTOS region start.
    pub rtos_start: u32,
    /// Whole RTOS region end.
    pub rtos_end: u32,
    /// RTOS system memory start.
    pub rtos_system_start: u32,
    /// RTOS system memory end.
    pub rtos_system_end: u32,
    /// Cached heap start.
    pub cached_heap_start: u32,
    /// Cached heap end.
    pub cached_heap_end: u32,
    /// Non-cached heap start.
    pub non_cached_heap_start: u32,
    /// Non-cached heap end.
    pub non_cached_heap_end: u32,
}

impl MemInfoCmd {
    /// Encodes to wire bytes, including the leading command word.
    #[must_use]
    pub fn encode(&self) -> [u8; MEMINFO_CMD_SIZE] {
        let words = [
            LinkCtrlCmd::SetRtosMem as u32,
            self.rtos_start,
            self.rtos_end,
            self.rtos_system_start,
            self.rtos_system_end,
            self.cached_heap_start,
            self.cached_heap_end,
            self.non_cached_heap_start,
            self.non_cached_heap_end,
        ];
        let mut out = [0u8; MEMINFO_CMD_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Decodes from wire bytes (the command word is not checked).
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let word = |index: usize| codec::get_u32(buf, index * 4);
        Some(Self {
            rtos_start: word(1)?,
            rtos_end: word(2)?,
            rtos_system_start: word(3)?,
            rtos_system_end: word(4)?,
            cached_heap_start: word(5)?,
            cached_heap_end: word(6)?,
            non_cached_heap_start: word(7)?,
            non_cached_heap_end: word(8)?,
        })
    }
}

/// Memory-info reply record filled in by the RTOS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemInfo {
    /// Address of the region in the RTOS address space.
    pub base_addr: u32,
    /// Physical address of the region.
    pub phys_addr: u32,
    /// Region size in bytes.
    pub size: u32,
}

impl MemInfo {
    /// Encodes to a full record, padding included.
    #[must_use]
    pub fn encode(&self) -> [u8; MEMINFO_RECORD_SIZE] {
        let mut out = [0u8; MEMINFO_RECORD_SIZE];
        out[0..4].copy_from_slice(&self.base_addr.to_le_bytes());
        out[4..8].copy_from_slice(&self.phys_addr.to_le_bytes());
        out[8..12].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Decodes a record.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        Some(Self {
            base_addr: codec::get_u32(buf, 0)?,
            phys_addr: codec::get_u32(buf, 4)?,
            size: codec::get_u32(buf, 8)?,
        })
    }
}
