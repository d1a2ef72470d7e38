// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Software interrupt lines used as cross-core doorbells.
//!
//! A line is raised by writing its bit to the scratchpad "set" register and
//! acknowledged by writing the same bit to the "clear" register.

use core::fmt;

/// Offset of the software-interrupt set register in the AHB scratchpad.
pub const SCRATCHPAD_SWI_SET_OFFSET: u64 = 0x10;

/// Offset of the software-interrupt clear register in the AHB scratchpad.
pub const SCRATCHPAD_SWI_CLEAR_OFFSET: u64 = 0x14;

/// A software interrupt line (AXI soft IRQ number).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SoftIrq(u8);

impl SoftIrq {
    /// Linux → RTOS vring kick.
    pub const VRING_C0_TO_C1_KICK: Self = Self(0);
    /// Linux → RTOS vring ack.
    pub const VRING_C0_TO_C1_ACK: Self = Self(1);
    /// RTOS → Linux vring kick.
    pub const VRING_C1_TO_C0_KICK: Self = Self(2);
    /// RTOS → Linux vring ack.
    pub const VRING_C1_TO_C0_ACK: Self = Self(3);
    /// Wakes mutex waiters on the RTOS core (`MUTEX_IRQ_REMOTE` on Linux).
    pub const MUTEX_WAKE_RTOS: Self = Self(4);
    /// Wakes mutex waiters on the Linux core (`MUTEX_IRQ_LOCAL` on Linux).
    pub const MUTEX_WAKE_LINUX: Self = Self(5);
    /// AMP suspend request.
    pub const AMP_SUSPEND_KICK: Self = Self(6);

    /// Number of soft IRQ lines addressable through the scratchpad registers.
    pub const COUNT: u8 = 32;

    /// Creates a soft IRQ line.
    ///
    /// Returns `None` if the line is outside the scratchpad register width.
    #[inline]
    #[must_use]
    pub const fn new(line: u8) -> Option<Self> {
        if line < Self::COUNT {
            Some(Self(line))
        } else {
            None
        }
    }

    /// Returns the line number.
    #[inline]
    #[must_use]
    pub const fn line(self) -> u8 {
        self.0
    }

    /// Value to write to the set/clear register for this line.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << self.0
    }
}

impl fmt::Debug for SoftIrq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SoftIrq({})", self.0)
    }
}

impl fmt::Display for SoftIrq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swi{}", self.0)
    }
}
