// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Core identity.

use core::fmt;

/// Identifier of one processing domain sharing the PPM.
///
/// Core IDs are single bits so that the mutex `wait_list` byte can hold one
/// bit per core. ID 0 is reserved to mean "no owner".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CoreId(u8);

impl CoreId {
    /// No core (mutex `owner` value for an unheld mutex).
    pub const NONE: Self = Self(0);

    /// The RTOS (BOSS/ThreadX) core.
    pub const RTOS: Self = Self(0x1);

    /// The Linux core (`AMBALINK_CORE_LOCAL` on the Linux side).
    pub const LINUX: Self = Self(0x2);

    /// Creates a core ID from its raw shared-memory encoding.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw shared-memory encoding.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Checks if this is the "no owner" value.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this is a valid single-core identifier.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.is_power_of_two()
    }

    /// The other core of the pair.
    ///
    /// Only meaningful for [`CoreId::LINUX`] and [`CoreId::RTOS`].
    #[inline]
    #[must_use]
    pub const fn peer(self) -> Self {
        match self.0 {
            0x1 => Self::LINUX,
            0x2 => Self::RTOS,
            _ => Self::NONE,
        }
    }
}

impl fmt::Debug for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoreId({:#x})", self.0)
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => write!(f, "none"),
            Self::RTOS => write!(f, "rtos"),
            Self::LINUX => write!(f, "linux"),
            Self(raw) => write!(f, "core:{raw:#x}"),
        }
    }
}
