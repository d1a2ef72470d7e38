// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Physical address type.
//!
//! Only physical addresses ever cross the core boundary: each core maps the
//! PPM at its own virtual address, so a virtual address is meaningless to the
//! peer.

use core::fmt;

/// A physical memory address as seen by both cores.
///
/// Stored as `u64` on the host, but the RTOS peer is a 32-bit core, so every
/// address sent over the wire must fit in 32 bits (see [`Paddr::to_wire`]).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Paddr(u64);

impl Paddr {
    /// Create a new physical address.
    #[inline]
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Create a null (zero) physical address.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Check if this is a null address.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Get the raw address value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Add an offset to this address.
    #[inline]
    #[must_use]
    pub const fn add(self, offset: u64) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Calculate the difference between two addresses.
    #[inline]
    #[must_use]
    pub const fn diff(self, other: Self) -> u64 {
        self.0.wrapping_sub(other.0)
    }

    /// Align this address up to the given alignment.
    ///
    /// Returns `None` if alignment is zero or not a power of two.
    #[inline]
    #[must_use]
    pub const fn align_up(self, alignment: u64) -> Option<Self> {
        if !alignment.is_power_of_two() {
            return None;
        }
        let mask = alignment - 1;
        Some(Self((self.0.wrapping_add(mask)) & !mask))
    }

    /// Check if this address is aligned to the given alignment.
    ///
    /// Returns `None` if alignment is zero or not a power of two.
    #[inline]
    #[must_use]
    pub const fn is_aligned(self, alignment: u64) -> Option<bool> {
        if !alignment.is_power_of_two() {
            return None;
        }
        Some((self.0 & (alignment - 1)) == 0)
    }

    /// Encode for a 32-bit wire field.
    ///
    /// Returns `None` if the address is not reachable by the 32-bit peer.
    #[inline]
    #[must_use]
    pub const fn to_wire(self) -> Option<u32> {
        if self.0 > u32::MAX as u64 {
            return None;
        }
        Some(self.0 as u32)
    }

    /// Decode from a 32-bit wire field.
    #[inline]
    #[must_use]
    pub const fn from_wire(raw: u32) -> Self {
        Self(raw as u64)
    }
}

impl fmt::Debug for Paddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Paddr({:#x})", self.0)
    }
}

impl fmt::Display for Paddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn wire_encoding_rejects_high_addresses() {
        assert_eq!(Paddr::new(0x8000_0000).to_wire(), Some(0x8000_0000));
        assert_eq!(Paddr::new(0x1_0000_0000).to_wire(), None);
        assert_eq!(Paddr::from_wire(0x1234), Paddr::new(0x1234));
    }

    #[test]
    fn alignment() {
        let addr = Paddr::new(0x1001);
        assert_eq!(addr.align_up(0x20), Some(Paddr::new(0x1020)));
        assert_eq!(addr.is_aligned(0x20), Some(false));
        assert_eq!(addr.align_up(3), None);
        assert_eq!(Paddr::new(0x1020).is_aligned(0x20), Some(true));
    }

    #[test]
    fn arithmetic() {
        let base = Paddr::new(0x1000);
        assert_eq!(base.add(0x20).diff(base), 0x20);
        assert!(Paddr::null().is_null());
        assert_eq!(std::format!("{base}"), "0x1000");
    }
}
