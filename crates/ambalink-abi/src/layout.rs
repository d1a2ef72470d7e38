// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! PPM partitioning shared by both cores.
//!
//! Every sub-region is an additive offset from a single base address. Both
//! cores must compute exactly the same offsets or the protocol silently
//! corrupts.
//!
//! # Layout (default ring configuration)
//!
//! ```text
//! base + 0x000000  RPMSG buffers (2048 x 2048 bytes)
//! base + 0x400000  vring C0 -> C1 (0xA000)
//! base + 0x40A000  vring C1 -> C0 (0xA000)
//! base + 0x414000  spinlock table (4 KB)
//! base + 0x415000  mutex table (4 KB)
//! base + 0x416000  suspend backup (128 KB)
//! base + 0x436000  RPC profiling (4 KB)
//! base + 0x437000  RPMSG profiling (0x9000)
//! base + 0x440000  end
//! ```

use crate::types::Paddr;

/// One kilobyte in bytes.
const KB: u64 = 1024;

/// Page size used for region alignment (4 KB).
pub const PAGE_SIZE: u64 = 4 * KB;

/// Default number of RPMSG buffers.
pub const RPMSG_NUM_BUFS: u64 = 2048;

/// Default size of one RPMSG buffer.
pub const RPMSG_BUF_SIZE: u64 = 2048;

/// Size of the spinlock table region.
pub const AIPC_SLOCK_SIZE: u64 = 0x1000;

/// Size of the mutex table region.
pub const AIPC_MUTEX_SIZE: u64 = 0x1000;

/// Size of the suspend backup region.
pub const SUSPEND_BACKUP_SIZE: u64 = 0x20000;

/// Size of the RPC profiling region.
pub const RPC_PROFILE_SIZE: u64 = 0x1000;

// =============================================================================
// Lock Records
// =============================================================================

/// Stride of one spinlock record (`u32` lock word plus padding).
pub const SLOCK_RECORD_SIZE: u64 = 8;

/// Number of spinlocks. One slot is reserved for the NAND workaround.
pub const NUM_SPINLOCKS: usize = (AIPC_SLOCK_SIZE / SLOCK_RECORD_SIZE) as usize - 1;

/// Stride of one mutex record.
pub const MUTEX_RECORD_SIZE: u64 = 8;

/// Offset of the mutex's own spinlock word within a record.
pub const MUTEX_SLOCK_OFFSET: u64 = 0;

/// Offset of the `owner` byte within a mutex record.
pub const MUTEX_OWNER_OFFSET: u64 = 4;

/// Offset of the `wait_list` byte within a mutex record.
pub const MUTEX_WAIT_LIST_OFFSET: u64 = 5;

/// Number of cross-core mutexes (`AMBA_IPC_NUM_MUTEX`).
pub const NUM_MUTEX: usize = 32;

/// Rounds `value` up to the next page boundary.
#[inline]
#[must_use]
pub const fn align_page(value: u64) -> u64 {
    (value + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

// =============================================================================
// Ring Configuration
// =============================================================================

/// Ring buffer dimensions the rest of the layout is derived from.
///
/// Production boards use [`RingConfig::DEFAULT`]; tests use small rings so the
/// simulated PPM stays small.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of RPMSG buffers (split evenly between both directions).
    pub num_bufs: u64,
    /// Size of each RPMSG buffer in bytes.
    pub buf_size: u64,
}

impl RingConfig {
    /// The production ring configuration.
    pub const DEFAULT: Self = Self::new(RPMSG_NUM_BUFS, RPMSG_BUF_SIZE);

    /// Creates a ring configuration.
    #[inline]
    #[must_use]
    pub const fn new(num_bufs: u64, buf_size: u64) -> Self {
        Self { num_bufs, buf_size }
    }

    /// Total size of the RPMSG buffer pool.
    #[inline]
    #[must_use]
    pub const fn buffers_size(self) -> u64 {
        self.num_bufs * self.buf_size
    }

    /// Size of one vring (descriptors plus used ring, each page-aligned).
    #[inline]
    #[must_use]
    pub const fn vring_size(self) -> u64 {
        align_page(self.num_bufs / 2 * 19) + align_page(self.num_bufs / 2 * 17)
    }

    /// Size of the RPMSG profiling area.
    #[inline]
    #[must_use]
    pub const fn rpmsg_profile_size(self) -> u64 {
        align_page(17 * self.num_bufs)
    }

    /// Size of the whole profiling area (RPC plus RPMSG).
    #[inline]
    #[must_use]
    pub const fn profiling_size(self) -> u64 {
        RPC_PROFILE_SIZE + self.rpmsg_profile_size()
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// PPM Layout
// =============================================================================

/// Offsets of every PPM sub-region for one base address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PpmLayout {
    base: Paddr,
    ring: RingConfig,
}

impl PpmLayout {
    /// Creates the layout for a PPM starting at `base`.
    #[inline]
    #[must_use]
    pub const fn new(base: Paddr, ring: RingConfig) -> Self {
        Self { base, ring }
    }

    /// Physical base address of the PPM.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> Paddr {
        self.base
    }

    /// Ring configuration this layout was derived from.
    #[inline]
    #[must_use]
    pub const fn ring(&self) -> RingConfig {
        self.ring
    }

    /// Offset of the C0 → C1 vring.
    #[inline]
    #[must_use]
    pub const fn vring_c0_to_c1(&self) -> u64 {
        self.ring.buffers_size()
    }

    /// Offset of the C1 → C0 vring.
    #[inline]
    #[must_use]
    pub const fn vring_c1_to_c0(&self) -> u64 {
        self.vring_c0_to_c1() + self.ring.vring_size()
    }

    /// Offset of the spinlock table (`AIPC_SLOCK_ADDR`).
    #[inline]
    #[must_use]
    pub const fn slock_table(&self) -> u64 {
        self.vring_c1_to_c0() + self.ring.vring_size()
    }

    /// Offset of the mutex table (`AIPC_MUTEX_ADDR`).
    #[inline]
    #[must_use]
    pub const fn mutex_table(&self) -> u64 {
        self.slock_table() + AIPC_SLOCK_SIZE
    }

    /// Offset of the suspend backup area.
    #[inline]
    #[must_use]
    pub const fn suspend_backup(&self) -> u64 {
        self.mutex_table() + AIPC_MUTEX_SIZE
    }

    /// Offset of the RPC profiling area (`RPC_PROFILE_ADDR`).
    #[inline]
    #[must_use]
    pub const fn rpc_profile(&self) -> u64 {
        self.suspend_backup() + SUSPEND_BACKUP_SIZE
    }

    /// Offset of the RPMSG profiling area (`RPMSG_PROFILE_ADDR`).
    #[inline]
    #[must_use]
    pub const fn rpmsg_profile(&self) -> u64 {
        self.rpc_profile() + RPC_PROFILE_SIZE
    }

    /// Total size of the PPM covered by this layout.
    #[inline]
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.rpc_profile() + self.ring.profiling_size()
    }

    /// Physical address of a region offset.
    #[inline]
    #[must_use]
    pub const fn paddr(&self, offset: u64) -> Paddr {
        self.base.add(offset)
    }

    /// Offset of spinlock record `id`, or `None` if out of range.
    #[inline]
    #[must_use]
    pub const fn slock_record(&self, id: usize) -> Option<u64> {
        if id >= NUM_SPINLOCKS {
            return None;
        }
        Some(self.slock_table() + id as u64 * SLOCK_RECORD_SIZE)
    }

    /// Offset of mutex record `id`, or `None` if out of range.
    #[inline]
    #[must_use]
    pub const fn mutex_record(&self, id: usize) -> Option<u64> {
        if id >= NUM_MUTEX {
            return None;
        }
        Some(self.mutex_table() + id as u64 * MUTEX_RECORD_SIZE)
    }
}

// Compile-time verification of the production layout
const _: () = {
    let layout = PpmLayout::new(Paddr::null(), RingConfig::DEFAULT);
    assert!(RingConfig::DEFAULT.vring_size() == 0xA000);
    assert!(layout.vring_c0_to_c1() == 0x40_0000);
    assert!(layout.slock_table() == 0x41_4000);
    assert!(layout.mutex_table() == 0x41_5000);
    assert!(layout.rpc_profile() == 0x43_6000);
    assert!(layout.rpmsg_profile() == 0x43_7000);
    assert!(layout.total_size() == 0x44_0000);
    assert!(NUM_MUTEX as u64 * MUTEX_RECORD_SIZE <= AIPC_MUTEX_SIZE);
    assert!(NUM_SPINLOCKS == 511);
};

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_layout_matches_board_constants() {
        let layout = PpmLayout::new(Paddr::new(0x2000_0000), RingConfig::default());
        assert_eq!(layout.paddr(layout.slock_table()), Paddr::new(0x2041_4000));
        assert_eq!(layout.paddr(layout.mutex_table()), Paddr::new(0x2041_5000));
        assert_eq!(layout.suspend_backup(), 0x41_6000);
        assert_eq!(RingConfig::DEFAULT.profiling_size(), 0xA000);
    }

    #[test]
    fn records_are_bounded() {
        let layout = PpmLayout::new(Paddr::null(), RingConfig::DEFAULT);
        assert_eq!(layout.slock_record(0), Some(0x41_4000));
        assert_eq!(layout.slock_record(510), Some(0x41_4000 + 510 * 8));
        assert_eq!(layout.slock_record(NUM_SPINLOCKS), None);
        assert_eq!(layout.mutex_record(31), Some(0x41_5000 + 31 * 8));
        assert_eq!(layout.mutex_record(NUM_MUTEX), None);
    }

    #[test]
    fn small_rings_keep_regions_ordered() {
        let layout = PpmLayout::new(Paddr::null(), RingConfig::new(16, 64));
        assert_eq!(layout.vring_c0_to_c1(), 1024);
        assert_eq!(layout.ring().vring_size(), 2 * PAGE_SIZE);
        assert!(layout.slock_table() < layout.mutex_table());
        assert!(layout.mutex_table() < layout.rpc_profile());
        assert!(layout.rpmsg_profile() < layout.total_size());
    }

    #[test]
    fn align_page_rounds_up() {
        assert_eq!(align_page(0), 0);
        assert_eq!(align_page(1), PAGE_SIZE);
        assert_eq!(align_page(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_page(19 * 1024), 0x5000);
    }
}
