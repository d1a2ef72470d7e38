// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction traits.

use ambalink_abi::SoftIrq;
use ambalink_abi::types::{SCRATCHPAD_SWI_CLEAR_OFFSET, SCRATCHPAD_SWI_SET_OFFSET};

/// The PPM as seen through one core's non-coherent data cache.
///
/// Offsets are relative to the start of the mapping. Plain `read`/`write`
/// go through the cache: a peer only observes a write after [`clean`], and
/// this core only observes a peer write after [`invalidate`].
///
/// Implementations may panic on out-of-range offsets; [`SharedRegion`]
/// validates every access first.
///
/// [`clean`]: SharedMemory::clean
/// [`invalidate`]: SharedMemory::invalidate
/// [`SharedRegion`]: crate::SharedRegion
pub trait SharedMemory: Send + Sync {
    /// Size of the mapping in bytes.
    fn len(&self) -> u64;

    /// Returns true if the mapping is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read bytes through the cache.
    fn read(&self, offset: u64, buf: &mut [u8]);

    /// Write bytes into the cache.
    fn write(&self, offset: u64, data: &[u8]);

    /// Discard cached lines covering the range.
    fn invalidate(&self, offset: u64, len: u64);

    /// Write dirty cached lines covering the range back to memory.
    fn clean(&self, offset: u64, len: u64);

    /// Atomically exchange a 32-bit word in memory, returning the old value.
    ///
    /// Bypasses the cache (exclusive monitor on real hardware).
    fn swap_u32(&self, offset: u64, value: u32) -> u32;

    /// Store a 32-bit word directly to memory.
    fn store_u32(&self, offset: u64, value: u32);

    /// Full data memory barrier.
    fn barrier(&self);
}

/// Cross-core doorbell (software interrupt lines).
pub trait Doorbell: Send + Sync {
    /// Raise `irq` on the peer.
    fn raise(&self, irq: SoftIrq);

    /// Acknowledge `irq` locally.
    fn clear(&self, irq: SoftIrq);
}

/// Saved local interrupt state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrqFlags(pub u64);

/// Local interrupt and preemption control.
pub trait IrqControl: Send + Sync {
    /// Disable local interrupts, returning the previous state.
    fn save_and_disable(&self) -> IrqFlags;

    /// Restore a state returned by [`IrqControl::save_and_disable`].
    fn restore(&self, flags: IrqFlags);

    /// Disable preemption of the current thread.
    fn preempt_disable(&self);

    /// Re-enable preemption of the current thread.
    fn preempt_enable(&self);
}

/// Generic 32-bit register access.
pub trait Mmio: Send + Sync {
    /// Read a 32-bit register.
    fn read32(&self, addr: u64) -> u32;

    /// Write a 32-bit register.
    fn write32(&self, addr: u64, value: u32);
}

/// A bundle of platform services for one core.
///
/// This trait abstracts over the board, allowing the lock protocol to run
/// against the in-process mock platform in tests.
pub trait Platform: Send + Sync + 'static {
    /// Shared memory mapping.
    type Memory: SharedMemory;

    /// Doorbell towards the peer.
    type Doorbell: Doorbell;

    /// Local interrupt control.
    type Irq: IrqControl;
}

/// Doorbell driven through the AHB scratchpad set/clear registers.
#[derive(Debug)]
pub struct MmioDoorbell<R: Mmio> {
    regs: R,
    scratchpad: u64,
}

impl<R: Mmio> MmioDoorbell<R> {
    /// Creates a doorbell for the scratchpad block at `scratchpad`.
    pub const fn new(regs: R, scratchpad: u64) -> Self {
        Self { regs, scratchpad }
    }

    /// The underlying register interface.
    pub const fn regs(&self) -> &R {
        &self.regs
    }
}

impl<R: Mmio> Doorbell for MmioDoorbell<R> {
    fn raise(&self, irq: SoftIrq) {
        self.regs
            .write32(self.scratchpad + SCRATCHPAD_SWI_SET_OFFSET, irq.mask());
    }

    fn clear(&self, irq: SoftIrq) {
        self.regs
            .write32(self.scratchpad + SCRATCHPAD_SWI_CLEAR_OFFSET, irq.mask());
    }
}
