// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cross-core spinlocks.
//!
//! Each lock is a 32-bit word in the PPM: 0 is free, 1 is held. Acquire spins
//! on an atomic exchange until it observes 0; release stores 0. A barrier
//! follows every acquire and precedes every release so the peer never sees
//! the word cleared before the critical section's stores.
//!
//! There is no owner tracking, no recursion and no timeout: locking the same
//! id twice from one core deadlocks that core, and a peer that dies holding
//! a lock hangs every core that wants it.

use std::sync::Arc;

use ambalink_abi::PpmLayout;
use ambalink_abi::layout::{AIPC_SLOCK_SIZE, NUM_SPINLOCKS, SLOCK_RECORD_SIZE};
use tracing::error;

use crate::SharedRegion;
use crate::platform::{IrqControl, IrqFlags, Platform, SharedMemory};
use crate::region::SharedRegionError;

/// Value of a held lock word.
pub const SLOCK_HELD: u32 = 1;

/// Value of a free lock word.
pub const SLOCK_FREE: u32 = 0;

/// Spin until the word at `offset` is ours.
pub(crate) fn raw_lock<M: SharedMemory>(region: &SharedRegion<M>, offset: u64) {
    while region.swap_u32(offset, SLOCK_HELD) != SLOCK_FREE {
        core::hint::spin_loop();
    }
    region.barrier();
}

/// Release the word at `offset`.
pub(crate) fn raw_unlock<M: SharedMemory>(region: &SharedRegion<M>, offset: u64) {
    region.barrier();
    region.store_u32(offset, SLOCK_FREE);
}

/// Take the word at `offset` with local interrupts and preemption off.
pub(crate) fn raw_lock_irqsave<M: SharedMemory, I: IrqControl>(
    region: &SharedRegion<M>,
    irq: &I,
    offset: u64,
) -> IrqFlags {
    let flags = irq.save_and_disable();
    irq.preempt_disable();
    raw_lock(region, offset);
    flags
}

/// Release the word at `offset` and restore the saved interrupt state.
pub(crate) fn raw_unlock_irqrestore<M: SharedMemory, I: IrqControl>(
    region: &SharedRegion<M>,
    irq: &I,
    offset: u64,
    flags: IrqFlags,
) {
    raw_unlock(region, offset);
    irq.preempt_enable();
    irq.restore(flags);
}

/// The table of cross-core spinlocks (`aipc_slock`).
pub struct SpinlockTable<P: Platform> {
    region: Arc<SharedRegion<P::Memory>>,
    irq: Arc<P::Irq>,
    table: u64,
    layout: PpmLayout,
}

impl<P: Platform> SpinlockTable<P> {
    /// Binds the spinlock table of `layout` inside `region`.
    pub fn new(
        region: Arc<SharedRegion<P::Memory>>,
        irq: Arc<P::Irq>,
        layout: PpmLayout,
    ) -> Result<Self, SharedRegionError> {
        let table = layout.slock_table();
        region.check(table, AIPC_SLOCK_SIZE)?;
        Ok(Self {
            region,
            irq,
            table,
            layout,
        })
    }

    /// Number of usable spinlocks.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        NUM_SPINLOCKS
    }

    /// Always false; the table has a fixed size.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        NUM_SPINLOCKS == 0
    }

    /// Offset of the lock word for `id`.
    #[must_use]
    pub const fn word_offset(&self, id: usize) -> Option<u64> {
        self.layout.slock_record(id)
    }

    fn word(&self, id: usize, op: &'static str) -> Option<u64> {
        let word = self.word_offset(id);
        if word.is_none() {
            error!(id, op, size = NUM_SPINLOCKS, "invalid spinlock id");
        }
        word
    }

    /// Acquire spinlock `id`. Invalid ids are logged and ignored.
    pub fn lock(&self, id: usize) {
        if let Some(word) = self.word(id, "lock") {
            raw_lock(&self.region, word);
        }
    }

    /// Release spinlock `id`. Invalid ids are logged and ignored.
    pub fn unlock(&self, id: usize) {
        if let Some(word) = self.word(id, "unlock") {
            raw_unlock(&self.region, word);
        }
    }

    /// Acquire spinlock `id` with local interrupts and preemption disabled.
    ///
    /// For an invalid id nothing is disabled and the returned flags are
    /// meaningless; pass them back to [`unlock_irqrestore`] anyway.
    ///
    /// [`unlock_irqrestore`]: Self::unlock_irqrestore
    pub fn lock_irqsave(&self, id: usize) -> IrqFlags {
        self.word(id, "lock_irqsave").map_or_else(IrqFlags::default, |word| {
            raw_lock_irqsave(&self.region, &*self.irq, word)
        })
    }

    /// Release spinlock `id` and restore the interrupt state.
    pub fn unlock_irqrestore(&self, id: usize, flags: IrqFlags) {
        if let Some(word) = self.word(id, "unlock_irqrestore") {
            raw_unlock_irqrestore(&self.region, &*self.irq, word, flags);
        }
    }

    /// Current raw value of lock word `id`, read through the cache.
    #[must_use]
    pub fn peek(&self, id: usize) -> Option<u32> {
        self.word_offset(id)
            .map(|word| self.region.acquire_u32(word))
    }

    /// Mark every spinlock free, including the reserved slot.
    pub(crate) fn reset(&self) {
        self.region.publish_zero(self.table, AIPC_SLOCK_SIZE);
    }
}

// The reserved slot sits right after the last usable lock.
const _: () = assert!((NUM_SPINLOCKS as u64 + 1) * SLOCK_RECORD_SIZE == AIPC_SLOCK_SIZE);
