// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cross-core mutexes (`aipc_mutex`).
//!
//! Each mutex has a shared record in the PPM and a local record per core.
//!
//! ```text
//! shared record (8 bytes)          local record
//! +0  slock      u32               lock   re-entrant local lock
//! +4  owner      u8  (core id)     wake   broadcast event
//! +5  wait_list  u8  (core bits)   count  local acquisitions
//! +6  padding
//! ```
//!
//! `owner` records which core holds the mutex, not how often: every local
//! acquisition bumps `count`, and only when `count` drops back to zero is
//! `owner` cleared and the peer woken.
//!
//! A core that finds the mutex held by the peer sets its `wait_list` bit,
//! drops the record spinlock, waits a short time on its wake event, sleeps
//! briefly and tries again. The peer's release raises this core's wake line,
//! whose handler broadcasts to every mutex with this core's bit set. The
//! retry loop never gives up and is not FIFO-fair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use ambalink_abi::layout::{
    AIPC_MUTEX_SIZE, MUTEX_OWNER_OFFSET, MUTEX_SLOCK_OFFSET, MUTEX_WAIT_LIST_OFFSET, NUM_MUTEX,
};
use ambalink_abi::{CoreId, PpmLayout};
use bitflags::bitflags;
use tracing::{debug, error, info};

use crate::config::{CoreConfig, IpcConfig};
use crate::platform::{Doorbell, IrqFlags, Platform};
use crate::region::SharedRegionError;
use crate::slock::{raw_lock_irqsave, raw_unlock_irqrestore};
use crate::wait::{LocalLock, WakeEvent};
use crate::SharedRegion;

bitflags! {
    /// Cores blocked waiting for a mutex.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WaitList: u8 {
        /// The RTOS core.
        const RTOS = CoreId::RTOS.as_u8();
        /// The Linux core.
        const LINUX = CoreId::LINUX.as_u8();
    }
}

impl WaitList {
    /// The bit of `core`.
    #[inline]
    #[must_use]
    pub const fn of(core: CoreId) -> Self {
        Self::from_bits_retain(core.as_u8())
    }
}

/// Local half of one mutex.
#[derive(Default)]
struct LocalMutex {
    lock: LocalLock,
    wake: WakeEvent,
    /// Only modified while holding the record spinlock.
    count: AtomicU32,
}

/// The table of cross-core mutexes.
pub struct MutexTable<P: Platform> {
    region: Arc<SharedRegion<P::Memory>>,
    doorbell: Arc<P::Doorbell>,
    irq: Arc<P::Irq>,
    layout: PpmLayout,
    local: Box<[LocalMutex]>,
    core: CoreConfig,
    wake_timeout: Duration,
    retry_sleep: Duration,
    ready: AtomicBool,
}

impl<P: Platform> MutexTable<P> {
    /// Binds the mutex table of `layout` inside `region`.
    ///
    /// The table rejects every operation until [`MutexTable::init`] runs.
    pub fn new(
        region: Arc<SharedRegion<P::Memory>>,
        doorbell: Arc<P::Doorbell>,
        irq: Arc<P::Irq>,
        layout: PpmLayout,
        config: &IpcConfig,
    ) -> Result<Self, SharedRegionError> {
        region.check(layout.mutex_table(), AIPC_MUTEX_SIZE)?;
        Ok(Self {
            region,
            doorbell,
            irq,
            layout,
            local: (0..NUM_MUTEX).map(|_| LocalMutex::default()).collect(),
            core: config.core,
            wake_timeout: config.wake_timeout,
            retry_sleep: config.retry_sleep,
            ready: AtomicBool::new(false),
        })
    }

    /// Enable the table once the wake interrupt is wired up.
    pub fn init(&self) {
        self.ready.store(true, Ordering::Release);
        info!(core = %self.core.id, wake = %self.core.local_wake, "cross-core mutexes ready");
    }

    /// Number of mutexes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        NUM_MUTEX
    }

    /// Always false; the table has a fixed size.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        NUM_MUTEX == 0
    }

    /// The local core configuration.
    #[inline]
    #[must_use]
    pub const fn core(&self) -> CoreConfig {
        self.core
    }

    fn entry(&self, id: usize, op: &'static str) -> Option<(u64, &LocalMutex)> {
        if !self.ready.load(Ordering::Acquire) {
            error!(id, op, "cross-core mutex used before init");
            return None;
        }
        let Some(record) = self.layout.mutex_record(id) else {
            error!(id, op, size = NUM_MUTEX, "invalid mutex id");
            return None;
        };
        Some((record, &self.local[id]))
    }

    fn lock_record(&self, record: u64) -> IrqFlags {
        raw_lock_irqsave(&self.region, &*self.irq, record + MUTEX_SLOCK_OFFSET)
    }

    fn unlock_record(&self, record: u64, flags: IrqFlags) {
        raw_unlock_irqrestore(&self.region, &*self.irq, record + MUTEX_SLOCK_OFFSET, flags);
    }

    fn owner_at(&self, record: u64) -> CoreId {
        CoreId::from_raw(self.region.acquire_u8(record + MUTEX_OWNER_OFFSET))
    }

    fn wait_list_at(&self, record: u64) -> WaitList {
        WaitList::from_bits_retain(self.region.acquire_u8(record + MUTEX_WAIT_LIST_OFFSET))
    }

    fn set_wait_list(&self, record: u64, waiters: WaitList) {
        self.region
            .publish_u8(record + MUTEX_WAIT_LIST_OFFSET, waiters.bits());
    }

    /// Acquire mutex `id`, blocking while the peer holds it.
    ///
    /// Invalid ids and use before init are logged and ignored.
    pub fn lock(&self, id: usize) {
        let Some((record, local)) = self.entry(id, "lock") else {
            return;
        };
        let me = self.core.id;

        let mut flags = self.lock_record(record);
        loop {
            let owner = self.owner_at(record);
            if owner.is_none() || owner == me {
                break;
            }
            let ticket = local.wake.ticket();
            self.set_wait_list(record, self.wait_list_at(record) | WaitList::of(me));
            self.unlock_record(record, flags);

            debug!(id, %owner, "mutex held by peer, waiting");
            local.wake.wait_since(ticket, self.wake_timeout);
            thread::sleep(self.retry_sleep);

            flags = self.lock_record(record);
        }
        // We might be the owner already.
        self.region.publish_u8(record + MUTEX_OWNER_OFFSET, me.as_u8());
        self.set_wait_list(record, self.wait_list_at(record) - WaitList::of(me));
        local.count.fetch_add(1, Ordering::Relaxed);
        self.unlock_record(record, flags);

        local.lock.lock();
    }

    /// Release mutex `id`.
    ///
    /// # Panics
    ///
    /// Panics if the local core does not own the mutex, if the calling thread
    /// does not hold it, or if it is released more often than acquired.
    #[expect(
        clippy::panic,
        reason = "ownership corruption is fatal, same as BUG() on target"
    )]
    pub fn unlock(&self, id: usize) {
        let Some((record, local)) = self.entry(id, "unlock") else {
            return;
        };
        let me = self.core.id;

        let owner = self.owner_at(record);
        if owner != me {
            error!(id, %owner, "cross-core mutex unlock by non-owner");
            panic!("cross-core mutex {id} unlocked by {me} while owned by {owner}");
        }
        if !local.lock.unlock() {
            error!(id, "cross-core mutex unlock by non-holding thread");
            panic!("cross-core mutex {id} unlocked by a thread that does not hold it");
        }

        let flags = self.lock_record(record);
        let Some(remaining) = local.count.load(Ordering::Relaxed).checked_sub(1) else {
            self.unlock_record(record, flags);
            error!(id, "cross-core mutex count underflow");
            panic!("cross-core mutex {id} released more often than acquired");
        };
        local.count.store(remaining, Ordering::Relaxed);
        if remaining == 0 {
            self.region.publish_u8(record + MUTEX_OWNER_OFFSET, CoreId::NONE.as_u8());
            if !self.wait_list_at(record).is_empty() {
                debug!(id, irq = %self.core.remote_wake, "waking peer");
                self.doorbell.raise(self.core.remote_wake);
            }
        }
        self.unlock_record(record, flags);
    }

    /// Handler for this core's wake line.
    ///
    /// Acknowledges the line, then wakes every mutex whose `wait_list` has
    /// this core's bit; waiters recheck the owner themselves.
    pub fn handle_wake_irq(&self) {
        self.doorbell.clear(self.core.local_wake);
        let me = WaitList::of(self.core.id);
        for (id, local) in self.local.iter().enumerate() {
            let Some(record) = self.layout.mutex_record(id) else {
                continue;
            };
            if self.wait_list_at(record).contains(me) {
                local.wake.broadcast();
            }
        }
    }

    /// Current owner of mutex `id`.
    #[must_use]
    pub fn owner(&self, id: usize) -> Option<CoreId> {
        self.layout
            .mutex_record(id)
            .map(|record| self.owner_at(record))
    }

    /// Current waiters of mutex `id`.
    #[must_use]
    pub fn wait_list(&self, id: usize) -> Option<WaitList> {
        self.layout
            .mutex_record(id)
            .map(|record| self.wait_list_at(record))
    }

    /// Local acquisition count of mutex `id`.
    #[must_use]
    pub fn count(&self, id: usize) -> Option<u32> {
        self.local
            .get(id)
            .map(|local| local.count.load(Ordering::Relaxed))
    }

    /// Number of wake broadcasts mutex `id` has received.
    #[must_use]
    pub fn wake_count(&self, id: usize) -> Option<u64> {
        self.local.get(id).map(|local| local.wake.broadcast_count())
    }

    /// Clear every shared mutex record.
    pub(crate) fn reset(&self) {
        self.region
            .publish_zero(self.layout.mutex_table(), AIPC_MUTEX_SIZE);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn wait_list_bits_match_core_ids() {
        assert_eq!(WaitList::of(CoreId::LINUX), WaitList::LINUX);
        assert_eq!(WaitList::of(CoreId::RTOS), WaitList::RTOS);
        assert_eq!((WaitList::LINUX | WaitList::RTOS).bits(), 0x3);
        assert!(!WaitList::RTOS.contains(WaitList::LINUX));
    }
}
