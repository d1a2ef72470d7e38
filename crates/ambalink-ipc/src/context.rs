// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The per-core IPC context.

use std::sync::Arc;

use ambalink_abi::PpmLayout;
use tracing::info;

use crate::SharedRegion;
use crate::config::{InitRole, IpcConfig};
use crate::mutex::MutexTable;
use crate::platform::Platform;
use crate::region::SharedRegionError;
use crate::slock::SpinlockTable;

/// Everything one core needs to take part in the lock protocol.
///
/// Built once per core and shared by reference; there is no global state,
/// so tests can run several cores in one process.
pub struct IpcContext<P: Platform> {
    layout: PpmLayout,
    region: Arc<SharedRegion<P::Memory>>,
    doorbell: Arc<P::Doorbell>,
    spinlocks: SpinlockTable<P>,
    mutexes: MutexTable<P>,
    config: IpcConfig,
}

impl<P: Platform> IpcContext<P> {
    /// Bind the lock tables of the PPM mapped by `region`.
    ///
    /// With [`InitRole::Initializer`] both shared tables are zeroed first;
    /// the peer must not touch them before this returns.
    pub fn new(
        region: Arc<SharedRegion<P::Memory>>,
        doorbell: Arc<P::Doorbell>,
        irq: Arc<P::Irq>,
        config: IpcConfig,
    ) -> Result<Self, SharedRegionError> {
        let layout = PpmLayout::new(region.base(), config.ring);
        region.require(layout.total_size())?;

        let spinlocks = SpinlockTable::new(Arc::clone(&region), Arc::clone(&irq), layout)?;
        let mutexes = MutexTable::new(
            Arc::clone(&region),
            Arc::clone(&doorbell),
            irq,
            layout,
            &config,
        )?;

        if config.init_role == InitRole::Initializer {
            spinlocks.reset();
            mutexes.reset();
            info!(base = %layout.base(), "shared lock tables cleared");
        }
        mutexes.init();

        Ok(Self {
            layout,
            region,
            doorbell,
            spinlocks,
            mutexes,
            config,
        })
    }

    /// The PPM layout.
    #[inline]
    pub const fn layout(&self) -> &PpmLayout {
        &self.layout
    }

    /// The shared region.
    #[inline]
    pub const fn region(&self) -> &Arc<SharedRegion<P::Memory>> {
        &self.region
    }

    /// The doorbell towards the peer.
    #[inline]
    pub const fn doorbell(&self) -> &Arc<P::Doorbell> {
        &self.doorbell
    }

    /// The spinlock table.
    #[inline]
    pub const fn spinlocks(&self) -> &SpinlockTable<P> {
        &self.spinlocks
    }

    /// The mutex table.
    #[inline]
    pub const fn mutexes(&self) -> &MutexTable<P> {
        &self.mutexes
    }

    /// The configuration this context was built with.
    #[inline]
    pub const fn config(&self) -> &IpcConfig {
        &self.config
    }
}
