// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Two simulated cores sharing one PPM.

use std::sync::{Arc, Weak};

use ambalink_abi::{Paddr, PpmLayout, RingConfig};
use ambalink_ipc::platform::{CoreCache, MockIrqControl, MockPlatform, MockPpm, SoftIrqBus};
use ambalink_ipc::{CoreConfig, InitRole, IpcConfig, IpcContext, SharedRegion, SharedRegionError};
use tracing::info;

/// One core's IPC context.
pub type Core = Arc<IpcContext<MockPlatform>>;

/// Bytes reserved behind the IPC layout for client buffers.
pub const SCRATCH_SIZE: u64 = 0x2000;

/// The simulated board.
pub struct Board {
    pub bus: SoftIrqBus,
    pub linux: Core,
    pub rtos: Core,
    /// Region offset of the scratch area behind the layout.
    pub scratch: u64,
}

impl Board {
    /// Bring up both cores. The RTOS boots first and clears the tables.
    pub fn new(base: Paddr, ring: RingConfig) -> Result<Self, SharedRegionError> {
        let layout = PpmLayout::new(base, ring);
        let scratch = layout.total_size();
        let ppm = MockPpm::new(scratch + SCRATCH_SIZE);
        let bus = SoftIrqBus::new();
        let rtos = bring_up(&ppm, &bus, base, ring, CoreConfig::RTOS, InitRole::Initializer)?;
        let linux = bring_up(&ppm, &bus, base, ring, CoreConfig::LINUX, InitRole::Attacher)?;
        info!(
            base = format_args!("{:#x}", base.as_u64()),
            size = format_args!("{:#x}", scratch + SCRATCH_SIZE),
            "board up"
        );
        Ok(Self {
            bus,
            linux,
            rtos,
            scratch,
        })
    }

    /// The Linux core's view of shared memory.
    pub fn linux_region(&self) -> Arc<SharedRegion<CoreCache>> {
        Arc::clone(self.linux.region())
    }

    /// The RTOS core's view of shared memory.
    pub fn rtos_region(&self) -> Arc<SharedRegion<CoreCache>> {
        Arc::clone(self.rtos.region())
    }
}

fn bring_up(
    ppm: &MockPpm,
    bus: &SoftIrqBus,
    base: Paddr,
    ring: RingConfig,
    core: CoreConfig,
    role: InitRole,
) -> Result<Core, SharedRegionError> {
    let config = IpcConfig::new(core).with_ring(ring).with_init_role(role);
    let region = Arc::new(SharedRegion::new(ppm.core_view(), base));
    let ctx = Arc::new(IpcContext::new(
        region,
        Arc::new(bus.clone()),
        Arc::new(MockIrqControl::new()),
        config,
    )?);
    let weak: Weak<IpcContext<MockPlatform>> = Arc::downgrade(&ctx);
    bus.register(core.local_wake, move |_| {
        if let Some(ctx) = weak.upgrade() {
            ctx.mutexes().handle_wake_irq();
        }
    });
    Ok(ctx)
}
