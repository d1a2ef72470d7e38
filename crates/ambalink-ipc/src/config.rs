// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Runtime configuration of the IPC layer.

use std::time::Duration;

use ambalink_abi::{CoreId, RingConfig, SoftIrq};

/// Identity of the local core and its mutex wake lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    /// This core's ID (written to `owner` and `wait_list`).
    pub id: CoreId,
    /// Line the peer raises to wake waiters on this core.
    pub local_wake: SoftIrq,
    /// Line this core raises to wake waiters on the peer.
    pub remote_wake: SoftIrq,
}

impl CoreConfig {
    /// The Linux side.
    pub const LINUX: Self = Self {
        id: CoreId::LINUX,
        local_wake: SoftIrq::MUTEX_WAKE_LINUX,
        remote_wake: SoftIrq::MUTEX_WAKE_RTOS,
    };

    /// The RTOS side.
    pub const RTOS: Self = Self {
        id: CoreId::RTOS,
        local_wake: SoftIrq::MUTEX_WAKE_RTOS,
        remote_wake: SoftIrq::MUTEX_WAKE_LINUX,
    };

    /// The configuration the peer core runs with.
    #[inline]
    #[must_use]
    pub const fn peer(self) -> Self {
        Self {
            id: self.id.peer(),
            local_wake: self.remote_wake,
            remote_wake: self.local_wake,
        }
    }
}

/// Who zeroes the shared lock tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InitRole {
    /// This core boots first and clears the spinlock and mutex tables.
    Initializer,
    /// This core attaches to tables the peer already cleared.
    #[default]
    Attacher,
}

/// IPC layer configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpcConfig {
    /// Local core identity.
    pub core: CoreConfig,
    /// Ring dimensions the PPM layout is derived from.
    pub ring: RingConfig,
    /// How long a mutex waiter blocks on its wake event per retry.
    pub wake_timeout: Duration,
    /// Sleep after each wait, giving a lower-priority remote holder a chance
    /// to run and release.
    pub retry_sleep: Duration,
    /// Shared table initialisation responsibility.
    pub init_role: InitRole,
}

impl IpcConfig {
    /// Default configuration for `core`.
    #[must_use]
    pub const fn new(core: CoreConfig) -> Self {
        Self {
            core,
            ring: RingConfig::DEFAULT,
            wake_timeout: Duration::from_millis(10),
            retry_sleep: Duration::from_millis(1),
            init_role: InitRole::Attacher,
        }
    }

    /// Replace the ring dimensions.
    #[must_use]
    pub const fn with_ring(mut self, ring: RingConfig) -> Self {
        self.ring = ring;
        self
    }

    /// Replace the mutex retry timings.
    #[must_use]
    pub const fn with_timing(mut self, wake_timeout: Duration, retry_sleep: Duration) -> Self {
        self.wake_timeout = wake_timeout;
        self.retry_sleep = retry_sleep;
        self
    }

    /// Replace the initialisation role.
    #[must_use]
    pub const fn with_init_role(mut self, role: InitRole) -> Self {
        self.init_role = role;
        self
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self::new(CoreConfig::LINUX)
    }
}
