// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction for the IPC layer.
//!
//! Everything the lock protocol needs from the board (cache maintenance on
//! the PPM, doorbells, interrupt masking, register access) goes through the
//! traits here, so the protocol can be tested on the host.

#[cfg(test)]
mod mock_test;


#[cfg(any(test, feature = "mock"))]
mod mock;
mod traits;

#[cfg(any(test, feature = "mock"))]
pub use mock::{
    CACHE_LINE_SIZE, CoreCache, MockIrqControl, MockMmio, MockPlatform, MockPpm, SoftIrqBus,
};
pub use traits::{Doorbell, IrqControl, IrqFlags, Mmio, MmioDoorbell, Platform, SharedMemory};
