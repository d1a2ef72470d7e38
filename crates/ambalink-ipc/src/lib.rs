// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cross-core lock primitives for the AmbaLink private memory region.
//!
//! Two cores, Linux and an RTOS, share a physically contiguous memory
//! region (the PPM). This crate implements the two lock kinds both cores
//! agree on:
//!
//! - [`SpinlockTable`]: busy-wait word locks for short critical sections
//! - [`MutexTable`]: sleeping, locally re-entrant locks with a soft-IRQ
//!   wake broadcast to the peer
//!
//! All hardware access goes through the [`platform::Platform`] trait. With
//! the `mock` feature, [`platform::MockPlatform`] simulates two
//! non-coherent cores in one process.

pub mod config;
mod context;
pub mod diag;
pub mod mutex;
pub mod platform;
pub mod profile;
mod region;
pub mod slock;
mod wait;

pub use config::{CoreConfig, InitRole, IpcConfig};
pub use context::IpcContext;
pub use mutex::{MutexTable, WaitList};
pub use region::{SharedRegion, SharedRegionError};
pub use slock::SpinlockTable;
