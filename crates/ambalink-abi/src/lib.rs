// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared definitions between the Linux core and the RTOS core.
//!
//! This crate defines everything both cores must agree on bit-for-bit:
//! - Address and identity types (`Paddr`, `CoreId`, `SoftIrq`)
//! - PPM layout arithmetic (ring buffers, lock tables, profiling buffers)
//! - The ambafs remote-call wire format (commands, headers, stat records)
//! - The link-control wire format (hibernation, memory info, GPIO handoff)
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data layout, 100% host-testable
//! - **Explicit encoding**: Records are encoded at documented little-endian
//!   offsets instead of relying on `#[repr(C)]` of the host compiler
//! - **32-bit peer**: Pointers exchanged with the RTOS are 32-bit
//!
//! # Modules
//!
//! - [`types`]: `Paddr`, `CoreId`, `SoftIrq`
//! - [`codec`]: little-endian field access on byte buffers
//! - [`layout`]: PPM region offsets and record strides
//! - [`ambafs`]: remote filesystem message format
//! - [`linkctrl`]: link-control message format

#![no_std]

#[cfg(test)]
extern crate std;

pub mod ambafs;
pub mod codec;
pub mod layout;
pub mod linkctrl;
pub mod types;

// Re-export commonly used types at crate root
pub use layout::{PpmLayout, RingConfig};
pub use types::{CoreId, Paddr, SoftIrq};
