// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Core types shared by both cores.

mod addr;
mod id;
mod irq;


pub use addr::Paddr;
pub use id::CoreId;
pub use irq::{SCRATCHPAD_SWI_CLEAR_OFFSET, SCRATCHPAD_SWI_SET_OFFSET, SoftIrq};
