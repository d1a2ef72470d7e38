// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Protocol clients the Linux core runs over RPMSG.
//!
//! - [`ambafs`]: the remote filesystem client (namespace operations,
//!   paginated listings, quick-stat revalidation)
//! - [`linkctrl`]: hibernation, suspend and memory-map coordination
//!
//! Both sit on the endpoint traits in [`transport`]. With the `mock`
//! feature, the transport module also provides in-process RTOS peers.

pub mod ambafs;
pub mod linkctrl;
pub mod transport;

pub use ambafs::{FsClient, FsConfig, FsError};
pub use linkctrl::{LinkCtrl, LinkCtrlError, LinkCtrlHooks};
pub use transport::{Channel, RemoteCall, TransportError};
