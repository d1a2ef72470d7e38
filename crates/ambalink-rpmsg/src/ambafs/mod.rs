// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Remote filesystem client (ambafs).
//!
//! The RTOS owns the storage; this client proxies namespace operations over
//! a [`RemoteCall`] endpoint and keeps a local shadow of every inode it has
//! seen. Paths handed to the client are relative to the mount: `""` is the
//! root, `"/dir/file"` a file below it. On the wire every path is prefixed
//! with the configured mount root.
//!
//! The shadow only saves round trips: the update rule in
//! [`InodeAttrs::is_current`] decides when a remote stat is adopted, and the
//! skip flag set by directory listings lets the next getattr answer locally.

mod inode;
mod msg;
mod namei;
mod qstat;
mod readdir;

#[cfg(test)]
mod inode_test;

pub use inode::{
    INODE_PERM, Inode, InodeAttrs, InodeCache, InodeFlags, InodeKind, S_IFDIR, S_IFREG,
};
pub use msg::MsgBuffer;
pub use readdir::{DirEntry, DirHandle, Fill, ReadDir};

use core::fmt;
use std::sync::{Arc, Mutex};

use ambalink_abi::SoftIrq;
use ambalink_abi::ambafs::{
    Command, LS_BATCH_RECORDS, NAMEI_BUF_SIZE, QSTAT_BUFF_SIZE, Stat, StatType,
};
use ambalink_ipc::SharedRegion;
use ambalink_ipc::platform::Platform;
use tracing::{debug, info};

use crate::transport::{RemoteCall, TransportError};

/// Polls of the quick-stat sentinel before giving up.
pub const QSTAT_POLL_LIMIT: u32 = 65_536;

/// Alignment of the quick-stat buffer (one cache line).
pub const QSTAT_ALIGN: u64 = 32;

// =============================================================================
// Errors
// =============================================================================

/// Filesystem operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The remote path does not exist.
    NotFound,
    /// The remote side reported an error.
    Io,
    /// The remote side refused to remove or move the target.
    Busy,
    /// The remote side did not create the expected object.
    NoDevice,
    /// A buffer could not be allocated.
    OutOfMemory,
    /// The path does not fit the message buffer.
    NameTooLong,
    /// The name is empty or contains a separator.
    InvalidName,
    /// The quick-stat buffer is not cache-line aligned or out of bounds.
    BadBuffer,
    /// The endpoint failed.
    Transport(TransportError),
}

impl FsError {
    /// The matching negative Linux errno.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::NotFound => -2,
            Self::Io | Self::Transport(_) => -5,
            Self::OutOfMemory => -12,
            Self::Busy => -16,
            Self::NoDevice => -19,
            Self::InvalidName | Self::BadBuffer => -22,
            Self::NameTooLong => -36,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file or directory"),
            Self::Io => write!(f, "remote i/o error"),
            Self::Busy => write!(f, "remote object busy"),
            Self::NoDevice => write!(f, "remote object not created"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::NameTooLong => write!(f, "path too long"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::BadBuffer => write!(f, "unusable quick-stat buffer"),
            Self::Transport(err) => write!(f, "transport: {err}"),
        }
    }
}

impl core::error::Error for FsError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for FsError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsConfig {
    /// Remote path of the mount root, prefixed to every path.
    pub mount_root: String,
    /// Records requested per listing batch.
    pub ls_batch: u8,
    /// Quick-stat sentinel polls before reporting "not found".
    pub qstat_polls: u32,
    /// Soft IRQ raised while polling to hurry the peer along.
    pub qstat_kick: Option<SoftIrq>,
    /// Raise `qstat_kick` every this many polls.
    pub qstat_kick_interval: u32,
}

impl FsConfig {
    /// Defaults for a mount of `mount_root`.
    #[must_use]
    pub fn new(mount_root: impl Into<String>) -> Self {
        Self {
            mount_root: mount_root.into(),
            ls_batch: LS_BATCH_RECORDS,
            qstat_polls: QSTAT_POLL_LIMIT,
            qstat_kick: None,
            qstat_kick_interval: 1,
        }
    }

    /// Replace the listing batch size.
    #[must_use]
    pub fn with_ls_batch(mut self, batch: u8) -> Self {
        self.ls_batch = batch.max(1);
        self
    }

    /// Replace the quick-stat poll bound.
    #[must_use]
    pub fn with_qstat_polls(mut self, polls: u32) -> Self {
        self.qstat_polls = polls;
        self
    }

    /// Raise `irq` every `interval` polls during quick-stat.
    #[must_use]
    pub fn with_qstat_kick(mut self, irq: SoftIrq, interval: u32) -> Self {
        self.qstat_kick = Some(irq);
        self.qstat_kick_interval = interval.max(1);
        self
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new("c:")
    }
}

// =============================================================================
// Client
// =============================================================================

/// The shared-memory buffer quick-stat replies land in.
struct QstatArea<P: Platform> {
    region: Arc<SharedRegion<P::Memory>>,
    offset: u64,
    doorbell: Option<Arc<P::Doorbell>>,
    /// One quick-stat at a time per buffer.
    busy: Mutex<()>,
}

/// The ambafs client.
pub struct FsClient<P: Platform, T: RemoteCall> {
    transport: T,
    config: FsConfig,
    inodes: InodeCache,
    qstat: Option<QstatArea<P>>,
}

impl<P: Platform, T: RemoteCall> FsClient<P, T> {
    /// A client talking to `transport`.
    ///
    /// Without [`FsClient::with_quick_stat`], directory revalidation falls
    /// back to a regular stat.
    pub fn new(transport: T, config: FsConfig) -> Self {
        info!(root = %config.mount_root, "ambafs client ready");
        Self {
            transport,
            config,
            inodes: InodeCache::new(),
            qstat: None,
        }
    }

    /// Enable quick-stat with the buffer at `offset` inside `region`.
    ///
    /// The buffer needs [`QSTAT_BUFF_SIZE`] bytes and cache-line alignment.
    pub fn with_quick_stat(
        mut self,
        region: Arc<SharedRegion<P::Memory>>,
        offset: u64,
        doorbell: Option<Arc<P::Doorbell>>,
    ) -> Result<Self, FsError> {
        if region.paddr_of(offset).as_u64() % QSTAT_ALIGN != 0 {
            return Err(FsError::BadBuffer);
        }
        region
            .check(offset, QSTAT_BUFF_SIZE as u64)
            .map_err(|_| FsError::BadBuffer)?;
        self.qstat = Some(QstatArea {
            region,
            offset,
            doorbell,
            busy: Mutex::new(()),
        });
        Ok(self)
    }

    /// The configuration.
    #[inline]
    pub const fn config(&self) -> &FsConfig {
        &self.config
    }

    /// The inode cache.
    #[inline]
    pub const fn inodes(&self) -> &InodeCache {
        &self.inodes
    }

    /// The transport.
    #[inline]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The cached inode at `path`.
    #[must_use]
    pub fn inode(&self, path: &str) -> Option<Arc<Inode>> {
        self.inodes.get(path)
    }

    /// Fetch the remote stat of `path`.
    ///
    /// A missing path yields a stat of type [`StatType::Null`].
    pub fn get_stat(&self, path: &str) -> Result<Stat, FsError> {
        let mut msg = MsgBuffer::new(NAMEI_BUF_SIZE);
        let len = msg.put_path(0, &[&self.config.mount_root, path])?;
        msg.set_request(Command::Stat, 0, len);
        debug!(path, "stat");
        self.transport.exec(msg.as_mut_bytes(), len)?;
        if msg.flag() == 0 {
            return Ok(Stat::of_type(StatType::Null));
        }
        Ok(msg.stat(0))
    }
}

/// `dir` joined with `name`.
fn child_path(dir: &str, name: &str) -> String {
    format!("{dir}/{name}")
}

fn check_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name.contains(['/', '\0']) {
        return Err(FsError::InvalidName);
    }
    Ok(())
}
