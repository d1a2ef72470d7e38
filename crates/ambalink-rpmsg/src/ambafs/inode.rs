// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Local shadows of remote files and the dentry cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ambalink_abi::ambafs::{INO_MAX_RESERVED, Stat, StatType};
use bitflags::bitflags;
use dashmap::DashMap;
use tracing::trace;

bitflags! {
    /// Per-inode operation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InodeFlags: u32 {
        /// A listing just refreshed this inode; the next getattr is free.
        const SKIP_GET_STAT = 0x0100;
        /// Created locally for writing; local size and times win.
        const CREATE_FOR_WRITE = 0x0200;
    }
}

/// Permission bits of every inode.
pub const INODE_PERM: u32 = 0o744;

/// `S_IFREG`.
pub const S_IFREG: u32 = 0o100_000;

/// `S_IFDIR`.
pub const S_IFDIR: u32 = 0o040_000;

/// File type of an inode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InodeKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
}

impl InodeKind {
    /// Anything that is not a file is treated as a directory.
    #[inline]
    #[must_use]
    pub const fn from_stat(kind: StatType) -> Self {
        match kind {
            StatType::File => Self::File,
            StatType::Null | StatType::Dir => Self::Dir,
        }
    }

    /// The `S_IF*` bits.
    #[inline]
    #[must_use]
    pub const fn mode_bits(self) -> u32 {
        match self {
            Self::File => S_IFREG,
            Self::Dir => S_IFDIR,
        }
    }
}

/// Mutable inode state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InodeAttrs {
    /// Size in bytes.
    pub size: i64,
    /// Access time.
    pub atime: u32,
    /// Modification time.
    pub mtime: u32,
    /// Change time.
    pub ctime: u32,
    /// Link count.
    pub nlink: u32,
    /// Operation flags.
    pub flags: InodeFlags,
    /// How often cached file contents were discarded.
    pub cache_purges: u64,
}

impl InodeAttrs {
    /// True if `stat` carries nothing this inode should adopt.
    ///
    /// That is the case when size and mtime both match, when the local copy
    /// is strictly newer, or when the file was created here for writing and
    /// already has content.
    #[must_use]
    pub fn is_current(&self, stat: &Stat) -> bool {
        (self.size == stat.size && self.mtime == stat.mtime)
            || self.mtime > stat.mtime
            || (self.flags.contains(InodeFlags::CREATE_FOR_WRITE) && self.size > 0)
    }
}

/// Local shadow of one remote file or directory.
#[derive(Debug)]
pub struct Inode {
    ino: u64,
    kind: InodeKind,
    attrs: Mutex<InodeAttrs>,
}

impl Inode {
    /// A fresh inode for `stat`, with zero size and times and one link.
    #[must_use]
    pub fn new(ino: u64, stat: &Stat) -> Self {
        Self {
            ino,
            kind: InodeKind::from_stat(stat.stat_type()),
            attrs: Mutex::new(InodeAttrs {
                nlink: 1,
                ..InodeAttrs::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InodeAttrs> {
        self.attrs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inode number.
    #[inline]
    #[must_use]
    pub const fn ino(&self) -> u64 {
        self.ino
    }

    /// File type.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> InodeKind {
        self.kind
    }

    /// Full mode: permission bits and file type.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> u32 {
        INODE_PERM | self.kind.mode_bits()
    }

    /// Snapshot of the mutable state.
    #[must_use]
    pub fn attrs(&self) -> InodeAttrs {
        *self.lock()
    }

    /// Current link count.
    #[must_use]
    pub fn nlink(&self) -> u32 {
        self.lock().nlink
    }

    /// Current flags.
    #[must_use]
    pub fn flags(&self) -> InodeFlags {
        self.lock().flags
    }

    /// Adopt size and times from `stat` unless the local state is current.
    ///
    /// Cached contents are discarded first if the inode had any. Returns
    /// true if anything was adopted.
    pub fn update_from_stat(&self, stat: &Stat) -> bool {
        let mut attrs = self.lock();
        if attrs.is_current(stat) {
            return false;
        }
        if attrs.size != 0 {
            attrs.cache_purges += 1;
            trace!(ino = self.ino, "purging cached contents");
        }
        attrs.size = stat.size;
        attrs.atime = stat.atime;
        attrs.mtime = stat.mtime;
        attrs.ctime = stat.ctime;
        true
    }

    /// Set `flags`.
    pub fn insert_flags(&self, flags: InodeFlags) {
        self.lock().flags.insert(flags);
    }

    /// Clear `flags`, returning whether any of them were set.
    pub fn take_flags(&self, flags: InodeFlags) -> bool {
        let mut attrs = self.lock();
        let was_set = attrs.flags.intersects(flags);
        attrs.flags.remove(flags);
        was_set
    }

    /// Record a local modification, as a write through this client would.
    pub fn set_local(&self, size: i64, mtime: u32) {
        let mut attrs = self.lock();
        attrs.size = size;
        attrs.mtime = mtime;
        attrs.ctime = mtime;
    }

    pub(crate) fn inc_nlink(&self) {
        let mut attrs = self.lock();
        attrs.nlink = attrs.nlink.saturating_add(1);
    }

    pub(crate) fn drop_nlink(&self) {
        let mut attrs = self.lock();
        attrs.nlink = attrs.nlink.saturating_sub(1);
    }

    pub(crate) fn clear_nlink(&self) {
        self.lock().nlink = 0;
    }

    pub(crate) fn set_nlink(&self, nlink: u32) {
        self.lock().nlink = nlink;
    }
}

// =============================================================================
// Dentry Cache
// =============================================================================

/// Inodes by path below the mount root (`""` is the root itself).
pub struct InodeCache {
    entries: DashMap<String, Arc<Inode>>,
    next_ino: AtomicU64,
}

impl InodeCache {
    /// A cache holding only the root directory.
    #[must_use]
    pub fn new() -> Self {
        let cache = Self {
            entries: DashMap::new(),
            next_ino: AtomicU64::new(INO_MAX_RESERVED + 1),
        };
        let root = cache.alloc(&Stat::of_type(StatType::Dir));
        root.set_nlink(2);
        cache.entries.insert(String::new(), root);
        cache
    }

    /// A new inode with a unique number above the reserved range.
    #[must_use]
    pub fn alloc(&self, stat: &Stat) -> Arc<Inode> {
        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        Arc::new(Inode::new(ino, stat))
    }

    /// The inode at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<Inode>> {
        self.entries.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> Arc<Inode> {
        match self.get("") {
            Some(root) => root,
            None => {
                let root = self.alloc(&Stat::of_type(StatType::Dir));
                self.entries.insert(String::new(), Arc::clone(&root));
                root
            }
        }
    }

    /// The cached inode at `path` if it has the kind `stat` describes,
    /// otherwise a new one bound to `path`.
    pub fn get_or_alloc(&self, path: &str, stat: &Stat) -> Arc<Inode> {
        let kind = InodeKind::from_stat(stat.stat_type());
        if let Some(inode) = self.get(path).filter(|inode| inode.kind() == kind) {
            return inode;
        }
        let inode = self.alloc(stat);
        self.insert(path, Arc::clone(&inode));
        inode
    }

    /// Bind `inode` to `path`.
    pub fn insert(&self, path: &str, inode: Arc<Inode>) {
        self.entries.insert(path.to_owned(), inode);
    }

    /// Drop `path` and everything cached below it.
    pub fn remove_tree(&self, path: &str) {
        let prefix = format!("{path}/");
        self.entries
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    /// Move `from` and everything below it to `to`, replacing what was there.
    pub fn rename_tree(&self, from: &str, to: &str) {
        self.remove_tree(to);
        let prefix = format!("{from}/");
        let moved: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key == from || key.starts_with(&prefix))
            .collect();
        for key in moved {
            if let Some((_, inode)) = self.entries.remove(&key) {
                self.entries
                    .insert(format!("{to}{}", &key[from.len()..]), inode);
            }
        }
    }

    /// Number of cached inodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the root is always cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InodeCache {
    fn default() -> Self {
        Self::new()
    }
}
