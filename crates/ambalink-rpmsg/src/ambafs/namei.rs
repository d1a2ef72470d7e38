// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Namespace operations.

use std::sync::Arc;

use ambalink_abi::ambafs::{Command, NAMEI_BUF_SIZE, StatType};
use ambalink_ipc::platform::Platform;
use tracing::{debug, warn};

use super::{FsClient, FsError, Inode, InodeAttrs, InodeFlags, InodeKind, MsgBuffer};
use super::{check_name, child_path};
use crate::transport::RemoteCall;

impl<P: Platform, T: RemoteCall> FsClient<P, T> {
    /// Send `cmd` for `name` below `dir` and return the reply.
    fn exec_cmd(&self, dir: &str, name: &str, cmd: Command) -> Result<MsgBuffer, FsError> {
        check_name(name)?;
        let mut msg = MsgBuffer::new(NAMEI_BUF_SIZE);
        let len = msg.put_path(0, &[&self.config.mount_root, dir, "/", name])?;
        msg.set_request(cmd, 0, len);
        debug!(?cmd, dir, name, "namei");
        self.transport.exec(msg.as_mut_bytes(), len)?;
        Ok(msg)
    }

    /// Look up `name` in `dir`.
    ///
    /// Returns `None` if the remote side has no such entry, in which case any
    /// cached inode for it is dropped.
    pub fn lookup(&self, dir: &str, name: &str) -> Result<Option<Arc<Inode>>, FsError> {
        let msg = self.exec_cmd(dir, name, Command::Stat)?;
        let path = child_path(dir, name);
        if msg.flag() == 0 {
            self.inodes.remove_tree(&path);
            return Ok(None);
        }
        let stat = msg.stat(0);
        let inode = self.inodes.get_or_alloc(&path, &stat);
        inode.update_from_stat(&stat);
        Ok(Some(inode))
    }

    /// Create the file `name` in `dir`.
    ///
    /// The new inode is marked as created for writing, so local size and
    /// times are not overwritten by the remote side until it is refreshed.
    pub fn create(&self, dir: &str, name: &str) -> Result<Arc<Inode>, FsError> {
        let msg = self.exec_cmd(dir, name, Command::Create)?;
        let stat = msg.stat(0);
        if stat.stat_type() != StatType::File {
            warn!(dir, name, kind = stat.kind, "remote create failed");
            return Err(FsError::NoDevice);
        }
        let inode = self.inodes.alloc(&stat);
        self.inodes.insert(&child_path(dir, name), Arc::clone(&inode));
        inode.update_from_stat(&stat);
        inode.insert_flags(InodeFlags::CREATE_FOR_WRITE);
        Ok(inode)
    }

    /// Remove the file `name` from `dir`.
    pub fn unlink(&self, dir: &str, name: &str) -> Result<(), FsError> {
        let msg = self.exec_cmd(dir, name, Command::Delete)?;
        if msg.flag() != 0 {
            return Err(FsError::Busy);
        }
        let path = child_path(dir, name);
        if let Some(child) = self.inodes.get(&path) {
            child.drop_nlink();
        }
        self.inodes.remove_tree(&path);
        Ok(())
    }

    /// Create the directory `name` in `dir`.
    pub fn mkdir(&self, dir: &str, name: &str) -> Result<Arc<Inode>, FsError> {
        let msg = self.exec_cmd(dir, name, Command::Mkdir)?;
        let stat = msg.stat(0);
        if stat.stat_type() != StatType::Dir {
            warn!(dir, name, kind = stat.kind, "remote mkdir failed");
            return Err(FsError::NoDevice);
        }
        let inode = self.inodes.alloc(&stat);
        self.inodes.insert(&child_path(dir, name), Arc::clone(&inode));
        inode.update_from_stat(&stat);
        inode.inc_nlink();
        if let Some(parent) = self.inodes.get(dir) {
            parent.inc_nlink();
        }
        Ok(inode)
    }

    /// Remove the empty directory `name` from `dir`.
    pub fn rmdir(&self, dir: &str, name: &str) -> Result<(), FsError> {
        let msg = self.exec_cmd(dir, name, Command::Rmdir)?;
        if msg.flag() != 0 {
            return Err(FsError::Busy);
        }
        let path = child_path(dir, name);
        if let Some(child) = self.inodes.get(&path) {
            child.clear_nlink();
        }
        if let Some(parent) = self.inodes.get(dir) {
            parent.drop_nlink();
        }
        self.inodes.remove_tree(&path);
        Ok(())
    }

    /// Move `old_dir/old_name` to `new_dir/new_name`, replacing the target.
    pub fn rename(
        &self,
        old_dir: &str,
        old_name: &str,
        new_dir: &str,
        new_name: &str,
    ) -> Result<(), FsError> {
        check_name(old_name)?;
        check_name(new_name)?;
        let root = self.config.mount_root.as_str();
        let mut msg = MsgBuffer::new(NAMEI_BUF_SIZE);
        let new_len = msg.put_path(0, &[root, new_dir, "/", new_name])?;
        let old_len = msg.put_path(new_len, &[root, old_dir, "/", old_name])?;
        let len = new_len + old_len;
        msg.set_request(Command::Rename, 0, len);
        debug!(old_dir, old_name, new_dir, new_name, "rename");
        self.transport.exec(msg.as_mut_bytes(), len)?;
        if msg.flag() == 0 {
            return Err(FsError::Busy);
        }

        let is_dir = msg.stat(0).stat_type() == StatType::Dir;
        let old_parent = self.inodes.get(old_dir);
        let new_path = child_path(new_dir, new_name);
        if let Some(target) = self.inodes.get(&new_path) {
            target.drop_nlink();
            if is_dir {
                if let Some(parent) = &old_parent {
                    parent.drop_nlink();
                }
                target.drop_nlink();
            }
        } else if is_dir {
            if let Some(parent) = &old_parent {
                parent.drop_nlink();
            }
            if let Some(parent) = self.inodes.get(new_dir) {
                parent.inc_nlink();
            }
        }
        self.inodes
            .rename_tree(&child_path(old_dir, old_name), &new_path);
        Ok(())
    }

    /// Attributes of the cached inode at `path`.
    ///
    /// Right after a listing refreshed the inode this answers locally once.
    /// Otherwise the remote stat is fetched; only file stats are adopted.
    pub fn getattr(&self, path: &str) -> Result<InodeAttrs, FsError> {
        let inode = self.inodes.get(path).ok_or(FsError::NotFound)?;
        if inode.take_flags(InodeFlags::SKIP_GET_STAT) {
            return Ok(inode.attrs());
        }
        let stat = self.get_stat(path)?;
        match stat.stat_type() {
            StatType::Null => return Err(FsError::NotFound),
            StatType::File => {
                inode.update_from_stat(&stat);
            }
            StatType::Dir => {}
        }
        Ok(inode.attrs())
    }

    /// Whether the cached entry at `path` still exists remotely.
    ///
    /// Only directories are checked, through quick-stat; files and uncached
    /// paths are always valid. An invalid entry is dropped from the cache.
    pub fn revalidate(&self, path: &str) -> Result<bool, FsError> {
        let Some(inode) = self.inodes.get(path) else {
            return Ok(true);
        };
        if inode.kind() != InodeKind::Dir {
            return Ok(true);
        }
        let stat = self.quick_stat(path)?;
        if stat.stat_type() == StatType::Null {
            debug!(path, "directory vanished");
            if !path.is_empty() {
                self.inodes.remove_tree(path);
            }
            return Ok(false);
        }
        Ok(true)
    }
}
