// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Paginated directory listing.
//!
//! A listing is a remote session: `LS_INIT` opens it and returns the first
//! batch, `LS_NEXT` returns further batches until one comes back empty, and
//! `LS_EXIT` closes it. Each batch is held in a page until every record has
//! been handed to the caller's filler. A filler that runs out of room stops
//! the walk on the current record; the next [`FsClient::read_dir`] resumes
//! at exactly that record without asking the peer for anything.

use ambalink_abi::ambafs::{
    Command, LS_CONTINUE_PAYLOAD, MSG_PARAM_OFFSET, READDIR_PAGE_SIZE, StatType,
    stat_record_stride,
};
use ambalink_ipc::platform::Platform;
use tracing::{debug, trace, warn};

use super::{FsClient, FsError, InodeFlags, InodeKind, MsgBuffer, child_path};
use crate::transport::RemoteCall;

/// First offset handed to the filler; 0 and 1 belong to `.` and `..`.
const FIRST_OFFSET: u64 = 2;

/// Smallest link count a listed directory can have.
const MIN_DIR_NLINK: u32 = 2;

/// One entry handed to the filler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry<'a> {
    /// Entry name.
    pub name: &'a str,
    /// Position of the entry within the listing.
    pub offset: u64,
    /// Inode number of the cached child.
    pub ino: u64,
    /// File type.
    pub kind: InodeKind,
}

/// Filler verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    /// The entry was taken.
    Continue,
    /// No room for the entry; stop here.
    Full,
}

/// Outcome of one [`FsClient::read_dir`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadDir {
    /// The filler filled up; call again to continue.
    Paused,
    /// Every entry has been emitted and the session is closed.
    Done,
}

/// Current remote batch.
struct Batch {
    page: MsgBuffer,
    /// Absolute offset of the next record in `page`.
    cursor: usize,
    /// Records left in `page`.
    remaining: u8,
    /// Directory records seen so far, `.` and `..` included.
    subdirs: u32,
}

enum State {
    Fresh,
    Active(Batch),
    Finished,
}

/// An open directory listing.
pub struct DirHandle {
    path: String,
    offset: u64,
    state: State,
}

impl DirHandle {
    /// Directory being listed.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Offset the next emitted entry will carry.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// True once the listing has completed or failed.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }
}

impl<P: Platform, T: RemoteCall> FsClient<P, T> {
    /// Open the cached directory at `path` for listing.
    pub fn open_dir(&self, path: &str) -> Result<DirHandle, FsError> {
        let dir = self.inodes.get(path).ok_or(FsError::NotFound)?;
        if dir.kind() != InodeKind::Dir {
            return Err(FsError::NotFound);
        }
        Ok(DirHandle {
            path: path.to_owned(),
            offset: FIRST_OFFSET,
            state: State::Fresh,
        })
    }

    /// Emit entries to `filler` until it is full or the listing ends.
    ///
    /// Every record refreshes the child's inode and marks it to skip the
    /// next getattr. When the listing ends the directory's link count is set
    /// from the number of subdirectories seen, never below 2. An empty first
    /// batch closes the session at once and leaves the link count alone.
    pub fn read_dir<F>(&self, handle: &mut DirHandle, mut filler: F) -> Result<ReadDir, FsError>
    where
        F: FnMut(DirEntry<'_>) -> Fill,
    {
        if matches!(handle.state, State::Fresh) {
            match self.ls_init(&handle.path) {
                Ok(mut batch) if batch.remaining == 0 => {
                    debug!(path = %handle.path, "empty listing");
                    self.ls_exit(&mut batch.page);
                    handle.state = State::Finished;
                    return Ok(ReadDir::Done);
                }
                Ok(batch) => handle.state = State::Active(batch),
                Err(err) => {
                    handle.state = State::Finished;
                    return Err(err);
                }
            }
        }
        let State::Active(batch) = &mut handle.state else {
            return Ok(ReadDir::Done);
        };

        loop {
            while batch.remaining > 0 {
                let Some((stat, raw)) = batch.page.record(batch.cursor) else {
                    warn!(path = %handle.path, cursor = batch.cursor, "malformed listing record");
                    self.ls_exit(&mut batch.page);
                    handle.state = State::Finished;
                    return Err(FsError::Io);
                };
                let stride = stat_record_stride(raw.len());
                let name = String::from_utf8_lossy(raw).into_owned();
                let is_dir = stat.stat_type() == StatType::Dir;
                if is_dir {
                    batch.subdirs += 1;
                }
                let kind = InodeKind::from_stat(stat.stat_type());

                if name != "." && name != ".." {
                    let child = self
                        .inodes
                        .get_or_alloc(&child_path(&handle.path, &name), &stat);
                    child.update_from_stat(&stat);
                    child.insert_flags(InodeFlags::SKIP_GET_STAT);
                    let entry = DirEntry {
                        name: &name,
                        offset: handle.offset,
                        ino: child.ino(),
                        kind,
                    };
                    if filler(entry) == Fill::Full {
                        // Counted again when the record is retried.
                        if is_dir {
                            batch.subdirs -= 1;
                        }
                        trace!(path = %handle.path, name, "listing paused");
                        return Ok(ReadDir::Paused);
                    }
                    handle.offset += 1;
                }

                batch.cursor += stride;
                batch.remaining -= 1;
            }

            batch
                .page
                .set_request(Command::LsNext, self.config.ls_batch, LS_CONTINUE_PAYLOAD);
            if let Err(err) = self
                .transport
                .exec(batch.page.as_mut_bytes(), LS_CONTINUE_PAYLOAD)
            {
                self.ls_exit(&mut batch.page);
                handle.state = State::Finished;
                return Err(err.into());
            }
            let count = batch.page.flag();
            trace!(path = %handle.path, count, "listing batch");
            if count == 0 {
                if let Some(dir) = self.inodes.get(&handle.path) {
                    dir.set_nlink(batch.subdirs.max(MIN_DIR_NLINK));
                }
                self.ls_exit(&mut batch.page);
                handle.state = State::Finished;
                return Ok(ReadDir::Done);
            }
            batch.cursor = MSG_PARAM_OFFSET;
            batch.remaining = count;
        }
    }

    /// Close `handle`, ending the remote session if it is still open.
    pub fn close_dir(&self, handle: DirHandle) {
        if let State::Active(mut batch) = handle.state {
            self.ls_exit(&mut batch.page);
        }
    }

    fn ls_init(&self, path: &str) -> Result<Batch, FsError> {
        let mut page = MsgBuffer::try_new(READDIR_PAGE_SIZE)?;
        let len = page.put_path(0, &[&self.config.mount_root, path, "/*"])?;
        page.set_request(Command::LsInit, self.config.ls_batch, len);
        debug!(path, batch = self.config.ls_batch, "listing");
        self.transport.exec(page.as_mut_bytes(), len)?;

        let count = page.flag();
        if count == 0 {
            if let Some(code) = page.stat(0).error_code() {
                warn!(path, code, "remote listing failed");
                self.ls_exit(&mut page);
                return Err(FsError::Io);
            }
        }
        Ok(Batch {
            page,
            cursor: MSG_PARAM_OFFSET,
            remaining: count,
            subdirs: 0,
        })
    }

    fn ls_exit(&self, page: &mut MsgBuffer) {
        page.set_request(Command::LsExit, 0, LS_CONTINUE_PAYLOAD);
        if let Err(err) = self
            .transport
            .send(page.as_bytes(), LS_CONTINUE_PAYLOAD, None)
        {
            warn!(%err, "closing remote listing failed");
        }
    }
}
