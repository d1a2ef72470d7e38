// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! In-process RTOS peers for tests and the simulator.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ambalink_abi::Paddr;
use ambalink_abi::ambafs::{
    Command, MSG_HEADER_SIZE, MSG_PARAM_OFFSET, MsgHeader, QSTAT_MAGIC, QSTAT_MAGIC_OFFSET,
    QSTAT_RECORD_OFFSET, QSTAT_SIZE, Qstat, Stat, StatType, stat_record_stride,
};
use ambalink_abi::codec;
use ambalink_ipc::SharedRegion;
use ambalink_ipc::platform::SharedMemory;
use tracing::{debug, warn};

use super::{Channel, RemoteCall, SendCallback, TransportError, wire_len};

/// Error code the peer reports for a missing listing target.
const ENOENT: i32 = -2;

/// Number of command codes tracked.
const COMMANDS: usize = Command::QuickStat as usize + 1;

// =============================================================================
// Remote Filesystem Peer
// =============================================================================

/// One file or directory of the simulated remote tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockNode {
    /// File or directory.
    pub kind: StatType,
    /// Size in bytes.
    pub size: i64,
    /// Access time.
    pub atime: u32,
    /// Modification time.
    pub mtime: u32,
    /// Change time.
    pub ctime: u32,
}

impl MockNode {
    const fn dir(time: u32) -> Self {
        Self {
            kind: StatType::Dir,
            size: 0,
            atime: time,
            mtime: time,
            ctime: time,
        }
    }

    const fn file(size: i64, time: u32) -> Self {
        Self {
            kind: StatType::File,
            size,
            atime: time,
            mtime: time,
            ctime: time,
        }
    }

    const fn stat(&self) -> Stat {
        Stat {
            statp: 0,
            kind: self.kind as i32,
            size: self.size,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }
}

struct Listing {
    entries: Vec<(Vec<u8>, Stat)>,
    pos: usize,
}

struct PeerState {
    nodes: BTreeMap<String, MockNode>,
    sessions: HashMap<u32, Listing>,
    next_xfr: u32,
    clock: u32,
}

impl PeerState {
    fn tick(&mut self) -> u32 {
        self.clock += 1;
        self.clock
    }

    fn is_dir(&self, path: &str) -> bool {
        self.nodes
            .get(path)
            .is_some_and(|node| node.kind == StatType::Dir)
    }

    /// Direct children of `dir`, in name order.
    fn children(&self, dir: &str) -> Vec<(String, MockNode)> {
        let prefix = format!("{dir}/");
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(path, node)| (path[prefix.len()..].to_owned(), *node))
            .collect()
    }

    /// Keys of `path` and everything below it.
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = format!("{path}/");
        let mut keys: Vec<String> = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        if self.nodes.contains_key(path) {
            keys.push(path.to_owned());
        }
        keys
    }
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map_or("", |slash| &path[..slash])
}

fn base_name(path: &str) -> &str {
    path.rfind('/').map_or(path, |slash| &path[slash + 1..])
}

fn param_str(msg: &[u8], offset: usize) -> Option<String> {
    let raw = codec::get_c_str(msg, offset)?;
    String::from_utf8(raw.to_vec()).ok()
}

/// The RTOS side of ambafs over an in-memory tree.
///
/// Paths are absolute and include the mount root the client was configured
/// with; the root directory itself is created by [`MockRemoteFs::new`].
/// Listings are paginated per session, keyed by the message `xfr` word.
/// Quick-stat replies are written through the peer's own view of shared
/// memory, as the RTOS would.
pub struct MockRemoteFs<M: SharedMemory> {
    state: Mutex<PeerState>,
    region: Option<Arc<SharedRegion<M>>>,
    silent: AtomicBool,
    qstat_silent: AtomicBool,
    omit_dots: AtomicBool,
    calls: [AtomicU64; COMMANDS],
}

impl<M: SharedMemory> MockRemoteFs<M> {
    /// A peer exporting an empty directory at `root`.
    #[must_use]
    pub fn new(root: &str, region: Option<Arc<SharedRegion<M>>>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(root.to_owned(), MockNode::dir(1));
        Self {
            state: Mutex::new(PeerState {
                nodes,
                sessions: HashMap::new(),
                next_xfr: 1,
                clock: 1,
            }),
            region,
            silent: AtomicBool::new(false),
            qstat_silent: AtomicBool::new(false),
            omit_dots: AtomicBool::new(false),
            calls: core::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PeerState) -> T) -> T {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Add a file. Parent directories must exist.
    pub fn add_file(&self, path: &str, size: i64, mtime: u32) {
        self.with_state(|state| {
            state
                .nodes
                .insert(path.to_owned(), MockNode::file(size, mtime));
        });
    }

    /// Add a directory. Parent directories must exist.
    pub fn add_dir(&self, path: &str) {
        self.with_state(|state| {
            let now = state.tick();
            state.nodes.insert(path.to_owned(), MockNode::dir(now));
        });
    }

    /// Change a file as the RTOS would when writing it.
    pub fn modify(&self, path: &str, size: i64, mtime: u32) {
        self.with_state(|state| {
            if let Some(node) = state.nodes.get_mut(path) {
                node.size = size;
                node.mtime = mtime;
                node.ctime = mtime;
            }
        });
    }

    /// Remove `path` and everything below it behind the client's back.
    pub fn remove(&self, path: &str) {
        self.with_state(|state| {
            for key in state.subtree(path) {
                state.nodes.remove(&key);
            }
        });
    }

    /// The node at `path`.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<MockNode> {
        self.with_state(|state| state.nodes.get(path).copied())
    }

    /// Number of listing sessions not yet closed with `LS_EXIT`.
    #[must_use]
    pub fn open_listings(&self) -> usize {
        self.with_state(|state| state.sessions.len())
    }

    /// Stop answering every request.
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    /// Stop answering quick-stat requests only.
    pub fn set_qstat_silent(&self, silent: bool) {
        self.qstat_silent.store(silent, Ordering::SeqCst);
    }

    /// Leave `.` and `..` out of listings, as a FAT volume does at its root.
    ///
    /// An empty directory then answers `LS_INIT` with no records at all.
    pub fn set_omit_dots(&self, omit: bool) {
        self.omit_dots.store(omit, Ordering::SeqCst);
    }

    /// How many requests with `cmd` arrived.
    #[must_use]
    pub fn calls(&self, cmd: Command) -> u64 {
        self.calls[cmd as usize].load(Ordering::SeqCst)
    }

    // =========================================================================
    // Request Handling
    // =========================================================================

    /// Process one request in place. Returns false if no reply is due.
    fn handle(&self, msg: &mut [u8]) -> bool {
        let Some(header) = MsgHeader::read(msg) else {
            return false;
        };
        let Some(cmd) = header.command() else {
            warn!(cmd = header.cmd, "mock peer: unknown command");
            return false;
        };
        self.calls[cmd as usize].fetch_add(1, Ordering::SeqCst);
        debug!(?cmd, flag = header.flag, len = header.len, "mock peer request");

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match cmd {
            Command::LsInit => {
                let dots = !self.omit_dots.load(Ordering::SeqCst);
                Self::ls_init(&mut state, msg, header, dots);
            }
            Command::LsNext => Self::ls_next(&mut state, msg, header),
            Command::LsExit => {
                state.sessions.remove(&header.xfr);
                return false;
            }
            Command::Stat => Self::stat(&state, msg),
            Command::Create => Self::create(&mut state, msg),
            Command::Delete => Self::delete(&mut state, msg),
            Command::Mkdir => Self::mkdir(&mut state, msg),
            Command::Rmdir => Self::rmdir(&mut state, msg),
            Command::Rename => Self::rename(&mut state, msg),
            Command::QuickStat => {
                drop(state);
                self.quick_stat(msg);
                return false;
            }
            _ => set_flag(msg, 0),
        }
        true
    }

    fn ls_init(state: &mut PeerState, msg: &mut [u8], header: MsgHeader, dots: bool) {
        let path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        let dir = path.strip_suffix("/*").unwrap_or(&path);
        let Some(node) = state.nodes.get(dir).copied().filter(|n| n.kind == StatType::Dir) else {
            let _ = Stat {
                kind: ENOENT,
                ..Stat::default()
            }
            .encode(msg, MSG_PARAM_OFFSET, b"");
            set_flag(msg, 0);
            return;
        };

        let parent = state.nodes.get(parent_of(dir)).copied().unwrap_or(node);
        let mut entries = Vec::new();
        if dots {
            entries.push((b".".to_vec(), node.stat()));
            entries.push((b"..".to_vec(), parent.stat()));
        }
        entries.extend(
            state
                .children(dir)
                .into_iter()
                .map(|(name, child)| (name.into_bytes(), child.stat())),
        );

        let xfr = state.next_xfr;
        state.next_xfr = state.next_xfr.wrapping_add(1);
        let mut listing = Listing { entries, pos: 0 };
        fill_batch(msg, &mut listing, header.flag);
        if listing.pos == 0 {
            // No records: the type field must not read as an error.
            let _ = Stat::of_type(StatType::Null).encode(msg, MSG_PARAM_OFFSET, b"");
        }
        let _ = codec::put_u32(msg, ambalink_abi::ambafs::MSG_XFR_OFFSET, xfr);
        state.sessions.insert(xfr, listing);
    }

    fn ls_next(state: &mut PeerState, msg: &mut [u8], header: MsgHeader) {
        match state.sessions.get_mut(&header.xfr) {
            Some(listing) => fill_batch(msg, listing, header.flag),
            None => set_flag(msg, 0),
        }
    }

    fn stat(state: &PeerState, msg: &mut [u8]) {
        let path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        match state.nodes.get(&path) {
            Some(node) => reply_stat(msg, 1, node.stat(), base_name(&path)),
            None => reply_stat(msg, 0, Stat::of_type(StatType::Null), ""),
        }
    }

    fn create(state: &mut PeerState, msg: &mut [u8]) {
        let path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        let existing = state.nodes.get(&path).copied();
        if !state.is_dir(parent_of(&path)) || existing.is_some_and(|n| n.kind == StatType::Dir) {
            reply_stat(msg, 0, Stat::of_type(StatType::Null), "");
            return;
        }
        let node = match existing {
            Some(node) => node,
            None => {
                let node = MockNode::file(0, state.tick());
                state.nodes.insert(path.clone(), node);
                node
            }
        };
        reply_stat(msg, 1, node.stat(), base_name(&path));
    }

    fn delete(state: &mut PeerState, msg: &mut [u8]) {
        let path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        let is_file = state
            .nodes
            .get(&path)
            .is_some_and(|n| n.kind == StatType::File);
        if is_file {
            state.nodes.remove(&path);
            set_flag(msg, 0);
        } else {
            set_flag(msg, 1);
        }
    }

    fn mkdir(state: &mut PeerState, msg: &mut [u8]) {
        let path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        if !state.is_dir(parent_of(&path)) || state.nodes.contains_key(&path) {
            reply_stat(msg, 0, Stat::of_type(StatType::Null), "");
            return;
        }
        let node = MockNode::dir(state.tick());
        state.nodes.insert(path.clone(), node);
        reply_stat(msg, 1, node.stat(), base_name(&path));
    }

    fn rmdir(state: &mut PeerState, msg: &mut [u8]) {
        let path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        if state.is_dir(&path) && state.children(&path).is_empty() {
            state.nodes.remove(&path);
            set_flag(msg, 0);
        } else {
            set_flag(msg, 1);
        }
    }

    fn rename(state: &mut PeerState, msg: &mut [u8]) {
        let new_path = param_str(msg, MSG_PARAM_OFFSET).unwrap_or_default();
        let old_path =
            param_str(msg, MSG_PARAM_OFFSET + new_path.len() + 1).unwrap_or_default();

        let Some(node) = state.nodes.get(&old_path).copied() else {
            set_flag(msg, 0);
            return;
        };
        let target = state.nodes.get(&new_path).copied();
        let replaceable = match target {
            None => true,
            Some(t) if t.kind != node.kind => false,
            Some(t) if t.kind == StatType::Dir => state.children(&new_path).is_empty(),
            Some(_) => true,
        };
        if !state.is_dir(parent_of(&new_path))
            || !replaceable
            || new_path.starts_with(&format!("{old_path}/"))
        {
            set_flag(msg, 0);
            return;
        }

        state.nodes.remove(&new_path);
        for key in state.subtree(&old_path) {
            if let Some(moved) = state.nodes.remove(&key) {
                let renamed = format!("{new_path}{}", &key[old_path.len()..]);
                state.nodes.insert(renamed, moved);
            }
        }
        reply_stat(msg, 1, node.stat(), base_name(&new_path));
    }

    fn quick_stat(&self, msg: &[u8]) {
        if self.qstat_silent.load(Ordering::SeqCst) {
            return;
        }
        let Some(region) = &self.region else {
            warn!("mock peer: quick-stat without shared memory");
            return;
        };
        let Some(phys) = codec::get_u32(msg, MSG_PARAM_OFFSET) else {
            return;
        };
        let path = param_str(msg, MSG_PARAM_OFFSET + 4).unwrap_or_default();
        let stat = self
            .with_state(|state| state.nodes.get(&path).map(MockNode::stat))
            .unwrap_or(Stat::of_type(StatType::Null));

        let offset = match region.resolve(Paddr::from_wire(phys), QSTAT_SIZE as u64) {
            Ok(offset) => offset,
            Err(err) => {
                warn!(%err, "mock peer: bad quick-stat address");
                return;
            }
        };
        let mut record = [0u8; QSTAT_SIZE];
        let _ = Qstat {
            stat,
            magic: QSTAT_MAGIC,
        }
        .encode(&mut record, 0);
        region.publish_bytes(
            offset + QSTAT_RECORD_OFFSET as u64,
            &record[QSTAT_RECORD_OFFSET..QSTAT_MAGIC_OFFSET],
        );
        region.publish_u32(offset + QSTAT_MAGIC_OFFSET as u64, QSTAT_MAGIC);
    }
}

fn set_flag(msg: &mut [u8], flag: u8) {
    if let Some(byte) = msg.get_mut(ambalink_abi::ambafs::MSG_FLAG_OFFSET) {
        *byte = flag;
    }
}

fn reply_stat(msg: &mut [u8], flag: u8, stat: Stat, name: &str) {
    let _ = stat.encode(msg, MSG_PARAM_OFFSET, name.as_bytes());
    set_flag(msg, flag);
}

/// Copy up to `requested` records that fit the buffer into the reply.
fn fill_batch(msg: &mut [u8], listing: &mut Listing, requested: u8) {
    let mut offset = MSG_PARAM_OFFSET;
    let mut count: u8 = 0;
    while count < requested {
        let Some((name, stat)) = listing.entries.get(listing.pos) else {
            break;
        };
        if offset + stat_record_stride(name.len()) > msg.len() {
            break;
        }
        let Some(stride) = stat.encode(msg, offset, name) else {
            break;
        };
        offset += stride;
        listing.pos += 1;
        count += 1;
    }
    set_flag(msg, count);
}

impl<M: SharedMemory> RemoteCall for MockRemoteFs<M> {
    fn exec(&self, msg: &mut [u8], len: usize) -> Result<(), TransportError> {
        wire_len(msg.len(), len)?;
        if self.silent.load(Ordering::SeqCst) || !self.handle(msg) {
            return Err(TransportError::NoReply);
        }
        Ok(())
    }

    fn send(
        &self,
        msg: &[u8],
        len: usize,
        done: Option<SendCallback>,
    ) -> Result<(), TransportError> {
        let total = wire_len(msg.len(), len)?;
        if self.silent.load(Ordering::SeqCst) {
            return Ok(());
        }
        // The peer works on its own copy of the RPMSG buffer.
        let mut copy = msg[..total.max(MSG_HEADER_SIZE)].to_vec();
        copy.resize(msg.len(), 0);
        if self.handle(&mut copy) {
            if let Some(done) = done {
                done(&copy);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Datagram Channel
// =============================================================================

type Responder = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A channel that records every datagram and optionally answers it.
#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<Vec<u8>>>,
    responder: Mutex<Option<Responder>>,
}

impl MockChannel {
    /// A channel with no responder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `responder` on every sent datagram, on the sending thread.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(responder));
    }

    /// Every datagram sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Channel for MockChannel {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(data.to_vec());
        let responder = self
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(responder) = responder {
            responder(data);
        }
        Ok(())
    }
}
