// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Quick-stat: a stat answered through shared memory.
//!
//! The request carries the physical address of its own parameter area. The
//! peer writes a quick-stat record there and sets the sentinel last; the
//! client polls the sentinel line a bounded number of times.
//!
//! ```text
//! param +0   phys of the record (u32)     record +0..24 padding
//! param +4   path, NUL-terminated         record +24    stat fields
//!                                         record +56    magic
//! ```

use std::sync::PoisonError;

use ambalink_abi::ambafs::{
    Command, MSG_PARAM_OFFSET, QSTAT_BUFF_SIZE, QSTAT_MAGIC, QSTAT_MAGIC_OFFSET,
    QSTAT_RECORD_OFFSET, QSTAT_SIZE, Stat, StatType,
};
use ambalink_ipc::platform::{Doorbell, Platform};
use tracing::{debug, warn};

use super::{FsClient, FsError, MsgBuffer};
use crate::transport::RemoteCall;

/// Bytes of the stat fields, rounded up to a cache line.
const RECORD_LEN: usize = QSTAT_MAGIC_OFFSET - QSTAT_RECORD_OFFSET;

impl<P: Platform, T: RemoteCall> FsClient<P, T> {
    /// Stat `path` through the quick-stat buffer.
    ///
    /// Never blocks longer than the configured poll bound; an unanswered
    /// request yields [`StatType::Null`]. Without a quick-stat buffer this
    /// is a regular stat.
    pub fn quick_stat(&self, path: &str) -> Result<Stat, FsError> {
        let Some(area) = &self.qstat else {
            return self.get_stat(path);
        };
        let _busy = area.busy.lock().unwrap_or_else(PoisonError::into_inner);

        let param = area.offset + MSG_PARAM_OFFSET as u64;
        let record_paddr = area
            .region
            .paddr_of(param)
            .to_wire()
            .ok_or(FsError::BadBuffer)?;

        let mut msg = MsgBuffer::new(QSTAT_BUFF_SIZE);
        msg.put_param_u32(0, record_paddr)?;
        let path_len = msg.put_path(4, &[&self.config.mount_root, path])?;
        let len = path_len + 4;
        msg.set_request(Command::QuickStat, 0, len);

        // The sentinel must read as clear before the peer can set it.
        let published = (MSG_PARAM_OFFSET + len).max(MSG_PARAM_OFFSET + QSTAT_SIZE);
        area.region
            .publish_bytes(area.offset, &msg.as_bytes()[..published]);

        debug!(path, record = format_args!("{record_paddr:#x}"), "quick stat");
        self.transport.send(msg.as_bytes(), len, None)?;

        let magic = param + QSTAT_MAGIC_OFFSET as u64;
        let record = param + QSTAT_RECORD_OFFSET as u64;
        for poll in 0..self.config.qstat_polls {
            if area.region.acquire_u32(magic) == QSTAT_MAGIC {
                area.region.publish_u32(magic, 0);
                let mut raw = [0u8; RECORD_LEN];
                area.region.acquire_bytes(record, &mut raw);
                return Ok(Stat::decode(&raw, 0).unwrap_or(Stat::of_type(StatType::Null)));
            }
            if let (Some(irq), Some(doorbell)) = (self.config.qstat_kick, &area.doorbell) {
                if poll % self.config.qstat_kick_interval == 0 {
                    doorbell.raise(irq);
                }
            }
            core::hint::spin_loop();
        }

        warn!(path, polls = self.config.qstat_polls, "quick stat timed out");
        Ok(Stat::of_type(StatType::Null))
    }
}
