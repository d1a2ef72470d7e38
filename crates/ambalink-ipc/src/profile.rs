// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! RPMSG latency profiling.
//!
//! The profile timer counts down, so an earlier sample is normally larger
//! than a later one.

use std::sync::{Mutex, PoisonError};

use crate::platform::Mmio;

/// Ticks elapsed between two samples of the down-counting timer.
#[inline]
#[must_use]
pub const fn timer_diff(start: u32, end: u32) -> u32 {
    if end <= start {
        start - end
    } else {
        u32::MAX - end + 1 + start
    }
}

/// Timestamps the peer recorded for one buffer it sent us.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerStamps {
    /// When the peer started looking for a free buffer.
    pub to_get_buffer: u32,
    /// When the peer raised the kick interrupt.
    pub to_send_interrupt: u32,
}

/// Accumulated RPMSG statistics (`AMBA_RPMSG_STATISTIC_s`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpmsgStats {
    /// Last buffer request sample (0 before the first).
    pub last_inject: u32,
    /// Sum of the intervals between buffer requests.
    pub total_inject: u64,
    /// Sum of response latencies.
    pub response_total: u64,
    /// Worst response latency.
    pub response_max: u32,
    /// Sum of receive-callback durations.
    pub recv_cb_total: u64,
    /// Shortest receive callback.
    pub recv_cb_min: u32,
    /// Longest receive callback.
    pub recv_cb_max: u32,
    /// Sum of peer send durations.
    pub tx_send_total: u64,
    /// Sum of local receive durations.
    pub recv_total: u64,
    /// Sum of end-to-end peer-to-Linux latencies.
    pub tx_to_lx_total: u64,
    /// Shortest end-to-end latency.
    pub tx_to_lx_min: u32,
    /// Longest end-to-end latency.
    pub tx_to_lx_max: u32,
}

impl Default for RpmsgStats {
    fn default() -> Self {
        Self {
            last_inject: 0,
            total_inject: 0,
            response_total: 0,
            response_max: 0,
            recv_cb_total: 0,
            recv_cb_min: u32::MAX,
            recv_cb_max: 0,
            tx_send_total: 0,
            recv_total: 0,
            tx_to_lx_total: 0,
            tx_to_lx_min: u32::MAX,
            tx_to_lx_max: 0,
        }
    }
}

/// Collects [`RpmsgStats`] from a timer register.
pub struct RpmsgProfiler<R: Mmio> {
    regs: R,
    timer: u64,
    stats: Mutex<RpmsgStats>,
}

impl<R: Mmio> RpmsgProfiler<R> {
    /// Profile against the down-counting timer register at `timer`.
    pub fn new(regs: R, timer: u64) -> Self {
        Self {
            regs,
            timer,
            stats: Mutex::new(RpmsgStats::default()),
        }
    }

    fn now(&self) -> u32 {
        self.regs.read32(self.timer)
    }

    fn with_stats<T>(&self, update: impl FnOnce(&mut RpmsgStats) -> T) -> T {
        update(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Sample before asking for a send buffer; accounts the inject interval.
    pub fn on_get_buffer(&self) -> u32 {
        let now = self.now();
        self.with_stats(|stats| {
            if stats.last_inject != 0 {
                stats.total_inject += u64::from(timer_diff(stats.last_inject, now));
            }
            stats.last_inject = now;
        });
        now
    }

    /// Account the response latency to a peer buffer.
    pub fn on_response(&self, to_get_buffer: u32, peer: PeerStamps) {
        let diff = timer_diff(peer.to_send_interrupt, to_get_buffer);
        self.with_stats(|stats| {
            stats.response_total += u64::from(diff);
            stats.response_max = stats.response_max.max(diff);
        });
    }

    /// Account a completed receive and return a fresh timer sample.
    pub fn on_receive_done(&self, to_get_buffer: u32, to_recv_data: u32, peer: PeerStamps) -> u32 {
        let done = self.now();
        let callback = timer_diff(to_recv_data, done);
        let end_to_end = timer_diff(peer.to_get_buffer, to_recv_data);
        self.with_stats(|stats| {
            stats.recv_cb_total += u64::from(callback);
            stats.recv_cb_max = stats.recv_cb_max.max(callback);
            stats.recv_cb_min = stats.recv_cb_min.min(callback);
            stats.tx_send_total +=
                u64::from(timer_diff(peer.to_get_buffer, peer.to_send_interrupt));
            stats.recv_total += u64::from(timer_diff(to_get_buffer, to_recv_data));
            stats.tx_to_lx_total += u64::from(end_to_end);
            stats.tx_to_lx_max = stats.tx_to_lx_max.max(end_to_end);
            stats.tx_to_lx_min = stats.tx_to_lx_min.min(end_to_end);
        });
        self.now()
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> RpmsgStats {
        self.with_stats(|stats| *stats)
    }
}
