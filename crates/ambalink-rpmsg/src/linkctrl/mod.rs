// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Link-control channel.
//!
//! Linux drives hibernation and queries memory regions; the RTOS asks Linux
//! to suspend, hands over the GPIOs Linux owns exclusively and publishes its
//! memory map. Requests that expect an answer wait for `HIBER_ACK`; larger
//! replies travel through shared memory by physical address.

mod gpio;

#[cfg(test)]
mod linkctrl_test;

pub use gpio::{parse_c_uint, parse_gpio_list};

use core::fmt;
use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use ambalink_abi::Paddr;
use ambalink_abi::linkctrl::{
    CtrlMsg, LinkCtrlCmd, MEMINFO_RECORD_SIZE, MemInfo, MemInfoCmd, MemType, SuspendTarget,
};
use ambalink_ipc::SharedRegion;
use ambalink_ipc::platform::Platform;
use tracing::{debug, info, warn};

use crate::transport::{Channel, TransportError};

/// RPMSG channel name announced by the RTOS.
pub const LINKCTRL_CHANNEL_NAME: &str = "AmbaRpdev_LinkCtrl";

// =============================================================================
// Errors
// =============================================================================

/// Link-control failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCtrlError {
    /// The channel failed.
    Transport(TransportError),
    /// The RTOS did not acknowledge in time.
    Timeout,
    /// The address is outside shared memory or not 32-bit.
    BadAddress(u64),
}

impl fmt::Display for LinkCtrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport: {err}"),
            Self::Timeout => write!(f, "no acknowledgement from remote core"),
            Self::BadAddress(addr) => write!(f, "unusable shared address {addr:#x}"),
        }
    }
}

impl core::error::Error for LinkCtrlError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for LinkCtrlError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

// =============================================================================
// RTOS Memory Map
// =============================================================================

/// A physical memory range with an inclusive end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemRange {
    /// First byte.
    pub start: u64,
    /// Last byte.
    pub end: u64,
}

impl MemRange {
    /// True if `addr` lies inside the range.
    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr <= self.end
    }
}

impl fmt::Display for MemRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}-{:#010x}]", self.start, self.end)
    }
}

/// Memory regions the RTOS keeps for itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RtosMemMap {
    /// The whole RTOS region, as announced.
    pub rtos: MemRange,
    /// RTOS system memory.
    pub system: MemRange,
    /// Cached heap.
    pub cached_heap: MemRange,
    /// Non-cached heap.
    pub non_cached_heap: MemRange,
}

impl From<MemInfoCmd> for RtosMemMap {
    fn from(cmd: MemInfoCmd) -> Self {
        let inclusive = |start: u32, end: u32| MemRange {
            start: u64::from(start),
            end: u64::from(end).saturating_sub(1),
        };
        Self {
            rtos: MemRange {
                start: u64::from(cmd.rtos_start),
                end: u64::from(cmd.rtos_end),
            },
            system: inclusive(cmd.rtos_system_start, cmd.rtos_system_end),
            cached_heap: inclusive(cmd.cached_heap_start, cmd.cached_heap_end),
            non_cached_heap: inclusive(cmd.non_cached_heap_start, cmd.non_cached_heap_end),
        }
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Platform actions triggered by RTOS requests.
///
/// Called on the thread that delivers the message.
pub trait LinkCtrlHooks: Send + Sync {
    /// The RTOS asks Linux to suspend.
    fn on_suspend(&self, target: SuspendTarget) {
        debug!(?target, "suspend requested");
    }

    /// `gpio` is reserved for Linux.
    fn on_gpio(&self, gpio: u32) {
        debug!(gpio, "linux-only gpio");
    }

    /// The RTOS published its memory map.
    fn on_rtos_mem(&self, map: RtosMemMap) {
        debug!(rtos = %map.rtos, "rtos memory map");
    }
}

/// Hooks that only log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHooks;

impl LinkCtrlHooks for LogHooks {}

// =============================================================================
// Completion
// =============================================================================

/// Counting completion, as signalled by `HIBER_ACK`.
#[derive(Default)]
struct Completion {
    done: Mutex<u32>,
    cond: Condvar,
}

impl Completion {
    fn complete(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done = done.saturating_add(1);
        self.cond.notify_one();
    }

    /// Consume one completion. Returns false on timeout.
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let guard = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        let mut done = match timeout {
            None => self
                .cond
                .wait_while(guard, |done| *done == 0)
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                self.cond
                    .wait_timeout_while(guard, timeout, |done| *done == 0)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        if *done == 0 {
            return false;
        }
        *done -= 1;
        true
    }
}

// =============================================================================
// Client
// =============================================================================

/// The Linux end of the link-control channel.
pub struct LinkCtrl<P: Platform, C: Channel> {
    channel: C,
    region: Arc<SharedRegion<P::Memory>>,
    /// Region offset of the memory-info reply record.
    meminfo: u64,
    hooks: Arc<dyn LinkCtrlHooks>,
    ack: Completion,
    hibernating: AtomicBool,
    ack_timeout: Option<Duration>,
}

impl<P: Platform, C: Channel> LinkCtrl<P, C> {
    /// A client on `channel`, with the memory-info record at `meminfo`.
    ///
    /// The record must be inside `region` and its physical address must fit
    /// 32 bits.
    pub fn new(
        channel: C,
        region: Arc<SharedRegion<P::Memory>>,
        meminfo: u64,
        hooks: Arc<dyn LinkCtrlHooks>,
    ) -> Result<Self, LinkCtrlError> {
        let paddr = region.paddr_of(meminfo);
        region
            .check(meminfo, MEMINFO_RECORD_SIZE as u64)
            .map_err(|_| LinkCtrlError::BadAddress(paddr.as_u64()))?;
        paddr
            .to_wire()
            .ok_or(LinkCtrlError::BadAddress(paddr.as_u64()))?;
        info!(channel = LINKCTRL_CHANNEL_NAME, "link control ready");
        Ok(Self {
            channel,
            region,
            meminfo,
            hooks,
            ack: Completion::default(),
            hibernating: AtomicBool::new(false),
            ack_timeout: None,
        })
    }

    /// Give up waiting for an acknowledgement after `timeout`.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// The channel.
    #[inline]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// True between a completed hibernation prepare and the exit.
    #[must_use]
    pub fn is_hibernating(&self) -> bool {
        self.hibernating.load(Ordering::Acquire)
    }

    fn send(&self, cmd: LinkCtrlCmd, param1: u32, param2: u32) -> Result<(), LinkCtrlError> {
        debug!(?cmd, param1, param2, "link control send");
        self.channel
            .send(&CtrlMsg::new(cmd, param1, param2).encode())?;
        Ok(())
    }

    fn wait_ack(&self) -> Result<(), LinkCtrlError> {
        if self.ack.wait(self.ack_timeout) {
            Ok(())
        } else {
            warn!("link control acknowledgement timed out");
            Err(LinkCtrlError::Timeout)
        }
    }

    /// Ask the RTOS to describe the region of `kind`.
    pub fn get_mem_info(&self, kind: MemType) -> Result<MemInfo, LinkCtrlError> {
        let paddr = self.region.paddr_of(self.meminfo);
        let wire = paddr
            .to_wire()
            .ok_or(LinkCtrlError::BadAddress(paddr.as_u64()))?;
        self.region
            .publish_zero(self.meminfo, MEMINFO_RECORD_SIZE as u64);
        self.send(LinkCtrlCmd::GetMemInfo, kind as u32, wire)?;
        self.wait_ack()?;

        let mut raw = [0u8; MEMINFO_RECORD_SIZE];
        self.region.acquire_bytes(self.meminfo, &mut raw);
        Ok(MemInfo::decode(&raw).unwrap_or_default())
    }

    /// Tell the RTOS to prepare for hibernation, with its resume information
    /// at `info`.
    pub fn hiber_prepare(&self, info: Paddr) -> Result<(), LinkCtrlError> {
        let bad = LinkCtrlError::BadAddress(info.as_u64());
        let wire = info.to_wire().ok_or(bad)?;
        let offset = self
            .region
            .resolve(info, MEMINFO_RECORD_SIZE as u64)
            .map_err(|_| bad)?;
        info!(info = format_args!("{wire:#010x}"), "hibernation prepare");
        self.send(LinkCtrlCmd::HiberPrepareFromLinux, wire, 0)?;
        self.wait_ack()?;
        self.region.invalidate(offset, MEMINFO_RECORD_SIZE as u64);
        self.hibernating.store(true, Ordering::Release);
        Ok(())
    }

    /// Tell the RTOS Linux is entering hibernation.
    pub fn hiber_enter(&self, flag: u32) -> Result<(), LinkCtrlError> {
        info!(flag, "hibernation enter");
        self.send(LinkCtrlCmd::HiberEnterFromLinux, flag, 0)
    }

    /// Wait for the RTOS to acknowledge, then report that Linux has left
    /// hibernation.
    pub fn hiber_exit(&self, flag: u32) -> Result<(), LinkCtrlError> {
        self.wait_ack()?;
        info!(flag, "hibernation exit");
        self.send(LinkCtrlCmd::HiberExitFromLinux, flag, 0)?;
        self.hibernating.store(false, Ordering::Release);
        Ok(())
    }

    /// Dispatch one message from the RTOS.
    pub fn on_message(&self, data: &[u8]) {
        let Some(msg) = CtrlMsg::decode(data) else {
            warn!(len = data.len(), "short link control message");
            return;
        };
        match msg.command() {
            Some(LinkCtrlCmd::HiberAck) => self.ack.complete(),
            Some(LinkCtrlCmd::Suspend) => match SuspendTarget::from_u32(msg.param1) {
                Some(target) => self.hooks.on_suspend(target),
                None => warn!(target = msg.param1, "unknown suspend target"),
            },
            Some(LinkCtrlCmd::GpioLinuxOnlyList) => self.gpio_list(msg.param1),
            Some(LinkCtrlCmd::SetRtosMem) => match MemInfoCmd::decode(data) {
                Some(cmd) => self.hooks.on_rtos_mem(RtosMemMap::from(cmd)),
                None => warn!(len = data.len(), "short memory map"),
            },
            _ => debug!(cmd = msg.cmd, "ignoring link control message"),
        }
    }

    fn gpio_list(&self, phys: u32) {
        let list = self
            .region
            .resolve(Paddr::from_wire(phys), 1)
            .and_then(|offset| self.region.acquire_c_str(offset));
        match list {
            Ok(list) => {
                for gpio in parse_gpio_list(&list) {
                    self.hooks.on_gpio(gpio);
                }
            }
            Err(err) => warn!(%err, phys = format_args!("{phys:#010x}"), "unreadable gpio list"),
        }
    }
}
