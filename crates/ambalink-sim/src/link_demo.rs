// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! A link-control exchange with a scripted RTOS.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use ambalink_abi::Paddr;
use ambalink_abi::linkctrl::{
    CtrlMsg, LinkCtrlCmd, MEMINFO_RECORD_SIZE, MemInfo, MemInfoCmd, MemType, SuspendTarget,
};
use ambalink_ipc::SharedRegion;
use ambalink_ipc::platform::{CoreCache, MockPlatform};
use ambalink_rpmsg::linkctrl::{LINKCTRL_CHANNEL_NAME, RtosMemMap};
use ambalink_rpmsg::transport::MockChannel;
use ambalink_rpmsg::{LinkCtrl, LinkCtrlHooks};
use tracing::debug;

use crate::SimError;
use crate::board::Board;

type Link = LinkCtrl<MockPlatform, Arc<MockChannel>>;

/// Offsets inside the board scratch area.
const MEMINFO_AT: u64 = 0x1000;
const GPIO_LIST_AT: u64 = 0x1040;
const HIBER_INFO_AT: u64 = 0x1080;

/// Hooks that remember what the RTOS asked for.
#[derive(Default)]
struct Journal {
    lines: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    fn take(&self) -> Vec<String> {
        core::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl LinkCtrlHooks for Journal {
    fn on_suspend(&self, target: SuspendTarget) {
        let target = match target {
            SuspendTarget::Disk => "disk",
            SuspendTarget::Dram => "dram",
        };
        self.push(format!("suspend to {target}"));
    }

    fn on_gpio(&self, gpio: u32) {
        self.push(format!("gpio {gpio} is linux-only"));
    }

    fn on_rtos_mem(&self, map: RtosMemMap) {
        self.push(format!(
            "rtos {} system {} cached {} non-cached {}",
            map.rtos, map.system, map.cached_heap, map.non_cached_heap
        ));
    }
}

/// The RTOS half: answers Linux requests and acknowledges them.
fn rtos_responder(
    rtos: Arc<SharedRegion<CoreCache>>,
    link: Weak<Link>,
) -> impl Fn(&[u8]) + Send + Sync + 'static {
    move |data| {
        let Some(msg) = CtrlMsg::decode(data) else {
            return;
        };
        debug!(cmd = msg.cmd, "rtos received");
        match msg.command() {
            Some(LinkCtrlCmd::GetMemInfo) => {
                let Ok(offset) = rtos.resolve(
                    Paddr::from_wire(msg.param2),
                    MEMINFO_RECORD_SIZE as u64,
                ) else {
                    return;
                };
                let info = match msg.param1 {
                    0 => MemInfo {
                        base_addr: 0xE000_0000,
                        phys_addr: 0x0600_0000,
                        size: 0x0200_0000,
                    },
                    _ => MemInfo {
                        base_addr: 0xE800_0000,
                        phys_addr: 0x0800_0000,
                        size: 0x0400_0000,
                    },
                };
                rtos.publish_bytes(offset, &info.encode());
            }
            Some(LinkCtrlCmd::HiberPrepareFromLinux) => {}
            _ => return,
        }
        if let Some(link) = link.upgrade() {
            link.on_message(&CtrlMsg::new(LinkCtrlCmd::HiberAck, 0, 0).encode());
        }
    }
}

/// Query memory, take RTOS requests and run a hibernation cycle.
pub fn run(out: &mut impl Write, board: &Board) -> Result<(), SimError> {
    let channel = Arc::new(MockChannel::new());
    let journal = Arc::new(Journal::default());
    let hooks: Arc<dyn LinkCtrlHooks> = Arc::clone(&journal) as Arc<dyn LinkCtrlHooks>;
    let link = Arc::new(Link::new(
        Arc::clone(&channel),
        board.linux_region(),
        board.scratch + MEMINFO_AT,
        hooks,
    )?);
    let rtos = board.rtos_region();
    channel.set_responder(rtos_responder(Arc::clone(&rtos), Arc::downgrade(&link)));
    writeln!(out, "channel {LINKCTRL_CHANNEL_NAME}")?;

    for (name, kind) in [("heap", MemType::Heap), ("dsp", MemType::Dsp)] {
        let info = link.get_mem_info(kind)?;
        writeln!(
            out,
            "{name}: base {:#010x} phys {:#010x} size {:#x}",
            info.base_addr, info.phys_addr, info.size
        )?;
    }

    // Requests the RTOS sends on its own.
    let list_at = board.scratch + GPIO_LIST_AT;
    rtos.publish_bytes(list_at, b"12, 0x2a,047 bogus\0");
    let list_phys = rtos.paddr_of(list_at).to_wire().unwrap_or(0);
    link.on_message(&CtrlMsg::new(LinkCtrlCmd::GpioLinuxOnlyList, list_phys, 0).encode());
    link.on_message(
        &MemInfoCmd {
            rtos_start: 0x0000_0000,
            rtos_end: 0x0800_0000,
            rtos_system_start: 0x0000_0000,
            rtos_system_end: 0x0400_0000,
            cached_heap_start: 0x0400_0000,
            cached_heap_end: 0x0600_0000,
            non_cached_heap_start: 0x0600_0000,
            non_cached_heap_end: 0x0800_0000,
        }
        .encode(),
    );
    link.on_message(&CtrlMsg::new(LinkCtrlCmd::Suspend, SuspendTarget::Dram as u32, 0).encode());
    for line in journal.take() {
        writeln!(out, "{line}")?;
    }

    let info = board.linux_region().paddr_of(board.scratch + HIBER_INFO_AT);
    link.hiber_prepare(info)?;
    writeln!(out, "hibernation prepared, info at {:#x}", info.as_u64())?;
    link.hiber_enter(0)?;
    // The RTOS acknowledges once Linux has resumed.
    link.on_message(&CtrlMsg::new(LinkCtrlCmd::HiberAck, 0, 0).encode());
    link.hiber_exit(0)?;
    writeln!(out, "hibernating after exit: {}", link.is_hibernating())?;
    writeln!(out, "messages sent: {}", channel.sent().len())?;
    Ok(())
}
