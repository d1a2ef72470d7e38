// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the link-control client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex, Weak};

use ambalink_abi::linkctrl::{CtrlMsg, LinkCtrlCmd, MemInfo, MemInfoCmd, MemType, SuspendTarget};
use ambalink_ipc::platform::{CoreCache, MockPlatform, MockPpm};

use super::*;
use crate::transport::MockChannel;

const BASE: u64 = 0x7800_0000;
const MEMINFO: u64 = 0x100;
const GPIO_LIST: u64 = 0x200;

type Link = LinkCtrl<MockPlatform, Arc<MockChannel>>;

#[derive(Default)]
struct Recorder {
    suspends: Mutex<Vec<SuspendTarget>>,
    gpios: Mutex<Vec<u32>>,
    maps: Mutex<Vec<RtosMemMap>>,
}

impl LinkCtrlHooks for Recorder {
    fn on_suspend(&self, target: SuspendTarget) {
        self.suspends.lock().unwrap().push(target);
    }

    fn on_gpio(&self, gpio: u32) {
        self.gpios.lock().unwrap().push(gpio);
    }

    fn on_rtos_mem(&self, map: RtosMemMap) {
        self.maps.lock().unwrap().push(map);
    }
}

struct Setup {
    /// The RTOS view of shared memory.
    rtos: Arc<SharedRegion<CoreCache>>,
    channel: Arc<MockChannel>,
    hooks: Arc<Recorder>,
    link: Arc<Link>,
}

fn setup() -> Setup {
    let ppm = MockPpm::new(0x1000);
    let linux = Arc::new(SharedRegion::new(ppm.core_view(), Paddr::new(BASE)));
    let rtos = Arc::new(SharedRegion::new(ppm.core_view(), Paddr::new(BASE)));
    let channel = Arc::new(MockChannel::new());
    let hooks = Arc::new(Recorder::default());
    let link = Link::new(
        Arc::clone(&channel),
        linux,
        MEMINFO,
        Arc::clone(&hooks) as Arc<dyn LinkCtrlHooks>,
    )
    .unwrap()
    .with_ack_timeout(Duration::from_millis(20));
    Setup {
        rtos,
        channel,
        hooks,
        link: Arc::new(link),
    }
}

fn ack() -> [u8; 12] {
    CtrlMsg::new(LinkCtrlCmd::HiberAck, 0, 0).encode()
}

/// Answer every request with `cmd` by running `reply` and acknowledging.
fn acknowledge(setup: &Setup, cmd: LinkCtrlCmd, reply: impl Fn(&CtrlMsg) + Send + Sync + 'static) {
    let weak: Weak<Link> = Arc::downgrade(&setup.link);
    setup.channel.set_responder(move |data| {
        let msg = CtrlMsg::decode(data).unwrap();
        if msg.command() == Some(cmd) {
            reply(&msg);
            if let Some(link) = weak.upgrade() {
                link.on_message(&ack());
            }
        }
    });
}

#[test]
fn test_get_mem_info_reads_record_back() {
    let setup = setup();
    let rtos = Arc::clone(&setup.rtos);
    acknowledge(&setup, LinkCtrlCmd::GetMemInfo, move |msg| {
        let offset = rtos.resolve(Paddr::from_wire(msg.param2), 32).unwrap();
        let info = MemInfo {
            base_addr: 0xC000_0000,
            phys_addr: 0x0800_0000,
            size: 0x0010_0000 + msg.param1,
        };
        rtos.publish_bytes(offset, &info.encode());
    });

    let info = setup.link.get_mem_info(MemType::Dsp).unwrap();
    assert_eq!(info.phys_addr, 0x0800_0000);
    assert_eq!(info.size, 0x0010_0001);

    let sent = CtrlMsg::decode(&setup.channel.sent()[0]).unwrap();
    assert_eq!(sent, CtrlMsg::new(LinkCtrlCmd::GetMemInfo, 1, 0x7800_0100));
}

#[test]
fn test_unacknowledged_request_times_out() {
    let setup = setup();
    assert_eq!(
        setup.link.get_mem_info(MemType::Heap),
        Err(LinkCtrlError::Timeout)
    );
}

#[test]
fn test_hibernation_cycle() {
    let setup = setup();
    acknowledge(&setup, LinkCtrlCmd::HiberPrepareFromLinux, |_| {});

    setup.link.hiber_prepare(Paddr::new(BASE + 0x400)).unwrap();
    assert!(setup.link.is_hibernating());

    setup.link.hiber_enter(1).unwrap();
    setup.link.on_message(&ack());
    setup.link.hiber_exit(0).unwrap();
    assert!(!setup.link.is_hibernating());

    let cmds: Vec<u32> = setup
        .channel
        .sent()
        .iter()
        .map(|data| CtrlMsg::decode(data).unwrap().cmd)
        .collect();
    assert_eq!(cmds, [0, 1, 2]);
}

#[test]
fn test_hiber_exit_waits_for_ack_before_sending() {
    let setup = setup();
    assert_eq!(setup.link.hiber_exit(0), Err(LinkCtrlError::Timeout));
    assert!(setup.channel.sent().is_empty());
}

#[test]
fn test_prepare_outside_shared_memory_is_rejected() {
    let setup = setup();
    assert_eq!(
        setup.link.hiber_prepare(Paddr::new(0x1000)),
        Err(LinkCtrlError::BadAddress(0x1000))
    );
    assert!(setup.channel.sent().is_empty());
    assert!(!setup.link.is_hibernating());
}

#[test]
fn test_suspend_dispatch() {
    let setup = setup();
    setup
        .link
        .on_message(&CtrlMsg::new(LinkCtrlCmd::Suspend, 1, 0).encode());
    setup
        .link
        .on_message(&CtrlMsg::new(LinkCtrlCmd::Suspend, 9, 0).encode());
    assert_eq!(*setup.hooks.suspends.lock().unwrap(), [SuspendTarget::Dram]);
}

#[test]
fn test_gpio_list_from_shared_memory() {
    let setup = setup();
    setup.rtos.publish_bytes(GPIO_LIST, b"3, 0x10,bad,017\0");
    let phys = u32::try_from(BASE + GPIO_LIST).unwrap();
    setup
        .link
        .on_message(&CtrlMsg::new(LinkCtrlCmd::GpioLinuxOnlyList, phys, 0).encode());
    assert_eq!(*setup.hooks.gpios.lock().unwrap(), [3, 16, 15]);
}

#[test]
fn test_rtos_memory_map_has_inclusive_ends() {
    let setup = setup();
    let cmd = MemInfoCmd {
        rtos_start: 0x0000_0000,
        rtos_end: 0x0800_0000,
        rtos_system_start: 0x0000_0000,
        rtos_system_end: 0x0400_0000,
        cached_heap_start: 0x0400_0000,
        cached_heap_end: 0x0600_0000,
        non_cached_heap_start: 0x0600_0000,
        non_cached_heap_end: 0x0800_0000,
    };
    setup.link.on_message(&cmd.encode());

    let maps = setup.hooks.maps.lock().unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].rtos.end, 0x0800_0000);
    assert_eq!(maps[0].system.end, 0x03FF_FFFF);
    assert_eq!(maps[0].cached_heap.end, 0x05FF_FFFF);
    assert!(maps[0].non_cached_heap.contains(0x07FF_FFFF));
    assert!(!maps[0].non_cached_heap.contains(0x0800_0000));
}

#[test]
fn test_unknown_and_short_messages_are_ignored() {
    let setup = setup();
    setup.link.on_message(&[1, 2, 3]);
    setup
        .link
        .on_message(&CtrlMsg { cmd: 42, param1: 0, param2: 0 }.encode());
    setup
        .link
        .on_message(&CtrlMsg::new(LinkCtrlCmd::HiberEnterFromLinux, 0, 0).encode());
    assert!(setup.hooks.suspends.lock().unwrap().is_empty());
    assert!(setup.hooks.gpios.lock().unwrap().is_empty());
    assert!(setup.hooks.maps.lock().unwrap().is_empty());
}
