// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the link-control wire format.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

#[test]
fn command_codes() {
    assert_eq!(LinkCtrlCmd::HiberAck as u32, 3);
    assert_eq!(LinkCtrlCmd::SetRtosMem as u32, 7);
    assert_eq!(LinkCtrlCmd::from_u32(5), Some(LinkCtrlCmd::GpioLinuxOnlyList));
    assert_eq!(LinkCtrlCmd::from_u32(8), None);
}

#[test]
fn ctrl_msg_is_three_words() {
    let msg = CtrlMsg::new(LinkCtrlCmd::GetMemInfo, 1, 0x1000_0020);
    let bytes = msg.encode();
    assert_eq!(&bytes[0..4], &6u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
    assert_eq!(&bytes[8..12], &0x1000_0020u32.to_le_bytes());
    assert_eq!(CtrlMsg::decode(&bytes), Some(msg));
    assert_eq!(CtrlMsg::decode(&bytes[..8]), None);
}

#[test]
fn meminfo_cmd_word_order() {
    let info = MemInfoCmd {
        rtos_start: 0x100,
        rtos_end: 0x900,
        rtos_system_start: 0x100,
        rtos_system_end: 0x200,
        cached_heap_start: 0x200,
        cached_heap_end: 0x400,
        non_cached_heap_start: 0x400,
        non_cached_heap_end: 0x900,
    };
    let bytes = info.encode();
    assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
    assert_eq!(&bytes[32..36], &0x900u32.to_le_bytes());
    assert_eq!(MemInfoCmd::decode(&bytes), Some(info));
}

#[test]
fn meminfo_record_is_one_line() {
    let info = MemInfo {
        base_addr: 1,
        phys_addr: 2,
        size: 3,
    };
    let bytes = info.encode();
    assert_eq!(bytes.len(), 32);
    assert!(bytes[12..].iter().all(|&b| b == 0));
    assert_eq!(MemInfo::decode(&bytes), Some(info));
}

#[test]
fn suspend_targets() {
    assert_eq!(SuspendTarget::from_u32(0), Some(SuspendTarget::Disk));
    assert_eq!(SuspendTarget::from_u32(1), Some(SuspendTarget::Dram));
    assert_eq!(SuspendTarget::from_u32(2), None);
}
