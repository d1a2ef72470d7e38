// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the mock platform.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::*;
use ambalink_abi::SoftIrq;

#[test]
fn test_writes_invisible_until_clean() {
    let ppm = MockPpm::new(256);
    let core_a = ppm.core_view();
    let core_b = ppm.core_view();

    core_a.write(0x40, &[1, 2, 3, 4]);
    let mut buf = [0u8; 4];
    core_b.read(0x40, &mut buf);
    assert_eq!(buf, [0, 0, 0, 0]);

    core_a.clean(0x40, 4);
    assert_eq!(ppm.peek_u32(0x40), 0x0403_0201);
}

#[test]
fn test_stale_line_until_invalidate() {
    let ppm = MockPpm::new(256);
    let core_a = ppm.core_view();
    let core_b = ppm.core_view();

    let mut buf = [0u8; 1];
    core_b.read(0x20, &mut buf);
    assert_eq!(buf, [0]);

    core_a.write(0x20, &[7]);
    core_a.clean(0x20, 1);

    core_b.read(0x20, &mut buf);
    assert_eq!(buf, [0], "cached line must stay stale");

    core_b.invalidate(0x20, 1);
    core_b.read(0x20, &mut buf);
    assert_eq!(buf, [7]);
}

#[test]
fn test_clean_writes_only_dirty_bytes() {
    let ppm = MockPpm::new(64);
    let core_a = ppm.core_view();
    let core_b = ppm.core_view();

    // Both cores cache the same line and update different bytes.
    core_a.write(0, &[0xAA]);
    core_b.write(1, &[0xBB]);
    core_a.clean(0, 32);
    core_b.clean(0, 32);

    let mut raw = [0u8; 2];
    ppm.peek(0, &mut raw);
    assert_eq!(raw, [0xAA, 0xBB]);
}

#[test]
fn test_swap_bypasses_cache() {
    let ppm = MockPpm::new(64);
    let core = ppm.core_view();
    assert_eq!(core.swap_u32(8, 1), 0);
    assert_eq!(core.swap_u32(8, 1), 1);
    core.store_u32(8, 0);
    assert_eq!(ppm.peek_u32(8), 0);
}

#[test]
fn test_invalidate_and_clean_are_counted() {
    let ppm = MockPpm::new(128);
    let core = ppm.core_view();
    core.write(0, &[1; 40]);
    assert_eq!(core.cached_lines(), 2);
    core.clean(0, 40);
    core.invalidate(0, 40);
    assert_eq!(core.cached_lines(), 0);
    assert_eq!(core.clean_count(), 1);
    assert_eq!(core.invalidate_count(), 1);
}

#[test]
#[should_panic(expected = "exceeds PPM size")]
fn test_out_of_range_access_panics() {
    let ppm = MockPpm::new(64);
    let core = ppm.core_view();
    core.write(62, &[0; 4]);
}

#[test]
fn test_soft_irq_bus_dispatch() {
    let bus = SoftIrqBus::new();
    let hits = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&hits);
    bus.register(SoftIrq::MUTEX_WAKE_LINUX, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.raise(SoftIrq::MUTEX_WAKE_LINUX);
    bus.raise(SoftIrq::MUTEX_WAKE_RTOS);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(bus.is_pending(SoftIrq::MUTEX_WAKE_LINUX));
    assert_eq!(bus.raise_count(SoftIrq::MUTEX_WAKE_RTOS), 1);

    bus.clear(SoftIrq::MUTEX_WAKE_LINUX);
    assert!(!bus.is_pending(SoftIrq::MUTEX_WAKE_LINUX));
}

#[test]
fn test_irq_control_nesting() {
    let irq = MockIrqControl::new();
    let outer = irq.save_and_disable();
    let inner = irq.save_and_disable();
    assert_eq!(irq.irq_depth(), 2);
    irq.restore(inner);
    irq.restore(outer);
    assert_eq!(irq.irq_depth(), 0);
    assert_eq!(irq.save_count(), 2);
}
