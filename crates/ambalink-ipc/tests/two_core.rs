// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Two simulated cores sharing one PPM.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use ambalink_abi::layout::{NUM_MUTEX, SLOCK_RECORD_SIZE};
use ambalink_abi::{CoreId, Paddr, PpmLayout, RingConfig};
use ambalink_ipc::platform::{MockIrqControl, MockPlatform, MockPpm, SoftIrqBus};
use ambalink_ipc::{CoreConfig, InitRole, IpcConfig, IpcContext, SharedRegion, WaitList};
use proptest::prelude::*;

const BASE: Paddr = Paddr::new(0x7800_0000);
const RING: RingConfig = RingConfig::new(16, 64);

type Core = Arc<IpcContext<MockPlatform>>;

struct Board {
    ppm: MockPpm,
    bus: SoftIrqBus,
    linux: Core,
    rtos: Core,
}

fn core(ppm: &MockPpm, bus: &SoftIrqBus, core: CoreConfig, role: InitRole) -> Core {
    let config = IpcConfig::new(core)
        .with_ring(RING)
        .with_init_role(role)
        .with_timing(Duration::from_millis(5), Duration::from_micros(200));
    let region = Arc::new(SharedRegion::new(ppm.core_view(), BASE));
    let ctx = Arc::new(
        IpcContext::new(
            region,
            Arc::new(bus.clone()),
            Arc::new(MockIrqControl::new()),
            config,
        )
        .unwrap(),
    );
    let weak: Weak<IpcContext<MockPlatform>> = Arc::downgrade(&ctx);
    bus.register(core.local_wake, move |_| {
        if let Some(ctx) = weak.upgrade() {
            ctx.mutexes().handle_wake_irq();
        }
    });
    ctx
}

fn board() -> Board {
    let ppm = MockPpm::new(PpmLayout::new(BASE, RING).total_size());
    let bus = SoftIrqBus::new();
    let rtos = core(&ppm, &bus, CoreConfig::RTOS, InitRole::Initializer);
    let linux = core(&ppm, &bus, CoreConfig::LINUX, InitRole::Attacher);
    Board {
        ppm,
        bus,
        linux,
        rtos,
    }
}

#[test]
fn spinlock_round_trip_restores_every_word() {
    let board = board();
    let table = board.linux.layout().slock_table();
    let words = board.linux.spinlocks().len();
    let span = words * SLOCK_RECORD_SIZE as usize;

    let mut before = vec![0u8; span];
    board.ppm.peek(table, &mut before);
    for id in 0..words {
        let flags = board.linux.spinlocks().lock_irqsave(id);
        assert_eq!(board.rtos.spinlocks().peek(id), Some(1));
        board.linux.spinlocks().unlock_irqrestore(id, flags);
    }
    let mut after = vec![0u8; span];
    board.ppm.peek(table, &mut after);
    assert_eq!(before, after);
}

#[test]
fn spinlock_excludes_the_peer() {
    let board = board();
    board.rtos.spinlocks().lock(9);

    let linux = Arc::clone(&board.linux);
    let acquired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&acquired);
    let waiter = thread::spawn(move || {
        linux.spinlocks().lock(9);
        flag.store(true, Ordering::SeqCst);
        linux.spinlocks().unlock(9);
    });

    thread::sleep(Duration::from_millis(30));
    assert!(!acquired.load(Ordering::SeqCst));
    board.rtos.spinlocks().unlock(9);
    waiter.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}

#[test]
fn invalid_spinlock_id_is_a_no_op() {
    let board = board();
    let size = board.linux.spinlocks().len();
    board.linux.spinlocks().lock(size);
    board.linux.spinlocks().unlock(size + 7);
    assert_eq!(board.linux.spinlocks().peek(size), None);
}

#[test]
fn mutex_is_mutually_exclusive_across_cores() {
    let board = board();
    let inside = Arc::new(AtomicBool::new(false));
    let entries = Arc::new(AtomicU32::new(0));

    let workers: Vec<_> = [Arc::clone(&board.linux), Arc::clone(&board.rtos)]
        .into_iter()
        .map(|ctx| {
            let inside = Arc::clone(&inside);
            let entries = Arc::clone(&entries);
            thread::spawn(move || {
                for _ in 0..40 {
                    ctx.mutexes().lock(3);
                    assert!(!inside.swap(true, Ordering::SeqCst));
                    thread::sleep(Duration::from_micros(100));
                    inside.store(false, Ordering::SeqCst);
                    entries.fetch_add(1, Ordering::SeqCst);
                    ctx.mutexes().unlock(3);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(entries.load(Ordering::SeqCst), 80);
    assert_eq!(board.linux.mutexes().owner(3), Some(CoreId::NONE));
    assert_eq!(board.linux.mutexes().wait_list(3), Some(WaitList::empty()));
}

#[test]
fn mutex_is_reentrant_on_one_core() {
    let board = board();
    let mutexes = board.linux.mutexes();
    mutexes.lock(5);
    mutexes.lock(5);
    assert_eq!(mutexes.count(5), Some(2));
    assert_eq!(board.rtos.mutexes().owner(5), Some(CoreId::LINUX));

    mutexes.unlock(5);
    assert_eq!(board.rtos.mutexes().owner(5), Some(CoreId::LINUX));
    mutexes.unlock(5);
    assert_eq!(board.rtos.mutexes().owner(5), Some(CoreId::NONE));

    board.rtos.mutexes().lock(5);
    assert_eq!(board.linux.mutexes().owner(5), Some(CoreId::RTOS));
    board.rtos.mutexes().unlock(5);
}

#[test]
fn release_wakes_only_waiting_mutexes() {
    let board = board();
    board.linux.mutexes().lock(1);

    let rtos = Arc::clone(&board.rtos);
    let waiter = thread::spawn(move || {
        rtos.mutexes().lock(1);
        rtos.mutexes().unlock(1);
    });

    while !board
        .linux
        .mutexes()
        .wait_list(1)
        .unwrap()
        .contains(WaitList::RTOS)
    {
        thread::sleep(Duration::from_millis(1));
    }
    let before = board.bus.raise_count(CoreConfig::RTOS.local_wake);
    board.linux.mutexes().unlock(1);
    waiter.join().unwrap();

    assert!(board.bus.raise_count(CoreConfig::RTOS.local_wake) > before);
    assert!(board.rtos.mutexes().wake_count(1).unwrap() >= 1);
    for id in (0..NUM_MUTEX).filter(|&id| id != 1) {
        assert_eq!(board.rtos.mutexes().wake_count(id), Some(0), "mutex {id}");
    }
}

#[test]
fn release_without_waiters_raises_nothing() {
    let board = board();
    board.linux.mutexes().lock(2);
    board.linux.mutexes().unlock(2);
    assert_eq!(board.bus.raise_count(CoreConfig::RTOS.local_wake), 0);
}

#[test]
#[should_panic(expected = "unlocked by")]
fn extra_unlock_is_fatal() {
    let board = board();
    board.linux.mutexes().lock(4);
    board.linux.mutexes().unlock(4);
    board.linux.mutexes().unlock(4);
}

#[test]
#[should_panic(expected = "while owned by")]
fn unlock_by_non_owner_is_fatal() {
    let board = board();
    board.rtos.mutexes().lock(6);
    board.linux.mutexes().unlock(6);
}

#[test]
fn invalid_mutex_id_is_ignored() {
    let board = board();
    board.linux.mutexes().lock(NUM_MUTEX);
    board.linux.mutexes().unlock(NUM_MUTEX);
    assert_eq!(board.linux.mutexes().owner(NUM_MUTEX), None);
}

#[test]
fn initializer_clears_stale_tables() {
    let ppm = MockPpm::new(PpmLayout::new(BASE, RING).total_size());
    let layout = PpmLayout::new(BASE, RING);
    ppm.poke(layout.slock_record(0).unwrap(), &1u32.to_le_bytes());
    ppm.poke(layout.mutex_record(0).unwrap(), &[0, 0, 0, 0, 0x2, 0x1]);

    let bus = SoftIrqBus::new();
    let rtos = core(&ppm, &bus, CoreConfig::RTOS, InitRole::Initializer);
    assert_eq!(rtos.spinlocks().peek(0), Some(0));
    assert_eq!(rtos.mutexes().owner(0), Some(CoreId::NONE));
    assert_eq!(rtos.mutexes().wait_list(0), Some(WaitList::empty()));
}

#[test]
fn region_too_small_is_rejected() {
    let ppm = MockPpm::new(4096);
    let region = Arc::new(SharedRegion::new(ppm.core_view(), BASE));
    let result = IpcContext::<MockPlatform>::new(
        region,
        Arc::new(SoftIrqBus::new()),
        Arc::new(MockIrqControl::new()),
        IpcConfig::new(CoreConfig::LINUX).with_ring(RING),
    );
    assert!(result.is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn spinlock_sequences_leave_table_free(ids in prop::collection::vec(0usize..511, 1..40)) {
        let board = board();
        for &id in &ids {
            if id % 2 == 0 {
                board.linux.spinlocks().lock(id);
                board.linux.spinlocks().unlock(id);
            } else {
                let flags = board.rtos.spinlocks().lock_irqsave(id);
                board.rtos.spinlocks().unlock_irqrestore(id, flags);
            }
        }
        for &id in &ids {
            prop_assert_eq!(board.linux.spinlocks().peek(id), Some(0));
        }
    }
}
