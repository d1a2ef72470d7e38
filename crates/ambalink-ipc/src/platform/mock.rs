// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock platform implementation for testing.
//!
//! The PPM is a heap buffer of atomic words. Each simulated core reads and
//! writes it through its own [`CoreCache`], a write-allocate cache with
//! 32-byte lines that is not coherent with the other core: forgetting an
//! invalidate or a clean is observable exactly as on hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ambalink_abi::SoftIrq;

use super::traits::{Doorbell, IrqControl, IrqFlags, Mmio, Platform, SharedMemory};

/// Cache line size of the simulated cores.
pub const CACHE_LINE_SIZE: u64 = 32;

const LINE: usize = CACHE_LINE_SIZE as usize;

// =============================================================================
// Backing Memory
// =============================================================================

struct Backing {
    words: Box<[AtomicU32]>,
}

impl Backing {
    fn new(len: u64) -> Self {
        let count = usize::try_from(len / 4).unwrap_or(0);
        Self {
            words: (0..count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn word(&self, offset: u64) -> &AtomicU32 {
        &self.words[(offset / 4) as usize]
    }

    fn load(&self, offset: u64) -> u8 {
        let shift = (offset % 4) * 8;
        (self.word(offset).load(Ordering::SeqCst) >> shift) as u8
    }

    fn store(&self, offset: u64, byte: u8) {
        let shift = (offset % 4) * 8;
        let mask = 0xFFu32 << shift;
        let _ = self
            .word(offset)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |old| {
                Some((old & !mask) | (u32::from(byte) << shift))
            });
    }

    fn load_line(&self, base: u64) -> [u8; LINE] {
        let mut data = [0u8; LINE];
        for (index, byte) in data.iter_mut().enumerate() {
            *byte = self.load(base + index as u64);
        }
        data
    }
}

/// Simulated PPM shared by two cores.
#[derive(Clone)]
pub struct MockPpm {
    backing: Arc<Backing>,
    len: u64,
}

impl MockPpm {
    /// Create a zeroed PPM of `len` bytes (rounded up to a cache line).
    #[must_use]
    pub fn new(len: u64) -> Self {
        let rounded = len.div_ceil(CACHE_LINE_SIZE) * CACHE_LINE_SIZE;
        Self {
            backing: Arc::new(Backing::new(rounded)),
            len: rounded,
        }
    }

    /// Size in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the PPM has no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A fresh, empty cache for one simulated core.
    #[must_use]
    pub fn core_view(&self) -> CoreCache {
        CoreCache {
            backing: Arc::clone(&self.backing),
            len: self.len,
            lines: Mutex::new(HashMap::new()),
            invalidates: AtomicU64::new(0),
            cleans: AtomicU64::new(0),
        }
    }

    /// Read memory directly, bypassing every cache.
    pub fn peek(&self, offset: u64, buf: &mut [u8]) {
        for (index, byte) in buf.iter_mut().enumerate() {
            *byte = self.backing.load(offset + index as u64);
        }
    }

    /// Read a little-endian word directly from memory.
    #[must_use]
    pub fn peek_u32(&self, offset: u64) -> u32 {
        let mut raw = [0u8; 4];
        self.peek(offset, &mut raw);
        u32::from_le_bytes(raw)
    }

    /// Write memory directly, bypassing every cache.
    pub fn poke(&self, offset: u64, data: &[u8]) {
        for (index, &byte) in data.iter().enumerate() {
            self.backing.store(offset + index as u64, byte);
        }
    }
}

// =============================================================================
// Per-Core Cache
// =============================================================================

struct Line {
    data: [u8; LINE],
    dirty: u32,
}

/// One core's non-coherent view of a [`MockPpm`].
pub struct CoreCache {
    backing: Arc<Backing>,
    len: u64,
    lines: Mutex<HashMap<u64, Line>>,
    invalidates: AtomicU64,
    cleans: AtomicU64,
}

impl CoreCache {
    /// Number of invalidate operations performed.
    #[must_use]
    pub fn invalidate_count(&self) -> u64 {
        self.invalidates.load(Ordering::Relaxed)
    }

    /// Number of clean operations performed.
    #[must_use]
    pub fn clean_count(&self) -> u64 {
        self.cleans.load(Ordering::Relaxed)
    }

    /// Number of lines currently cached.
    #[must_use]
    pub fn cached_lines(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[expect(
        clippy::panic,
        reason = "test mock panics intentionally on invalid offset"
    )]
    fn check(&self, offset: u64, len: u64) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "access of {len} bytes at {offset:#x} exceeds PPM size {:#x}",
            self.len
        );
    }

    fn write_back(&self, base: u64, line: &mut Line) {
        for (index, &byte) in line.data.iter().enumerate() {
            if line.dirty & (1 << index) != 0 {
                self.backing.store(base + index as u64, byte);
            }
        }
        line.dirty = 0;
    }

    fn line_range(offset: u64, len: u64) -> impl Iterator<Item = u64> {
        let first = offset / CACHE_LINE_SIZE;
        let last = (offset + len.max(1) - 1) / CACHE_LINE_SIZE;
        (first..=last).map(|line| line * CACHE_LINE_SIZE)
    }
}

impl SharedMemory for CoreCache {
    fn len(&self) -> u64 {
        self.len
    }

    fn read(&self, offset: u64, buf: &mut [u8]) {
        self.check(offset, buf.len() as u64);
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for (index, byte) in buf.iter_mut().enumerate() {
            let addr = offset + index as u64;
            let base = addr - addr % CACHE_LINE_SIZE;
            let line = lines.entry(base).or_insert_with(|| Line {
                data: self.backing.load_line(base),
                dirty: 0,
            });
            *byte = line.data[(addr - base) as usize];
        }
    }

    fn write(&self, offset: u64, data: &[u8]) {
        self.check(offset, data.len() as u64);
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for (index, &byte) in data.iter().enumerate() {
            let addr = offset + index as u64;
            let base = addr - addr % CACHE_LINE_SIZE;
            let line = lines.entry(base).or_insert_with(|| Line {
                data: self.backing.load_line(base),
                dirty: 0,
            });
            let slot = (addr - base) as usize;
            line.data[slot] = byte;
            line.dirty |= 1 << slot;
        }
    }

    /// Dirty bytes in a discarded line are written back first (clean and
    /// invalidate by address), so a line shared by two records never loses
    /// a neighbour's pending update.
    fn invalidate(&self, offset: u64, len: u64) {
        self.check(offset, len);
        self.invalidates.fetch_add(1, Ordering::Relaxed);
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for base in Self::line_range(offset, len) {
            if let Some(mut line) = lines.remove(&base) {
                self.write_back(base, &mut line);
            }
        }
    }

    fn clean(&self, offset: u64, len: u64) {
        self.check(offset, len);
        self.cleans.fetch_add(1, Ordering::Relaxed);
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for base in Self::line_range(offset, len) {
            if let Some(line) = lines.get_mut(&base) {
                self.write_back(base, line);
            }
        }
    }

    fn swap_u32(&self, offset: u64, value: u32) -> u32 {
        self.check(offset, 4);
        self.backing.word(offset).swap(value, Ordering::SeqCst)
    }

    fn store_u32(&self, offset: u64, value: u32) {
        self.check(offset, 4);
        self.backing.word(offset).store(value, Ordering::SeqCst);
    }

    fn barrier(&self) {
        std::sync::atomic::fence(Ordering::SeqCst);
    }
}

// =============================================================================
// Soft IRQ Bus
// =============================================================================

type Handler = Arc<dyn Fn(SoftIrq) + Send + Sync>;

struct BusInner {
    handlers: Mutex<HashMap<u8, Handler>>,
    pending: AtomicU32,
    raised: [AtomicU64; SoftIrq::COUNT as usize],
}

/// Software interrupt lines shared by the simulated cores.
///
/// Raising a line runs its registered handler synchronously on the raising
/// thread, standing in for the peer core taking the interrupt.
#[derive(Clone)]
pub struct SoftIrqBus {
    inner: Arc<BusInner>,
}

impl Default for SoftIrqBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftIrqBus {
    /// Create a bus with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: Mutex::new(HashMap::new()),
                pending: AtomicU32::new(0),
                raised: core::array::from_fn(|_| AtomicU64::new(0)),
            }),
        }
    }

    /// Install the handler for `irq`, replacing any previous one.
    pub fn register<F>(&self, irq: SoftIrq, handler: F)
    where
        F: Fn(SoftIrq) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(irq.line(), Arc::new(handler));
    }

    /// Returns true if `irq` was raised and not yet cleared.
    #[must_use]
    pub fn is_pending(&self, irq: SoftIrq) -> bool {
        self.inner.pending.load(Ordering::SeqCst) & irq.mask() != 0
    }

    /// How many times `irq` has been raised.
    #[must_use]
    pub fn raise_count(&self, irq: SoftIrq) -> u64 {
        self.inner.raised[irq.line() as usize].load(Ordering::SeqCst)
    }
}

impl Doorbell for SoftIrqBus {
    fn raise(&self, irq: SoftIrq) {
        self.inner.pending.fetch_or(irq.mask(), Ordering::SeqCst);
        self.inner.raised[irq.line() as usize].fetch_add(1, Ordering::SeqCst);
        let handler = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&irq.line())
            .cloned();
        if let Some(handler) = handler {
            handler(irq);
        }
    }

    fn clear(&self, irq: SoftIrq) {
        self.inner.pending.fetch_and(!irq.mask(), Ordering::SeqCst);
    }
}

// =============================================================================
// IRQ Control and MMIO
// =============================================================================

/// Interrupt control that only counts nesting.
#[derive(Debug, Default)]
pub struct MockIrqControl {
    irq_depth: AtomicU32,
    preempt_depth: AtomicU32,
    saves: AtomicU64,
}

impl MockIrqControl {
    /// Create an instance with interrupts and preemption enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current interrupt-disable nesting.
    #[must_use]
    pub fn irq_depth(&self) -> u32 {
        self.irq_depth.load(Ordering::SeqCst)
    }

    /// Current preempt-disable nesting.
    #[must_use]
    pub fn preempt_depth(&self) -> u32 {
        self.preempt_depth.load(Ordering::SeqCst)
    }

    /// Total number of `save_and_disable` calls.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl IrqControl for MockIrqControl {
    fn save_and_disable(&self) -> IrqFlags {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let previous = self.irq_depth.fetch_add(1, Ordering::SeqCst);
        IrqFlags(u64::from(previous))
    }

    fn restore(&self, _flags: IrqFlags) {
        let _ = self
            .irq_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                Some(depth.saturating_sub(1))
            });
    }

    fn preempt_disable(&self) {
        self.preempt_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn preempt_enable(&self) {
        let _ = self
            .preempt_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                Some(depth.saturating_sub(1))
            });
    }
}

/// Register file that records every write.
#[derive(Debug, Default)]
pub struct MockMmio {
    regs: Mutex<HashMap<u64, u32>>,
    writes: Mutex<Vec<(u64, u32)>>,
}

impl MockMmio {
    /// Create an empty register file (all registers read as zero).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register value.
    pub fn set(&self, addr: u64, value: u32) {
        self.regs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(addr, value);
    }

    /// Every `(address, value)` written so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(u64, u32)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Mmio for MockMmio {
    fn read32(&self, addr: u64) -> u32 {
        self.regs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&addr)
            .copied()
            .unwrap_or(0)
    }

    fn write32(&self, addr: u64, value: u32) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((addr, value));
        self.set(addr, value);
    }
}

/// The in-process platform used by tests and the simulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPlatform;

impl Platform for MockPlatform {
    type Memory = CoreCache;
    type Doorbell = SoftIrqBus;
    type Irq = MockIrqControl;
}
