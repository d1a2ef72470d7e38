// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Typed access to the PPM with the cache maintenance built in.
//!
//! Every `acquire_*` invalidates before reading and every `publish_*` cleans
//! after writing, so no call site can forget either half of the pairing.
//! Multi-byte values are little-endian, matching the peer.

use ambalink_abi::Paddr;

use crate::platform::SharedMemory;

/// Errors from shared region setup and address translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedRegionError {
    /// Access outside the mapping.
    OutOfBounds {
        /// Start offset of the access.
        offset: u64,
        /// Length of the access.
        len: u64,
    },
    /// The mapping is smaller than the layout needs.
    TooSmall {
        /// Bytes the layout needs.
        required: u64,
        /// Bytes actually mapped.
        actual: u64,
    },
    /// A physical address handed over by the peer is outside the PPM.
    NotShared(Paddr),
    /// No NUL terminator before the end of the mapping.
    Unterminated(u64),
}

impl core::fmt::Display for SharedRegionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds { offset, len } => {
                write!(f, "access of {len} bytes at offset {offset:#x} is out of bounds")
            }
            Self::TooSmall { required, actual } => {
                write!(f, "shared region too small: {actual:#x} < {required:#x}")
            }
            Self::NotShared(paddr) => write!(f, "address {paddr} is not in shared memory"),
            Self::Unterminated(offset) => {
                write!(f, "unterminated string at offset {offset:#x}")
            }
        }
    }
}

impl core::error::Error for SharedRegionError {}

/// The PPM mapping of one core, with its physical base address.
pub struct SharedRegion<M: SharedMemory> {
    mem: M,
    base: Paddr,
}

impl<M: SharedMemory> SharedRegion<M> {
    /// Wraps a mapping whose first byte is at physical address `base`.
    pub const fn new(mem: M, base: Paddr) -> Self {
        Self { mem, base }
    }

    /// Physical base address.
    #[inline]
    pub const fn base(&self) -> Paddr {
        self.base
    }

    /// Size of the mapping in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.mem.len()
    }

    /// Returns true if nothing is mapped.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// The underlying mapping.
    #[inline]
    pub const fn memory(&self) -> &M {
        &self.mem
    }

    /// Checks that `offset..offset + len` lies inside the mapping.
    pub fn check(&self, offset: u64, len: u64) -> Result<(), SharedRegionError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.mem.len() => Ok(()),
            _ => Err(SharedRegionError::OutOfBounds { offset, len }),
        }
    }

    /// Checks that the mapping holds at least `required` bytes.
    pub fn require(&self, required: u64) -> Result<(), SharedRegionError> {
        let actual = self.mem.len();
        if actual < required {
            return Err(SharedRegionError::TooSmall { required, actual });
        }
        Ok(())
    }

    // =========================================================================
    // Address Translation
    // =========================================================================

    /// Peer-visible physical address of `offset`.
    #[inline]
    pub const fn paddr_of(&self, offset: u64) -> Paddr {
        self.base.add(offset)
    }

    /// Offset of a physical address, or `None` if it is outside the mapping.
    pub fn offset_of(&self, paddr: Paddr) -> Option<u64> {
        if paddr < self.base {
            return None;
        }
        let offset = paddr.diff(self.base);
        (offset < self.mem.len()).then_some(offset)
    }

    /// Offset of a peer-supplied range starting at `paddr`.
    pub fn resolve(&self, paddr: Paddr, len: u64) -> Result<u64, SharedRegionError> {
        let offset = self
            .offset_of(paddr)
            .ok_or(SharedRegionError::NotShared(paddr))?;
        self.check(offset, len)?;
        Ok(offset)
    }

    // =========================================================================
    // Cache Maintenance
    // =========================================================================

    /// Discard this core's cached copy of a range.
    pub fn invalidate(&self, offset: u64, len: u64) {
        self.assert_in_bounds(offset, len);
        self.mem.invalidate(offset, len);
    }

    /// Push this core's dirty cached copy of a range to memory.
    pub fn clean(&self, offset: u64, len: u64) {
        self.assert_in_bounds(offset, len);
        self.mem.clean(offset, len);
    }

    /// Read through the cache without invalidating first.
    ///
    /// Only valid right after an [`invalidate`](Self::invalidate) that
    /// covers the range.
    pub fn read_cached(&self, offset: u64, buf: &mut [u8]) {
        self.assert_in_bounds(offset, buf.len() as u64);
        self.mem.read(offset, buf);
    }

    /// Write into the cache without cleaning.
    pub fn write_cached(&self, offset: u64, data: &[u8]) {
        self.assert_in_bounds(offset, data.len() as u64);
        self.mem.write(offset, data);
    }

    // =========================================================================
    // Acquire (invalidate, then read)
    // =========================================================================

    /// Read bytes the peer may have written.
    pub fn acquire_bytes(&self, offset: u64, buf: &mut [u8]) {
        let len = buf.len() as u64;
        self.assert_in_bounds(offset, len);
        self.mem.invalidate(offset, len);
        self.mem.read(offset, buf);
    }

    /// Read a byte the peer may have written.
    pub fn acquire_u8(&self, offset: u64) -> u8 {
        let mut raw = [0u8; 1];
        self.acquire_bytes(offset, &mut raw);
        raw[0]
    }

    /// Read a word the peer may have written.
    pub fn acquire_u32(&self, offset: u64) -> u32 {
        let mut raw = [0u8; 4];
        self.acquire_bytes(offset, &mut raw);
        u32::from_le_bytes(raw)
    }

    /// Read a double word the peer may have written.
    pub fn acquire_u64(&self, offset: u64) -> u64 {
        let mut raw = [0u8; 8];
        self.acquire_bytes(offset, &mut raw);
        u64::from_le_bytes(raw)
    }

    /// Read a NUL-terminated string written by the peer.
    ///
    /// Invalidates one cache line at a time until the terminator is found.
    pub fn acquire_c_str(&self, offset: u64) -> Result<Vec<u8>, SharedRegionError> {
        const CHUNK: u64 = 32;
        self.check(offset, 0)?;
        let mut out = Vec::new();
        let mut cursor = offset;
        while cursor < self.mem.len() {
            let chunk_len = (CHUNK - cursor % CHUNK).min(self.mem.len() - cursor);
            let mut chunk = vec![0u8; chunk_len as usize];
            self.acquire_bytes(cursor, &mut chunk);
            if let Some(end) = chunk.iter().position(|&b| b == 0) {
                out.extend_from_slice(&chunk[..end]);
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
            cursor += chunk_len;
        }
        Err(SharedRegionError::Unterminated(offset))
    }

    // =========================================================================
    // Publish (write, then clean)
    // =========================================================================

    /// Write bytes and make them visible to the peer.
    pub fn publish_bytes(&self, offset: u64, data: &[u8]) {
        let len = data.len() as u64;
        self.assert_in_bounds(offset, len);
        self.mem.write(offset, data);
        self.mem.clean(offset, len);
    }

    /// Write a byte and make it visible to the peer.
    pub fn publish_u8(&self, offset: u64, value: u8) {
        self.publish_bytes(offset, &[value]);
    }

    /// Write a word and make it visible to the peer.
    pub fn publish_u32(&self, offset: u64, value: u32) {
        self.publish_bytes(offset, &value.to_le_bytes());
    }

    /// Write a double word and make it visible to the peer.
    pub fn publish_u64(&self, offset: u64, value: u64) {
        self.publish_bytes(offset, &value.to_le_bytes());
    }

    /// Zero a range and make it visible to the peer.
    pub fn publish_zero(&self, offset: u64, len: u64) {
        self.publish_bytes(offset, &vec![0u8; len as usize]);
    }

    // =========================================================================
    // Atomic Words
    // =========================================================================

    /// Atomically exchange a word in memory.
    pub fn swap_u32(&self, offset: u64, value: u32) -> u32 {
        self.assert_in_bounds(offset, 4);
        self.mem.swap_u32(offset, value)
    }

    /// Store a word directly to memory.
    pub fn store_u32(&self, offset: u64, value: u32) {
        self.assert_in_bounds(offset, 4);
        self.mem.store_u32(offset, value);
    }

    /// Full memory barrier.
    pub fn barrier(&self) {
        self.mem.barrier();
    }

    #[expect(
        clippy::panic,
        reason = "offsets are derived from the validated layout, a miss is a bug"
    )]
    fn assert_in_bounds(&self, offset: u64, len: u64) {
        if let Err(err) = self.check(offset, len) {
            panic!("shared region: {err}");
        }
    }
}

impl<M: SharedMemory> core::fmt::Debug for SharedRegion<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("base", &self.base)
            .field("len", &self.mem.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::platform::MockPpm;

    fn pair() -> (MockPpm, SharedRegion<crate::platform::CoreCache>, SharedRegion<crate::platform::CoreCache>) {
        let ppm = MockPpm::new(0x1000);
        let linux = SharedRegion::new(ppm.core_view(), Paddr::new(0x2000_0000));
        let rtos = SharedRegion::new(ppm.core_view(), Paddr::new(0x2000_0000));
        (ppm, linux, rtos)
    }

    #[test]
    fn publish_then_acquire_crosses_cores() {
        let (_ppm, linux, rtos) = pair();
        assert_eq!(rtos.acquire_u32(0x100), 0);
        linux.publish_u32(0x100, 0xCAFE_F00D);
        assert_eq!(rtos.acquire_u32(0x100), 0xCAFE_F00D);
        linux.publish_u64(0x108, u64::MAX - 1);
        assert_eq!(rtos.acquire_u64(0x108), u64::MAX - 1);
    }

    #[test]
    fn cached_write_is_private_until_clean() {
        let (ppm, linux, _rtos) = pair();
        linux.write_cached(0x40, &[9]);
        assert_eq!(ppm.peek_u32(0x40), 0);
        linux.clean(0x40, 1);
        assert_eq!(ppm.peek_u32(0x40), 9);
    }

    #[test]
    fn address_translation() {
        let (_ppm, linux, _rtos) = pair();
        assert_eq!(linux.paddr_of(0x20), Paddr::new(0x2000_0020));
        assert_eq!(linux.offset_of(Paddr::new(0x2000_0FFF)), Some(0xFFF));
        assert_eq!(linux.offset_of(Paddr::new(0x2000_1000)), None);
        assert_eq!(linux.offset_of(Paddr::new(0x1FFF_FFFF)), None);
        assert_eq!(
            linux.resolve(Paddr::new(0x2000_0FF0), 32),
            Err(SharedRegionError::OutOfBounds {
                offset: 0xFF0,
                len: 32
            })
        );
        assert!(matches!(
            linux.resolve(Paddr::new(0x10), 1),
            Err(SharedRegionError::NotShared(_))
        ));
    }

    #[test]
    fn c_string_spanning_lines() {
        let (_ppm, linux, rtos) = pair();
        let text = b"12, 13 0x20,abc,7\0";
        rtos.publish_bytes(0x1E, text);
        assert_eq!(linux.acquire_c_str(0x1E).unwrap(), &text[..text.len() - 1]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_ppm, linux, rtos) = pair();
        rtos.publish_bytes(0xFF0, &[b'x'; 16]);
        assert_eq!(
            linux.acquire_c_str(0xFF0),
            Err(SharedRegionError::Unterminated(0xFF0))
        );
    }

    #[test]
    fn too_small_region() {
        let (_ppm, linux, _rtos) = pair();
        assert!(linux.require(0x1000).is_ok());
        assert_eq!(
            linux.require(0x2000),
            Err(SharedRegionError::TooSmall {
                required: 0x2000,
                actual: 0x1000
            })
        );
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_bounds_publish_panics() {
        let (_ppm, linux, _rtos) = pair();
        linux.publish_u32(0xFFE, 1);
    }
}
