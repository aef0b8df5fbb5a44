// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Memory regions and the providers that copy them to and from their
//! non-volatile mirrors.

use alloc::vec;
use alloc::vec::Vec;

use byteorder::{ByteOrder, NativeEndian};

use crate::config::ERASED_WORD;
use crate::error::{StoreError, StoreResult};

/// Copy granularity for restores.
pub const WORD: usize = 4;

/// A contiguous range of volatile memory and the address of its mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: &'static str,
    pub base: usize,
    pub len: usize,
    pub mirror: usize,
}

/// Main SRAM on an STM32F4, mirrored into flash sectors 17-18.
pub const STM32F4_SRAM: MemoryRegion = MemoryRegion {
    name: "sram",
    base: 0x2000_0000,
    len: 0x30000,
    mirror: 0x0812_0000,
};

/// Core-coupled RAM on an STM32F4, mirrored into flash sector 19.
pub const STM32F4_CCM: MemoryRegion = MemoryRegion {
    name: "ccm",
    base: 0x1000_0000,
    len: 0x8000,
    mirror: 0x0816_0000,
};

/// Saves and restores a fixed, ordered set of regions.
pub trait RegionProvider {
    fn regions(&self) -> &[MemoryRegion];

    /// Whether the mirror of region `index` can accept a save.
    fn is_erased(&self, index: usize) -> bool;

    /// Copies region `index` into its mirror, returning bytes written.
    fn write_mirror(&mut self, index: usize) -> StoreResult<usize>;

    /// Copies the mirror of region `index` back into live memory, one
    /// 32-bit word at a time.
    fn read_mirror(&mut self, index: usize);
}

/// Erased-state check used by every provider: every word of the mirror
/// still reads as erased flash.
pub fn mirror_is_erased(bytes: &[u8]) -> bool {
    bytes.len() >= WORD && bytes.chunks(WORD).all(|w| w.len() == WORD && NativeEndian::read_u32(w) == ERASED_WORD)
}

fn round_to_word(len: usize) -> usize {
    (len + WORD - 1) & !(WORD - 1)
}

// -----------------------------------------------------------------------
// Heap-backed provider
// -----------------------------------------------------------------------

/// Keeps live regions and mirrors in heap buffers. Deterministic, needs no
/// hardware; the mirror starts erased.
pub struct MemoryCopyProvider {
    regions: Vec<MemoryRegion>,
    live: Vec<Vec<u8>>,
    mirrors: Vec<Vec<u8>>,
}

impl MemoryCopyProvider {
    /// Region lengths are rounded up to whole words.
    pub fn new(layout: &[(&'static str, usize)]) -> Self {
        let live: Vec<Vec<u8>> = layout.iter().map(|(_, len)| vec![0u8; round_to_word(*len)]).collect();
        let mirrors: Vec<Vec<u8>> = layout.iter().map(|(_, len)| vec![0xFFu8; round_to_word(*len)]).collect();

        let regions = layout
            .iter()
            .zip(live.iter().zip(mirrors.iter()))
            .map(|((name, _), (l, m))| MemoryRegion {
                name: *name,
                base: l.as_ptr() as usize,
                len: l.len(),
                mirror: m.as_ptr() as usize,
            })
            .collect();

        Self { regions, live, mirrors }
    }

    pub fn live(&self, index: usize) -> &[u8] {
        &self.live[index]
    }

    pub fn live_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.live[index]
    }

    pub fn mirror(&self, index: usize) -> &[u8] {
        &self.mirrors[index]
    }

    /// External erase of every mirror.
    pub fn erase(&mut self) {
        for m in self.mirrors.iter_mut() {
            m.fill(0xFF);
        }
    }
}

impl RegionProvider for MemoryCopyProvider {
    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_erased(&self, index: usize) -> bool {
        self.mirrors.get(index).map_or(false, |m| mirror_is_erased(m))
    }

    fn write_mirror(&mut self, index: usize) -> StoreResult<usize> {
        let (live, mirror) = match (self.live.get(index), self.mirrors.get_mut(index)) {
            (Some(l), Some(m)) => (l, m),
            _ => return Err(StoreError::NoSuchRegion),
        };
        mirror.copy_from_slice(live);
        Ok(live.len())
    }

    fn read_mirror(&mut self, index: usize) {
        let (live, mirror) = match (self.live.get_mut(index), self.mirrors.get(index)) {
            (Some(l), Some(m)) => (l, m),
            _ => return,
        };
        for (dst, src) in live.chunks_exact_mut(WORD).zip(mirror.chunks_exact(WORD)) {
            NativeEndian::write_u32(dst, NativeEndian::read_u32(src));
        }
    }
}

// -----------------------------------------------------------------------
// Fixed-address provider
// -----------------------------------------------------------------------

/// Platform flash write primitive (the board's `progmem` routine).
pub trait FlashProgrammer {
    /// Programs `data` at flash address `address`; returns bytes written.
    fn program(&mut self, address: usize, data: &[u8]) -> StoreResult<usize>;
}

/// Operates on physical addresses. Flash is read as memory and written
/// through a [`FlashProgrammer`].
pub struct RawRegionProvider<F, const N: usize> {
    regions: [MemoryRegion; N],
    programmer: F,
}

impl<F: FlashProgrammer, const N: usize> RawRegionProvider<F, N> {
    /// # Safety
    /// Every region's `base..base+len` must be valid, word-aligned RAM and
    /// `mirror..mirror+len` readable memory that `programmer` can write.
    /// Nothing else may access those ranges during save or restore.
    pub const unsafe fn new(regions: [MemoryRegion; N], programmer: F) -> Self {
        Self { regions, programmer }
    }

    pub fn programmer(&self) -> &F {
        &self.programmer
    }
}

impl<F: FlashProgrammer, const N: usize> RegionProvider for RawRegionProvider<F, N> {
    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_erased(&self, index: usize) -> bool {
        let region = match self.regions.get(index) {
            Some(r) => *r,
            None => return false,
        };
        let mut offset = 0;
        while offset + WORD <= region.len {
            let word = unsafe { core::ptr::read_volatile((region.mirror + offset) as *const u32) };
            if word != ERASED_WORD {
                return false;
            }
            offset += WORD;
        }
        region.len >= WORD
    }

    fn write_mirror(&mut self, index: usize) -> StoreResult<usize> {
        let region = *self.regions.get(index).ok_or(StoreError::NoSuchRegion)?;
        let live = unsafe { core::slice::from_raw_parts(region.base as *const u8, region.len) };
        self.programmer.program(region.mirror, live)
    }

    fn read_mirror(&mut self, index: usize) {
        let region = match self.regions.get(index) {
            Some(r) => *r,
            None => return,
        };
        let mut offset = 0;
        while offset + WORD <= region.len {
            unsafe {
                let word = core::ptr::read_volatile((region.mirror + offset) as *const u32);
                core::ptr::write_volatile((region.base + offset) as *mut u32, word);
            }
            offset += WORD;
        }
    }
}
