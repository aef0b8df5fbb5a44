// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! File-backed flash image for boards where the mirror sectors are exposed
//! as a file (an MTD partition or a plain image on the host).
//!
//! The image behaves like NOR flash: erased bytes read `0xFF` and
//! programming can only clear bits. Region mirrors are laid out back to
//! back in layout order, so a region's `mirror` is its offset in the file.

use std::fs::OpenOptions;
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};
use memmap2::MmapMut;
use rewind_core::error::{StoreError, StoreResult};
use rewind_core::region::{mirror_is_erased, MemoryRegion, RegionProvider, WORD};

use crate::error::{PersistenceError, Result};

const ERASED: u8 = 0xFF;

pub struct FlashImageProvider {
    regions: Vec<MemoryRegion>,
    live: Vec<Vec<u8>>,
    image: MmapMut,
}

impl FlashImageProvider {
    /// Opens the image at `path`, creating an erased one if the file is new.
    /// An existing image must match the layout exactly.
    pub fn open(path: impl AsRef<Path>, layout: &[(&'static str, usize)]) -> Result<Self> {
        let lens: Vec<usize> = layout.iter().map(|(_, len)| round_to_word(*len)).collect();
        let total: usize = lens.iter().sum();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let found = file.metadata()?.len();
        let fresh = found == 0;
        if fresh {
            file.set_len(total as u64)?;
        } else if found != total as u64 {
            return Err(PersistenceError::ImageSize {
                expected: total as u64,
                found,
            });
        }

        let mut image = unsafe { MmapMut::map_mut(&file)? };
        if fresh {
            image.fill(ERASED);
            image.flush()?;
            tracing::info!(path = %path.as_ref().display(), bytes = total, "created erased flash image");
        }

        let live: Vec<Vec<u8>> = lens.iter().map(|len| vec![0u8; *len]).collect();
        let mut offset = 0;
        let regions = layout
            .iter()
            .zip(live.iter())
            .map(|((name, _), buf)| {
                let region = MemoryRegion {
                    name: *name,
                    base: buf.as_ptr() as usize,
                    len: buf.len(),
                    mirror: offset,
                };
                offset += buf.len();
                region
            })
            .collect();

        Ok(Self { regions, live, image })
    }

    pub fn live(&self, index: usize) -> &[u8] {
        &self.live[index]
    }

    pub fn live_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.live[index]
    }

    pub fn mirror(&self, index: usize) -> &[u8] {
        let r = &self.regions[index];
        &self.image[r.mirror..r.mirror + r.len]
    }

    /// Sector erase of the whole image.
    pub fn erase(&mut self) -> Result<()> {
        self.image.fill(ERASED);
        self.image.flush()?;
        tracing::info!(bytes = self.image.len(), "flash image erased");
        Ok(())
    }
}

/// Contents of one mirror, read straight from an image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorImage {
    pub name: &'static str,
    pub bytes: Vec<u8>,
}

impl MirrorImage {
    pub fn is_erased(&self) -> bool {
        mirror_is_erased(&self.bytes)
    }
}

/// Reads every mirror of the image at `path` without mapping it or creating
/// it. Sizes must match `layout` as in [`FlashImageProvider::open`].
pub fn read_mirrors(path: impl AsRef<Path>, layout: &[(&'static str, usize)]) -> Result<Vec<MirrorImage>> {
    let image = std::fs::read(path.as_ref())?;
    let total: usize = layout.iter().map(|(_, len)| round_to_word(*len)).sum();
    if image.len() != total {
        return Err(PersistenceError::ImageSize {
            expected: total as u64,
            found: image.len() as u64,
        });
    }

    let mut offset = 0;
    Ok(layout
        .iter()
        .map(|(name, len)| {
            let len = round_to_word(*len);
            let bytes = image[offset..offset + len].to_vec();
            offset += len;
            MirrorImage { name: *name, bytes }
        })
        .collect())
}

fn round_to_word(len: usize) -> usize {
    (len + WORD - 1) & !(WORD - 1)
}

impl RegionProvider for FlashImageProvider {
    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_erased(&self, index: usize) -> bool {
        match self.regions.get(index) {
            Some(_) => mirror_is_erased(self.mirror(index)),
            None => false,
        }
    }

    fn write_mirror(&mut self, index: usize) -> StoreResult<usize> {
        let region = *self.regions.get(index).ok_or(StoreError::NoSuchRegion)?;
        let dst = &mut self.image[region.mirror..region.mirror + region.len];
        for (d, s) in dst.iter_mut().zip(self.live[index].iter()) {
            *d &= *s;
        }
        self.image.flush_range(region.mirror, region.len).map_err(|e| {
            tracing::error!(region = region.name, error = %e, "flash image flush failed");
            StoreError::Io
        })?;
        Ok(region.len)
    }

    fn read_mirror(&mut self, index: usize) {
        let region = match self.regions.get(index) {
            Some(r) => *r,
            None => return,
        };
        let src = &self.image[region.mirror..region.mirror + region.len];
        for (dst, word) in self.live[index].chunks_exact_mut(WORD).zip(src.chunks_exact(WORD)) {
            NativeEndian::write_u32(dst, NativeEndian::read_u32(word));
        }
    }
}
