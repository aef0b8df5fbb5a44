// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Memory-mapped recovery record.
//!
//! ```text
//! | magic "RWND" | version u32 | crc64 u64 | RecoveryRecord (28 bytes) |
//! ```
//! All integers little-endian. A file of zeroes is a fresh record.

use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use crc64fast::Digest;
use memmap2::MmapMut;
use rewind_core::state::RecoveryRecord;

use crate::error::{PersistenceError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub checksum: u64,
}

impl RecordHeader {
    pub const SIZE: usize = 4 + 4 + 8; // 16 bytes
    pub const MAGIC: [u8; 4] = *b"RWND";
    pub const VERSION: u32 = 1;

    pub fn for_body(body: &[u8]) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            checksum: checksum(body),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != Self::MAGIC {
            return Err(PersistenceError::InvalidMagic);
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != Self::VERSION {
            return Err(PersistenceError::UnsupportedVersion(version));
        }
        let checksum = reader.read_u64::<LittleEndian>()?;

        Ok(Self { magic, version, checksum })
    }
}

fn checksum(body: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(body);
    digest.sum64()
}

fn decode(bytes: &[u8]) -> Result<Option<RecoveryRecord>> {
    if bytes.iter().all(|b| *b == 0) {
        return Ok(None);
    }

    let header = RecordHeader::read_from(&bytes[..RecordHeader::SIZE])?;
    let body = &bytes[RecordHeader::SIZE..];
    let found = checksum(body);
    if found != header.checksum {
        return Err(PersistenceError::ChecksumMismatch {
            expected: header.checksum,
            found,
        });
    }

    RecoveryRecord::from_bytes(body)
        .map(Some)
        .ok_or_else(|| PersistenceError::InvalidFormat("short record body".to_string()))
}

/// Fixed-size record file kept mapped for the life of the process.
pub struct RecordFile {
    path: PathBuf,
    map: MmapMut,
}

impl RecordFile {
    pub const SIZE: usize = RecordHeader::SIZE + RecoveryRecord::SIZE;

    /// Opens (creating if needed) the record at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if file.metadata()?.len() != Self::SIZE as u64 {
            file.set_len(Self::SIZE as u64)?;
        }
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` for a record that has never been written.
    pub fn load(&self) -> Result<Option<RecoveryRecord>> {
        decode(&self.map)
    }

    /// Reads the record at `path` without mapping or resizing it.
    pub fn read(path: impl AsRef<Path>) -> Result<Option<RecoveryRecord>> {
        let bytes = std::fs::read(path.as_ref())?;
        if bytes.len() != Self::SIZE {
            return Err(PersistenceError::InvalidFormat(format!(
                "record is {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }
        decode(&bytes)
    }

    /// Writes `record` and flushes it to the backing file.
    pub fn store(&mut self, record: &RecoveryRecord) -> Result<()> {
        let body = record.to_bytes();
        let header = RecordHeader::for_body(&body);
        self.map[..RecordHeader::SIZE].copy_from_slice(&header.to_bytes());
        self.map[RecordHeader::SIZE..].copy_from_slice(&body);
        self.map.flush()?;
        Ok(())
    }
}
