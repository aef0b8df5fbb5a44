// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use rewind_core::error::StoreError;
use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Invalid magic bytes in header")]
    InvalidMagic,
    #[error("Unsupported record version {0}")]
    UnsupportedVersion(u32),
    #[error("Checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        expected: u64,
        found: u64,
    },
    #[error("Flash image is {found} bytes, layout needs {expected}")]
    ImageSize {
        expected: u64,
        found: u64,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl From<StoreError> for PersistenceError {
    fn from(e: StoreError) -> Self {
        PersistenceError::Store(e)
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
