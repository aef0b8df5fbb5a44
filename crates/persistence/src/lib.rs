// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-disk state for Linux boards: the recovery record and the flash image
//! that backs the region mirrors.

pub mod error;
pub mod flash;
pub mod record;

pub use error::{PersistenceError, Result};
pub use flash::{read_mirrors, FlashImageProvider, MirrorImage};
pub use record::RecordFile;
