// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use core::fmt;

/// Negative status code returned by the kernel checkpoint capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus(pub i32);

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device status {}", self.0)
    }
}

/// Snapshot store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// A non-volatile mirror is not erased; the flash page was already used.
    AlreadyUsed,
    /// Lower-level copy or programming failure.
    Io,
    /// Region index out of range.
    NoSuchRegion,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyUsed => f.write_str("snapshot section already used"),
            StoreError::Io => f.write_str("flash copy failed"),
            StoreError::NoSuchRegion => f.write_str("no such memory region"),
        }
    }
}

/// Rollback session failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The checkpoint device could not be opened.
    DeviceUnavailable(DeviceStatus),
    /// Operation issued in a state that does not allow it.
    NotReady,
    /// Rollback requested before any checkpoint exists.
    NoCheckpoint,
    /// Disarm requested with no armed timer.
    NoActiveTimer,
    /// Timer duration must be at least one second.
    InvalidDuration,
    /// The device rejected the request.
    Io(DeviceStatus),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DeviceUnavailable(s) => write!(f, "checkpoint device unavailable ({})", s),
            SessionError::NotReady => f.write_str("session not ready for this operation"),
            SessionError::NoCheckpoint => f.write_str("no checkpoint has been created"),
            SessionError::NoActiveTimer => f.write_str("no rollback timer is armed"),
            SessionError::InvalidDuration => f.write_str("timer duration must be at least one second"),
            SessionError::Io(s) => write!(f, "checkpoint request failed ({})", s),
        }
    }
}

/// Message bus failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Nobody is listening on the topic.
    NoSubscribers,
    /// The topic has been torn down.
    Closed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::NoSubscribers => f.write_str("topic has no subscribers"),
            BusError::Closed => f.write_str("topic closed"),
        }
    }
}

/// Failure of a [`crate::strategy::RecoveryStrategy`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryError {
    Store(StoreError),
    Session(SessionError),
    /// Companion handshake has not completed; restoring now would desync arming state.
    NotSafe,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryError::Store(e) => write!(f, "{}", e),
            RecoveryError::Session(e) => write!(f, "{}", e),
            RecoveryError::NotSafe => f.write_str("companion handshake incomplete, restore refused"),
        }
    }
}

impl From<StoreError> for RecoveryError {
    fn from(e: StoreError) -> Self {
        RecoveryError::Store(e)
    }
}

impl From<SessionError> for RecoveryError {
    fn from(e: SessionError) -> Self {
        RecoveryError::Session(e)
    }
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;
pub type SessionResult<T> = core::result::Result<T, SessionError>;

#[cfg(feature = "std")]
impl std::error::Error for StoreError {}
#[cfg(feature = "std")]
impl std::error::Error for SessionError {}
#[cfg(feature = "std")]
impl std::error::Error for BusError {}
#[cfg(feature = "std")]
impl std::error::Error for RecoveryError {}
