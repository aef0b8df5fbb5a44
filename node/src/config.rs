// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::NodeError;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "REWIND_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Flash,
    Kernel,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Flash => "flash",
            StrategyKind::Kernel => "kernel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSourceKind {
    Rc,
    Manual,
}

/// Byte sizes of the two mirrored regions.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RegionSizes {
    pub sram: usize,
    pub ccm: usize,
}

impl Default for RegionSizes {
    fn default() -> Self {
        Self {
            sram: 0x30000,
            ccm: 0x8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub cycle_hz: u32,
    /// Control cycles before triggers are sampled.
    pub boot_cycles: u64,
    pub strategy: StrategyKind,
    pub trigger_source: TriggerSourceKind,
    pub device_path: PathBuf,
    /// Use the in-process checkpoint device instead of `device_path`.
    pub simulate_device: bool,
    /// Rollback signal is `SIGRTMIN + rollback_signal_offset`.
    pub rollback_signal_offset: i32,
    pub flash_image_path: PathBuf,
    pub record_path: Option<PathBuf>,
    pub region_sizes: RegionSizes,
    pub params: BTreeMap<String, i32>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cycle_hz: 50,
            boot_cycles: 50,
            strategy: StrategyKind::Kernel,
            trigger_source: TriggerSourceKind::Rc,
            device_path: PathBuf::from("/dev/checkpoint"),
            simulate_device: true,
            rollback_signal_offset: rewind_core::config::DEFAULT_ROLLBACK_SIGNAL_OFFSET,
            flash_image_path: PathBuf::from("rewind-flash.img"),
            record_path: Some(PathBuf::from("rewind.rec")),
            region_sizes: RegionSizes::default(),
            params: BTreeMap::new(),
        }
    }
}

impl NodeConfig {
    /// Reads the file named by [`CONFIG_ENV`], or defaults when unset.
    pub fn load() -> Result<Self, NodeError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: PathBuf) -> Result<Self, NodeError> {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))?;
        let cfg: Self = serde_json::from_str(&raw)
            .map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.cycle_hz == 0 || self.cycle_hz > 1000 {
            return Err(NodeError::Config(format!("cycle_hz {} out of range 1..=1000", self.cycle_hz)));
        }
        if self.region_sizes.sram < crate::controller::FlightImage::SIZE {
            return Err(NodeError::Config(format!(
                "sram region must hold at least {} bytes",
                crate::controller::FlightImage::SIZE
            )));
        }
        Ok(())
    }
}
