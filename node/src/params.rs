// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::BTreeMap;

use rewind_core::config::{
    DEFAULT_COMP_ID, DEFAULT_SYS_ID, MIN_ROLLBACK_PERIOD_US, PARAM_COMP_ID, PARAM_PWM_DISARMED, PARAM_PWM_MAX,
    PARAM_PWM_MIN, PARAM_REBOOT_PERIOD, PARAM_SYS_ID,
};
use rewind_core::params::ParamSource;

/// Parameter table: built-in defaults overlaid with the config. Only keys
/// with a default can be changed at runtime.
#[derive(Debug, Clone)]
pub struct ParamTable {
    values: BTreeMap<String, i32>,
}

impl ParamTable {
    pub fn new(overrides: &BTreeMap<String, i32>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(PARAM_SYS_ID.to_string(), i32::from(DEFAULT_SYS_ID));
        values.insert(PARAM_COMP_ID.to_string(), i32::from(DEFAULT_COMP_ID));
        values.insert(PARAM_REBOOT_PERIOD.to_string(), MIN_ROLLBACK_PERIOD_US as i32);
        values.insert(PARAM_PWM_DISARMED.to_string(), 900);
        values.insert(PARAM_PWM_MIN.to_string(), 1000);
        values.insert(PARAM_PWM_MAX.to_string(), 2000);
        for (k, v) in overrides {
            values.insert(k.clone(), *v);
        }
        Self { values }
    }

    /// Updates a known parameter, returning its previous value.
    pub fn set(&mut self, key: &str, value: i32) -> Option<i32> {
        let slot = self.values.get_mut(key)?;
        Some(std::mem::replace(slot, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl ParamSource for ParamTable {
    fn get_i32(&self, key: &str) -> Option<i32> {
        self.values.get(key).copied()
    }
}
