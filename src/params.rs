// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Read-only parameter store seam.

pub trait ParamSource {
    fn get_i32(&self, key: &str) -> Option<i32>;

    fn get_f32(&self, key: &str) -> Option<f32> {
        self.get_i32(key).map(|v| v as f32)
    }
}

impl<P: ParamSource + ?Sized> ParamSource for &P {
    fn get_i32(&self, key: &str) -> Option<i32> {
        (**self).get_i32(key)
    }

    fn get_f32(&self, key: &str) -> Option<f32> {
        (**self).get_f32(key)
    }
}

/// Reads a MAVLink id parameter, falling back to `default` when missing or
/// out of the `u8` range.
pub fn get_id<P: ParamSource + ?Sized>(params: &P, key: &str, default: u8) -> u8 {
    params
        .get_i32(key)
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(default)
}
