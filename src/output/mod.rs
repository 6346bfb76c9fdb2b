//! Brightness output abstraction.
//!
//! Outputs accept a brightness percentage and remember the value
//! currently shown, which the step limiter uses as its starting point. Each
//! implementation converts the percentage into its device-native range.
//!
//! ## Supported Outputs
//!
//! - **File**: writes the scaled value to a text file (simulation, bench rigs)
//! - **Backlight**: Linux sysfs `/sys/class/backlight/<device>` directory

use anyhow::Result;
use thiserror::Error;

use crate::config::{OutputConfig, OutputType};
use crate::constants::*;

pub mod backlight;
pub mod file;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value '{value}' in {path}")]
    InvalidValue { path: String, value: String },
}

/// A device whose brightness the control loop drives.
#[cfg_attr(test, mockall::automock)]
pub trait BrightnessOutput {
    /// Apply `percent` (clamped to 0..=100).
    fn set_brightness(&mut self, percent: u8) -> Result<(), OutputError>;

    /// The brightness currently shown, in percent.
    fn current_brightness(&self) -> u8;

    /// Short name used in logs.
    fn output_name(&self) -> &'static str;
}

/// Scale a percentage into `[low, high]`, rounding to nearest.
pub fn percent_to_native(percent: u8, low: u32, high: u32) -> u32 {
    let percent = u64::from(percent.min(MAXIMUM_BRIGHTNESS));
    let span = u64::from(high.saturating_sub(low));
    low + ((percent * span + 50) / 100) as u32
}

/// Inverse of [`percent_to_native`], clamped to 0..=100.
pub fn native_to_percent(value: u32, low: u32, high: u32) -> u8 {
    let span = u64::from(high.saturating_sub(low));
    if span == 0 {
        return MINIMUM_BRIGHTNESS;
    }
    let offset = u64::from(value.clamp(low, high) - low);
    ((offset * 100 + span / 2) / span).min(u64::from(MAXIMUM_BRIGHTNESS)) as u8
}

/// Build the output described by the `[output]` config section.
pub fn create_output(config: &OutputConfig) -> Result<Box<dyn BrightnessOutput>> {
    match config.kind.unwrap_or_default() {
        OutputType::File => {
            let path = config.path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH);
            let [low, high] = config.value_range.unwrap_or(DEFAULT_OUTPUT_VALUE_RANGE);
            Ok(Box::new(file::FileOutput::open(path, low, high)?) as Box<dyn BrightnessOutput>)
        }
        OutputType::Backlight => {
            let path = config.path.as_deref().unwrap_or(DEFAULT_BACKLIGHT_PATH);
            Ok(Box::new(backlight::BacklightOutput::open(path)?) as Box<dyn BrightnessOutput>)
        }
    }
}
