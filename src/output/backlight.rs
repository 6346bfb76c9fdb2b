//! Linux sysfs backlight output.
//!
//! Drives `/sys/class/backlight/<device>/brightness`, scaled by the device's
//! `max_brightness`. The device level is read once on open; afterwards the
//! last applied percentage is reported, since the native register is often too
//! coarse to hold every step.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::logger::Log;
use crate::output::{BrightnessOutput, OutputError, native_to_percent, percent_to_native};

pub struct BacklightOutput {
    brightness_path: PathBuf,
    max_brightness: u32,
    last_applied: u8,
}

fn read_u32(path: &Path) -> Result<u32, OutputError> {
    let content = fs::read_to_string(path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let value = content.trim();
    value.parse::<u32>().map_err(|_| OutputError::InvalidValue {
        path: path.display().to_string(),
        value: value.to_string(),
    })
}

impl BacklightOutput {
    /// Open a backlight device directory.
    pub fn open(device_dir: impl AsRef<Path>) -> Result<Self, OutputError> {
        let device_dir = device_dir.as_ref();
        let max_path = device_dir.join("max_brightness");
        let max_brightness = read_u32(&max_path)?;
        if max_brightness == 0 {
            return Err(OutputError::InvalidValue {
                path: max_path.display().to_string(),
                value: "0".to_string(),
            });
        }

        let brightness_path = device_dir.join("brightness");
        let raw = read_u32(&brightness_path)?;
        let last_applied = native_to_percent(raw, 0, max_brightness);

        Log::log_debug(&format!(
            "Backlight {} max_brightness={} current={}%",
            device_dir.display(),
            max_brightness,
            last_applied
        ));

        Ok(Self {
            brightness_path,
            max_brightness,
            last_applied,
        })
    }
}

impl BrightnessOutput for BacklightOutput {
    fn set_brightness(&mut self, percent: u8) -> Result<(), OutputError> {
        let percent = percent.min(MAXIMUM_BRIGHTNESS);
        let value = percent_to_native(percent, 0, self.max_brightness);
        fs::write(&self.brightness_path, value.to_string()).map_err(|source| OutputError::Io {
            path: self.brightness_path.display().to_string(),
            source,
        })?;
        self.last_applied = percent;
        Ok(())
    }

    fn current_brightness(&self) -> u8 {
        self.last_applied
    }

    fn output_name(&self) -> &'static str {
        "backlight"
    }
}
