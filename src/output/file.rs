//! File-backed output for simulation and bench testing.

use std::fs;
use std::path::PathBuf;

use crate::constants::*;
use crate::logger::Log;
use crate::output::{BrightnessOutput, OutputError, native_to_percent, percent_to_native};

/// Writes the brightness, scaled into `[low, high]`, as one line of text.
pub struct FileOutput {
    path: PathBuf,
    low: u32,
    high: u32,
    current: u8,
}

impl FileOutput {
    /// Open the output, adopting the value already in the file if there is one.
    ///
    /// The file (and its parent directory) is created when missing so that a
    /// write failure surfaces at startup rather than on the first tick.
    pub fn open(path: impl Into<PathBuf>, low: u32, high: u32) -> Result<Self, OutputError> {
        let path = path.into();
        let io_error = |source| OutputError::Io {
            path: path.display().to_string(),
            source,
        };

        let existing = fs::read_to_string(&path)
            .ok()
            .and_then(|content| content.lines().next().map(|l| l.trim().to_string()))
            .and_then(|line| line.parse::<u32>().ok());

        let current = match existing {
            Some(value) => native_to_percent(value, low, high),
            None => MINIMUM_BRIGHTNESS,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let mut output = Self {
            path,
            low,
            high,
            current,
        };
        output.write(current)?;
        Log::log_debug(&format!(
            "File output {} starting at {}%",
            output.path.display(),
            current
        ));
        Ok(output)
    }

    fn write(&mut self, percent: u8) -> Result<(), OutputError> {
        let value = percent_to_native(percent, self.low, self.high);
        fs::write(&self.path, format!("{}\n", value)).map_err(|source| OutputError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl BrightnessOutput for FileOutput {
    fn set_brightness(&mut self, percent: u8) -> Result<(), OutputError> {
        let percent = percent.min(MAXIMUM_BRIGHTNESS);
        self.write(percent)?;
        self.current = percent;
        Ok(())
    }

    fn current_brightness(&self) -> u8 {
        self.current
    }

    fn output_name(&self) -> &'static str {
        "file"
    }
}
