//! Ambient light sensor abstraction.
//!
//! The control loop only needs two things from a sensor: a lux reading (or a
//! typed failure) and a health flag. Device drivers implement
//! [`AmbientSensor`]; [`create_sensor`] picks the implementation named in the
//! `[sensor]` config section.

use anyhow::Result;
use thiserror::Error;

use crate::config::{SensorConfig, SensorType};
use crate::constants::DEFAULT_SENSOR_PATH;

pub mod file;

/// Reasons a lux reading could not be produced.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read sensor source {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sensor source {path} is empty")]
    Empty { path: String },
    #[error("invalid lux value '{value}' from {path}")]
    InvalidValue { path: String, value: String },
}

/// A source of ambient light readings.
#[cfg_attr(test, mockall::automock)]
pub trait AmbientSensor {
    /// Take one reading in lux.
    ///
    /// Negative values are passed through; the controller clamps them to 0.
    fn read_lux(&mut self) -> Result<f32, SensorError>;

    /// Whether the last read succeeded.
    fn is_healthy(&self) -> bool;

    /// Short name used in logs.
    fn sensor_name(&self) -> &'static str;
}

/// Build the sensor described by the `[sensor]` config section.
pub fn create_sensor(config: &SensorConfig) -> Result<Box<dyn AmbientSensor>> {
    match config.kind.unwrap_or_default() {
        SensorType::File => {
            let path = config.path.as_deref().unwrap_or(DEFAULT_SENSOR_PATH);
            Ok(Box::new(file::FileSensor::new(path)) as Box<dyn AmbientSensor>)
        }
    }
}
