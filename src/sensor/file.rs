//! File-backed sensor for simulation and bench testing.
//!
//! The first line of the file holds the current lux value. The file may be
//! missing at startup; every read opens it afresh.

use std::fs;
use std::path::PathBuf;

use crate::logger::Log;
use crate::sensor::{AmbientSensor, SensorError};

pub struct FileSensor {
    path: PathBuf,
    healthy: bool,
}

impl FileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            Log::log_warning(&format!(
                "Sensor file {} does not exist yet, will retry on read",
                path.display()
            ));
        }
        Self {
            path,
            healthy: true,
        }
    }

    fn read_once(&self) -> Result<f32, SensorError> {
        let display = self.path.display().to_string();
        let content = fs::read_to_string(&self.path).map_err(|source| SensorError::Unreadable {
            path: display.clone(),
            source,
        })?;

        let line = content
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| SensorError::Empty {
                path: display.clone(),
            })?;

        match line.parse::<f32>() {
            Ok(lux) if lux.is_finite() => Ok(lux),
            _ => Err(SensorError::InvalidValue {
                path: display,
                value: line.to_string(),
            }),
        }
    }
}

impl AmbientSensor for FileSensor {
    fn read_lux(&mut self) -> Result<f32, SensorError> {
        let reading = self.read_once();
        self.healthy = reading.is_ok();
        reading
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn sensor_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_first_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lux");
        fs::write(&path, "123.5\nignored\n").unwrap();

        let mut sensor = FileSensor::new(&path);
        assert_eq!(sensor.read_lux().unwrap(), 123.5);
        assert!(sensor.is_healthy());
    }

    #[test]
    fn test_negative_values_pass_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lux");
        fs::write(&path, "-4\n").unwrap();

        let mut sensor = FileSensor::new(&path);
        assert_eq!(sensor.read_lux().unwrap(), -4.0);
    }

    #[test]
    fn test_missing_file_is_unhealthy_until_it_appears() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lux");

        let mut sensor = FileSensor::new(&path);
        assert!(matches!(
            sensor.read_lux(),
            Err(SensorError::Unreadable { .. })
        ));
        assert!(!sensor.is_healthy());

        fs::write(&path, "10").unwrap();
        assert_eq!(sensor.read_lux().unwrap(), 10.0);
        assert!(sensor.is_healthy());
    }

    #[test]
    fn test_garbage_and_empty_content_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lux");
        let mut sensor = FileSensor::new(&path);

        fs::write(&path, "bright\n").unwrap();
        assert!(matches!(
            sensor.read_lux(),
            Err(SensorError::InvalidValue { .. })
        ));

        fs::write(&path, "inf\n").unwrap();
        assert!(matches!(
            sensor.read_lux(),
            Err(SensorError::InvalidValue { .. })
        ));

        fs::write(&path, "\n").unwrap();
        assert!(matches!(sensor.read_lux(), Err(SensorError::Empty { .. })));
    }
}
