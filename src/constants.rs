//! Application constants and default values for dimmerd.
//!
//! This module contains all the configuration defaults, validation limits,
//! and operational constants used throughout the application.

// ═══ Control Loop Defaults ═══
// These values are used when config options are not specified by the user

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 500; // milliseconds between control ticks
pub const DEFAULT_AUTO_RESUME_TIMEOUT_SECS: u64 = 60; // temporary manual override lifetime
pub const DEFAULT_HYSTERESIS_PERCENT: f32 = 0.0; // zone boundary hysteresis, 0 disables
pub const DEFAULT_STATE_FILE: &str = "/var/lib/dimmerd/state.toml";
pub const DEFAULT_STATE_SAVE_INTERVAL_SECS: u64 = 60; // how often a dirty state is flushed
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/dimmerd.sock";
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 64;

// ═══ Device Defaults ═══

pub const DEFAULT_SENSOR_PATH: &str = "/tmp/dimmerd/lux";
pub const DEFAULT_OUTPUT_PATH: &str = "/tmp/dimmerd/brightness";
pub const DEFAULT_BACKLIGHT_PATH: &str = "/sys/class/backlight/intel_backlight";
pub const DEFAULT_OUTPUT_VALUE_RANGE: [u32; 2] = [0, 100]; // device-native range for file output

// ═══ Default Zone Table ═══
// Written to newly generated config files: (name, lux range, brightness range, curve)

pub const DEFAULT_ZONES: [(&str, [f32; 2], [u8; 2], &str); 4] = [
    ("night", [0.0, 10.0], [5, 30], "logarithmic"),
    ("dusk", [10.0, 200.0], [30, 60], "logarithmic"),
    ("overcast", [200.0, 2000.0], [60, 85], "linear"),
    ("daylight", [2000.0, 100_000.0], [85, 100], "logarithmic"),
];

// ═══ Persisted State Defaults ═══
// Used when no state file exists yet or it cannot be parsed

pub const STATE_FILE_VERSION: u32 = 1;
pub const DEFAULT_MANUAL_BRIGHTNESS: u8 = 50;
pub const DEFAULT_LAST_AUTO_BRIGHTNESS: u8 = 50;

// ═══ Zone Defaults ═══
// Applied per zone when a zone omits its step sizes or thresholds

pub const DEFAULT_ZONE_STEP_LARGE: u8 = 10;
pub const DEFAULT_ZONE_STEP_MEDIUM: u8 = 4;
pub const DEFAULT_ZONE_STEP_SMALL: u8 = 2;
pub const DEFAULT_ZONE_THRESHOLD_LARGE: u8 = 30;
pub const DEFAULT_ZONE_THRESHOLD_SMALL: u8 = 10;

// ═══ Step Limiter Built-ins ═══
// Used when no zone is available for a transition. Dimming uses half of
// these magnitudes (never less than 1).

pub const BUILTIN_STEP_LARGE: u8 = 5;
pub const BUILTIN_STEP_MEDIUM: u8 = 2;
pub const BUILTIN_STEP_SMALL: u8 = 1;
pub const BUILTIN_THRESHOLD_LARGE: u8 = 20;
pub const BUILTIN_THRESHOLD_SMALL: u8 = 5;

// ═══ Validation Limits ═══
// These limits ensure user inputs are within reasonable and safe ranges

pub const MINIMUM_BRIGHTNESS: u8 = 0;
pub const MAXIMUM_BRIGHTNESS: u8 = 100;

pub const MINIMUM_UPDATE_INTERVAL_MS: u64 = 50; // prevents busy-looping the bus
pub const MAXIMUM_UPDATE_INTERVAL_MS: u64 = 10_000; // 10 seconds max for responsive control

pub const MINIMUM_AUTO_RESUME_TIMEOUT_SECS: u64 = 1;
pub const MAXIMUM_AUTO_RESUME_TIMEOUT_SECS: u64 = 86_400; // one day

pub const MINIMUM_HYSTERESIS_PERCENT: f32 = 0.0;
pub const MAXIMUM_HYSTERESIS_PERCENT: f32 = 50.0;

pub const MINIMUM_STATE_SAVE_INTERVAL_SECS: u64 = 1;
pub const MAXIMUM_STATE_SAVE_INTERVAL_SECS: u64 = 3_600;

pub const MINIMUM_COMMAND_QUEUE_CAPACITY: usize = 1;
pub const MAXIMUM_COMMAND_QUEUE_CAPACITY: usize = 4_096;

pub const MINIMUM_ADJUST_DELTA: i16 = -100;
pub const MAXIMUM_ADJUST_DELTA: i16 = 100;

// ═══ Operational Timing Constants ═══
// Internal timing values for application operation

pub const CHECK_INTERVAL_MS: u64 = 50; // How often to check the running flag during sleep
pub const CSV_BUFFER_ROWS: usize = 10; // CSV rows held before a flush
pub const CSV_FLUSH_INTERVAL_SECS: u64 = 5; // or flush once this much time has passed

pub const CONFIG_DIR_NAME: &str = "dimmerd";
pub const CONFIG_FILE_NAME: &str = "dimmerd.toml";
pub const LOCK_FILE_NAME: &str = "dimmerd.lock";

// ═══ Control Protocol ═══

pub const PROTOCOL_VERSION: &str = "1.0";
pub const SOCKET_READ_TIMEOUT_MS: u64 = 30_000; // idle client connections are dropped
pub const MAX_REQUEST_BYTES: u64 = 4_096; // longest accepted request line
pub const MAX_CONTROL_CLIENTS: usize = 16; // concurrent connections per endpoint

// ═══ Exit Codes ═══
// Standard exit codes for process termination

pub const EXIT_FAILURE: i32 = 1; // General failure

// ═══ Test Constants ═══
// Common values used in tests for consistency
#[cfg(test)]
pub mod test_constants {
    pub const TEST_NIGHT_LUX: [f32; 2] = [0.0, 10.0];
    pub const TEST_NIGHT_BRIGHTNESS: [u8; 2] = [5, 30];
    pub const TEST_DAY_LUX: [f32; 2] = [10.0, 100.0];
    pub const TEST_DAY_BRIGHTNESS: [u8; 2] = [30, 100];
    pub const TEST_HYSTERESIS_PERCENT: f32 = 10.0;
    pub const TEST_AUTO_RESUME_TIMEOUT_SECS: u64 = 60;
}
