//! Configuration system for dimmerd with validation and default generation.
//!
//! The configuration is a TOML file, by default `$XDG_CONFIG_HOME/dimmerd/dimmerd.toml`.
//! A commented default file is generated on first run.
//!
//! ## Configuration Structure
//!
//! ```toml
//! [control]
//! update_interval_ms = 500          # Control loop period
//! auto_resume_timeout_sec = 60      # Temporary manual override lifetime
//! hysteresis_percent = 10.0         # Zone boundary hysteresis (0 disables)
//! state_file = "/var/lib/dimmerd/state.toml"
//! state_save_interval_sec = 60
//! log_level = "info"
//! socket_path = "/tmp/dimmerd.sock" # "" disables the control socket
//! tcp_listen = "127.0.0.1:9000"     # optional TCP control endpoint
//! command_queue_capacity = 64
//!
//! [sensor]
//! type = "file"
//! path = "/tmp/dimmerd/lux"
//!
//! [output]
//! type = "file"                     # "file" or "backlight"
//! path = "/tmp/dimmerd/brightness"
//! value_range = [0, 100]
//!
//! [[zones]]
//! name = "night"
//! lux_range = [0.0, 10.0]
//! brightness_range = [5, 30]
//! curve = "logarithmic"
//! step_up = { large = 10, medium = 4, small = 2 }
//! step_down = { large = 5, medium = 2, small = 1 }
//! error_thresholds = { large = 30, small = 10 }
//! ```
//!
//! ## Validation and Error Handling
//!
//! Scalar settings are range checked and defaulted in
//! `apply_defaults_and_validate_fields`. Zones are validated individually and any
//! invalid zone is fatal. Gaps and overlaps between consecutive zones are
//! reported as warnings, since first-match-else-last selection handles them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::logger::{Log, LogLevel};
use crate::zone::{CurveKind, ErrorThresholds, StepSizes, Zone, ZoneSet};

/// Ambient light sensor implementation.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    /// Text file containing the current lux value.
    #[default]
    File,
}

impl SensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::File => "file",
        }
    }
}

/// Brightness output implementation.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Text file receiving the scaled brightness value.
    #[default]
    File,
    /// Linux sysfs backlight device directory.
    Backlight,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::File => "file",
            OutputType::Backlight => "backlight",
        }
    }
}

/// `[control]` section.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ControlConfig {
    pub update_interval_ms: Option<u64>,
    pub auto_resume_timeout_sec: Option<u64>,
    pub hysteresis_percent: Option<f32>,
    pub state_file: Option<String>,
    pub state_save_interval_sec: Option<u64>,
    pub log_level: Option<String>,
    /// Unix socket for control clients; empty disables it.
    pub socket_path: Option<String>,
    /// TCP address for control clients; absent or empty disables it.
    pub tcp_listen: Option<String>,
    pub command_queue_capacity: Option<usize>,
}

/// `[sensor]` section.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SensorConfig {
    #[serde(rename = "type")]
    pub kind: Option<SensorType>,
    pub path: Option<String>,
}

/// `[output]` section.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct OutputConfig {
    #[serde(rename = "type")]
    pub kind: Option<OutputType>,
    /// File path, or backlight device directory.
    pub path: Option<String>,
    /// Device-native `[low, high]` for the file output.
    pub value_range: Option<[u32; 2]>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct StepConfig {
    pub large: u8,
    pub medium: u8,
    pub small: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    pub large: u8,
    pub small: u8,
}

/// One `[[zones]]` entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ZoneConfig {
    pub name: String,
    pub lux_range: [f32; 2],
    pub brightness_range: [u8; 2],
    pub curve: Option<String>,
    pub step_up: Option<StepConfig>,
    /// Defaults to half of `step_up`.
    pub step_down: Option<StepConfig>,
    pub error_thresholds: Option<ThresholdConfig>,
}

impl ZoneConfig {
    /// Convert to a [`Zone`], filling in default tuning. An unknown curve
    /// name maps to linear; [`validate_config`] reports it.
    pub fn to_zone(&self) -> Zone {
        let curve = self
            .curve
            .as_deref()
            .and_then(CurveKind::from_name)
            .unwrap_or_default();
        let step_up = self
            .step_up
            .map(|s| StepSizes::new(s.large, s.medium, s.small))
            .unwrap_or_default();
        let step_down = self
            .step_down
            .map(|s| StepSizes::new(s.large, s.medium, s.small))
            .unwrap_or_else(|| step_up.halved());
        let thresholds = self
            .error_thresholds
            .map(|t| ErrorThresholds {
                large: t.large,
                small: t.small,
            })
            .unwrap_or_default();

        Zone::new(&self.name, self.lux_range, self.brightness_range, curve)
            .with_steps(step_up, step_down)
            .with_thresholds(thresholds)
    }
}

/// Configuration structure for dimmerd settings.
///
/// Most scalar fields are optional in the file and are filled with defaults
/// during loading, so after [`Config::load_from_path`] every `Option` in
/// `control`, `sensor` and `output` is `Some`.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Write a commented default config file.
    pub fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let mut builder = ConfigBuilder::new()
            .add_section("control")
            .add_setting(
                "update_interval_ms",
                &DEFAULT_UPDATE_INTERVAL_MS.to_string(),
                &format!(
                    "Control loop period in milliseconds ({}-{})",
                    MINIMUM_UPDATE_INTERVAL_MS, MAXIMUM_UPDATE_INTERVAL_MS
                ),
            )
            .add_setting(
                "auto_resume_timeout_sec",
                &DEFAULT_AUTO_RESUME_TIMEOUT_SECS.to_string(),
                &format!(
                    "Seconds before a temporary override returns to auto ({}-{})",
                    MINIMUM_AUTO_RESUME_TIMEOUT_SECS, MAXIMUM_AUTO_RESUME_TIMEOUT_SECS
                ),
            )
            .add_setting(
                "hysteresis_percent",
                "10.0",
                &format!(
                    "Zone boundary hysteresis in percent, 0 disables ({}-{})",
                    MINIMUM_HYSTERESIS_PERCENT, MAXIMUM_HYSTERESIS_PERCENT
                ),
            )
            .add_setting(
                "state_file",
                &format!("\"{}\"", DEFAULT_STATE_FILE),
                "Where mode and brightness are persisted",
            )
            .add_setting(
                "state_save_interval_sec",
                &DEFAULT_STATE_SAVE_INTERVAL_SECS.to_string(),
                "How often changed state is written to disk",
            )
            .add_setting(
                "log_level",
                &format!("\"{}\"", DEFAULT_LOG_LEVEL),
                "Select: \"trace\", \"debug\", \"info\", \"warn\", \"error\"",
            )
            .add_setting(
                "socket_path",
                &format!("\"{}\"", DEFAULT_SOCKET_PATH),
                "Control socket, \"\" disables it",
            )
            .add_setting(
                "tcp_listen",
                "\"\"",
                "TCP control address such as \"127.0.0.1:9000\", \"\" disables it",
            )
            .add_section("sensor")
            .add_setting("type", "\"file\"", "Select: \"file\"")
            .add_setting(
                "path",
                &format!("\"{}\"", DEFAULT_SENSOR_PATH),
                "File whose first line is the lux value",
            )
            .add_section("output")
            .add_setting("type", "\"file\"", "Select: \"file\", \"backlight\"")
            .add_setting(
                "path",
                &format!("\"{}\"", DEFAULT_OUTPUT_PATH),
                "Output file, or /sys/class/backlight/<device> directory",
            )
            .add_setting(
                "value_range",
                &format!(
                    "[{}, {}]",
                    DEFAULT_OUTPUT_VALUE_RANGE[0], DEFAULT_OUTPUT_VALUE_RANGE[1]
                ),
                "Device value written for 0% and 100% (file output)",
            );

        for (name, lux, brightness, curve) in DEFAULT_ZONES {
            builder = builder
                .add_table_array("zones")
                .add_setting("name", &format!("\"{}\"", name), "Zone label used in logs")
                .add_setting(
                    "lux_range",
                    &format!("[{:.1}, {:.1}]", lux[0], lux[1]),
                    "Lux range [min, max)",
                )
                .add_setting(
                    "brightness_range",
                    &format!("[{}, {}]", brightness[0], brightness[1]),
                    "Brightness percent [min, max]",
                )
                .add_setting(
                    "curve",
                    &format!("\"{}\"", curve),
                    "Select: \"linear\", \"logarithmic\"",
                );
        }

        fs::write(path, builder.build()).context("Failed to write default config file")?;
        Ok(())
    }

    fn apply_defaults_and_validate_fields(config: &mut Config) -> Result<()> {
        let control = &mut config.control;

        let interval = *control
            .update_interval_ms
            .get_or_insert(DEFAULT_UPDATE_INTERVAL_MS);
        if !(MINIMUM_UPDATE_INTERVAL_MS..=MAXIMUM_UPDATE_INTERVAL_MS).contains(&interval) {
            anyhow::bail!(
                "Update interval must be between {} and {} milliseconds (got {})",
                MINIMUM_UPDATE_INTERVAL_MS,
                MAXIMUM_UPDATE_INTERVAL_MS,
                interval
            );
        }

        let timeout = *control
            .auto_resume_timeout_sec
            .get_or_insert(DEFAULT_AUTO_RESUME_TIMEOUT_SECS);
        if !(MINIMUM_AUTO_RESUME_TIMEOUT_SECS..=MAXIMUM_AUTO_RESUME_TIMEOUT_SECS).contains(&timeout)
        {
            anyhow::bail!(
                "Auto-resume timeout must be between {} and {} seconds (got {})",
                MINIMUM_AUTO_RESUME_TIMEOUT_SECS,
                MAXIMUM_AUTO_RESUME_TIMEOUT_SECS,
                timeout
            );
        }

        let hysteresis = *control
            .hysteresis_percent
            .get_or_insert(DEFAULT_HYSTERESIS_PERCENT);
        if !(MINIMUM_HYSTERESIS_PERCENT..=MAXIMUM_HYSTERESIS_PERCENT).contains(&hysteresis) {
            anyhow::bail!(
                "Hysteresis must be between {}% and {}% (got {})",
                MINIMUM_HYSTERESIS_PERCENT,
                MAXIMUM_HYSTERESIS_PERCENT,
                hysteresis
            );
        }

        if control.state_file.as_deref().is_none_or(str::is_empty) {
            control.state_file = Some(DEFAULT_STATE_FILE.to_string());
        }

        let save_interval = *control
            .state_save_interval_sec
            .get_or_insert(DEFAULT_STATE_SAVE_INTERVAL_SECS);
        if !(MINIMUM_STATE_SAVE_INTERVAL_SECS..=MAXIMUM_STATE_SAVE_INTERVAL_SECS)
            .contains(&save_interval)
        {
            anyhow::bail!(
                "State save interval must be between {} and {} seconds (got {})",
                MINIMUM_STATE_SAVE_INTERVAL_SECS,
                MAXIMUM_STATE_SAVE_INTERVAL_SECS,
                save_interval
            );
        }

        // Unknown levels degrade to info rather than refusing to start
        match control.log_level.as_deref() {
            None => control.log_level = Some(DEFAULT_LOG_LEVEL.to_string()),
            Some(level) if LogLevel::parse(level).is_none() => {
                Log::log_warning(&format!(
                    "Unknown log level '{}', using {}",
                    level, DEFAULT_LOG_LEVEL
                ));
                control.log_level = Some(DEFAULT_LOG_LEVEL.to_string());
            }
            Some(_) => {}
        }

        if control.socket_path.is_none() {
            control.socket_path = Some(DEFAULT_SOCKET_PATH.to_string());
        }

        if let Some(addr) = control.tcp_listen.as_deref().filter(|addr| !addr.is_empty()) {
            addr.parse::<SocketAddr>().with_context(|| {
                format!("TCP listen address '{}' must be host:port, e.g. 127.0.0.1:9000", addr)
            })?;
        }

        let capacity = *control
            .command_queue_capacity
            .get_or_insert(DEFAULT_COMMAND_QUEUE_CAPACITY);
        if !(MINIMUM_COMMAND_QUEUE_CAPACITY..=MAXIMUM_COMMAND_QUEUE_CAPACITY).contains(&capacity) {
            anyhow::bail!(
                "Command queue capacity must be between {} and {} (got {})",
                MINIMUM_COMMAND_QUEUE_CAPACITY,
                MAXIMUM_COMMAND_QUEUE_CAPACITY,
                capacity
            );
        }

        let sensor = &mut config.sensor;
        sensor.kind.get_or_insert_default();
        if sensor.path.as_deref().is_none_or(str::is_empty) {
            sensor.path = Some(DEFAULT_SENSOR_PATH.to_string());
        }

        let output = &mut config.output;
        let kind = *output.kind.get_or_insert_default();
        if output.path.as_deref().is_none_or(str::is_empty) {
            output.path = Some(
                match kind {
                    OutputType::File => DEFAULT_OUTPUT_PATH,
                    OutputType::Backlight => DEFAULT_BACKLIGHT_PATH,
                }
                .to_string(),
            );
        }
        let [low, high] = *output.value_range.get_or_insert(DEFAULT_OUTPUT_VALUE_RANGE);
        if low >= high {
            anyhow::bail!(
                "Output value_range must satisfy low < high (got [{}, {}])",
                low,
                high
            );
        }

        Ok(())
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse config")?;
        Self::apply_defaults_and_validate_fields(&mut config)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load from a specific path. Does NOT create a default config if missing.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load from the default location, creating a default config first if needed.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            Log::log_decorated(&format!(
                "Creating default config at {}",
                config_path.display()
            ));
            Self::create_default_config(&config_path)
                .context("Failed to create default config during load")?;
        }

        Self::load_from_path(&config_path).with_context(|| {
            Log::log_pipe();
            format!(
                "Failed to load configuration from {}",
                config_path.display()
            )
        })
    }

    /// Build the validated zone set.
    pub fn zone_set(&self) -> Result<ZoneSet> {
        let zones = self.zones.iter().map(ZoneConfig::to_zone).collect();
        let zones = ZoneSet::new(zones).context("Invalid zone configuration")?;
        Ok(zones)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(
            self.control
                .update_interval_ms
                .unwrap_or(DEFAULT_UPDATE_INTERVAL_MS),
        )
    }

    pub fn auto_resume_timeout(&self) -> Duration {
        Duration::from_secs(
            self.control
                .auto_resume_timeout_sec
                .unwrap_or(DEFAULT_AUTO_RESUME_TIMEOUT_SECS),
        )
    }

    pub fn hysteresis_percent(&self) -> f32 {
        self.control
            .hysteresis_percent
            .unwrap_or(DEFAULT_HYSTERESIS_PERCENT)
    }

    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(
            self.control
                .state_file
                .as_deref()
                .unwrap_or(DEFAULT_STATE_FILE),
        )
    }

    pub fn state_save_interval(&self) -> Duration {
        Duration::from_secs(
            self.control
                .state_save_interval_sec
                .unwrap_or(DEFAULT_STATE_SAVE_INTERVAL_SECS),
        )
    }

    pub fn log_level(&self) -> LogLevel {
        self.control
            .log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info)
    }

    /// Control socket path, `None` when disabled.
    pub fn socket_path(&self) -> Option<PathBuf> {
        match self.control.socket_path.as_deref() {
            None => Some(PathBuf::from(DEFAULT_SOCKET_PATH)),
            Some("") => None,
            Some(path) => Some(PathBuf::from(path)),
        }
    }

    /// TCP control address, `None` when disabled.
    pub fn tcp_listen(&self) -> Option<SocketAddr> {
        self.control
            .tcp_listen
            .as_deref()
            .filter(|addr| !addr.is_empty())
            .and_then(|addr| addr.parse().ok())
    }

    pub fn command_queue_capacity(&self) -> usize {
        self.control
            .command_queue_capacity
            .unwrap_or(DEFAULT_COMMAND_QUEUE_CAPACITY)
    }

    pub fn log_config(&self, path: &Path) {
        Log::log_block_start(&format!("Loaded configuration from {}", path.display()));

        Log::log_indented(&format!(
            "Update interval: {} ms",
            self.update_interval().as_millis()
        ));
        Log::log_indented(&format!(
            "Auto-resume timeout: {} seconds",
            self.auto_resume_timeout().as_secs()
        ));
        let hysteresis = self.hysteresis_percent();
        if hysteresis > 0.0 {
            Log::log_indented(&format!("Zone hysteresis: {}%", hysteresis));
        } else {
            Log::log_indented("Zone hysteresis: disabled");
        }
        Log::log_indented(&format!("State file: {}", self.state_file().display()));
        Log::log_indented(&format!("Log level: {}", self.log_level().as_str()));
        match self.socket_path() {
            Some(socket) => Log::log_indented(&format!("Control socket: {}", socket.display())),
            None => Log::log_indented("Control socket: disabled"),
        }
        if let Some(addr) = self.tcp_listen() {
            Log::log_indented(&format!("TCP control: {}", addr));
        }
        Log::log_indented(&format!(
            "Sensor: {} ({})",
            self.sensor.kind.unwrap_or_default().as_str(),
            self.sensor.path.as_deref().unwrap_or(DEFAULT_SENSOR_PATH)
        ));
        Log::log_indented(&format!(
            "Output: {} ({})",
            self.output.kind.unwrap_or_default().as_str(),
            self.output.path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
        ));

        Log::log_block_start(&format!("Zones ({}):", self.zones.len()));
        for zone in self.zones.iter().map(ZoneConfig::to_zone) {
            Log::log_indented(&format!(
                "{}: lux [{}, {}) -> {}-{}% {}",
                zone.name,
                zone.lux_min,
                zone.lux_max,
                zone.brightness_min,
                zone.brightness_max,
                zone.curve
            ));
        }
    }
}

/// Zones whose curve name is not recognized, as `(zone, curve)` pairs.
pub fn unknown_curves(config: &Config) -> Vec<(&str, &str)> {
    config
        .zones
        .iter()
        .filter_map(|zone| {
            let curve = zone.curve.as_deref()?;
            match CurveKind::from_name(curve) {
                Some(_) => None,
                None => Some((zone.name.as_str(), curve)),
            }
        })
        .collect()
}

/// Cross-field validation run after defaults are applied.
pub fn validate_config(config: &Config) -> Result<()> {
    let zones = config.zone_set()?;

    for (zone, curve) in unknown_curves(config) {
        Log::log_warning(&format!(
            "Zone '{}': unknown curve type '{}', using linear",
            zone, curve
        ));
    }

    for issue in zones.coverage_issues() {
        Log::log_warning(&format!("Zone coverage: {}", issue));
    }

    let interval = config.update_interval();
    let timeout = config.auto_resume_timeout();
    if timeout < interval {
        Log::log_warning(&format!(
            "Auto-resume timeout ({} s) is shorter than one update interval ({} ms); \
            temporary overrides will end on the next tick",
            timeout.as_secs(),
            interval.as_millis()
        ));
    }

    let custom_range = config
        .output
        .value_range
        .is_some_and(|range| range != DEFAULT_OUTPUT_VALUE_RANGE);
    if config.output.kind == Some(OutputType::Backlight) && custom_range {
        Log::log_warning("value_range is ignored for the backlight output");
    }

    Ok(())
}

/// Builder for configuration files with aligned trailing comments.
///
/// Comment columns are computed from the widest setting line, so changing a
/// default in constants.rs keeps the generated file tidy.
struct ConfigBuilder {
    entries: Vec<EntryType>,
}

enum EntryType {
    Header(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, name: &str) -> Self {
        self.entries.push(EntryType::Header(format!("[{}]", name)));
        self
    }

    fn add_table_array(mut self, name: &str) -> Self {
        self.entries.push(EntryType::Header(format!("[[{}]]", name)));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(EntryType::Setting {
            line: format!("{} = {}", key, value),
            comment: format!("# {}", comment),
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Header(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1; // one space between setting and comment

        let mut result = Vec::new();
        for entry in self.entries {
            match entry {
                EntryType::Header(header) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(header);
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{}{}{}", line, padding, comment));
                }
            }
        }

        let mut content = result.join("\n");
        content.push('\n');
        content
    }
}
