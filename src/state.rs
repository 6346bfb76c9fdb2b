//! Persisted operating state.
//!
//! The state file keeps the mode and brightness values across restarts:
//!
//! ```toml
//! version = 1
//! mode = "manual"
//! manual_brightness = 65
//! last_auto_brightness = 42
//! last_updated = "2025-06-01T18:04:11Z"
//! ```
//!
//! The control loop only marks the store dirty; the daemon flushes it on a
//! fixed interval and at shutdown. Loading never fails: a missing or malformed
//! file yields defaults.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::controller::Persistence;
use crate::logger::Log;
use crate::mode::{ModeContext, OperatingMode};

/// On-disk representation of the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub version: u32,
    pub mode: String,
    pub manual_brightness: u8,
    pub last_auto_brightness: u8,
    pub last_updated: Option<String>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            mode: OperatingMode::Auto.as_str().to_string(),
            manual_brightness: DEFAULT_MANUAL_BRIGHTNESS,
            last_auto_brightness: DEFAULT_LAST_AUTO_BRIGHTNESS,
            last_updated: None,
        }
    }
}

impl PersistedState {
    /// The stored mode; unknown names load as AUTO.
    pub fn operating_mode(&self) -> OperatingMode {
        OperatingMode::from_name(&self.mode).unwrap_or_else(|| {
            Log::log_warning(&format!(
                "Unknown mode '{}' in state file, using auto",
                self.mode
            ));
            OperatingMode::Auto
        })
    }

    fn from_context(context: &ModeContext) -> Self {
        Self {
            version: STATE_FILE_VERSION,
            mode: context.mode.as_str().to_string(),
            manual_brightness: context.manual_brightness,
            last_auto_brightness: context.last_auto_brightness,
            last_updated: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// File-backed state with a dirty flag.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    dirty: bool,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read the state file, falling back to defaults.
    pub fn load(&self) -> PersistedState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Log::log_decorated(&format!(
                    "No state file at {}, using defaults",
                    self.path.display()
                ));
                return PersistedState::default();
            }
            Err(e) => {
                Log::log_warning(&format!(
                    "Failed to read state file {}: {}. Using defaults.",
                    self.path.display(),
                    e
                ));
                return PersistedState::default();
            }
        };

        match toml::from_str::<PersistedState>(&content) {
            Ok(mut state) => {
                state.manual_brightness = state.manual_brightness.min(MAXIMUM_BRIGHTNESS);
                state.last_auto_brightness = state.last_auto_brightness.min(MAXIMUM_BRIGHTNESS);
                if state.version != STATE_FILE_VERSION {
                    Log::log_warning(&format!(
                        "State file version {} differs from {}, loading known fields",
                        state.version, STATE_FILE_VERSION
                    ));
                }
                state
            }
            Err(e) => {
                Log::log_warning(&format!(
                    "Failed to parse state file {}: {}. Using defaults.",
                    self.path.display(),
                    e
                ));
                PersistedState::default()
            }
        }
    }

    /// Write the state atomically and clear the dirty flag.
    pub fn save(&mut self, context: &ModeContext) -> Result<()> {
        let state = PersistedState::from_context(context);
        let content = toml::to_string(&state).context("Failed to serialize state")?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create state directory {}", parent.display()))?;

        // Write to a sibling temp file and rename so a crash never leaves a torn file
        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .context("Failed to create temporary state file")?;
        temp.write_all(content.as_bytes())
            .context("Failed to write temporary state file")?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to replace state file {}", self.path.display()))?;

        self.dirty = false;
        Log::log_debug(&format!(
            "State saved: mode={}, manual_brightness={}, last_auto_brightness={}",
            state.mode, state.manual_brightness, state.last_auto_brightness
        ));
        Ok(())
    }
}

impl Persistence for StateStore {
    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
