//! Operating modes and the state machine that moves between them.
//!
//! Every transition is enumerated in [`ModeStateMachine::apply`] and
//! [`ModeStateMachine::check_auto_resume`]. Time is passed in explicitly so the
//! resume timer can be driven from tests without sleeping.
//!
//! | from               | event               | to                 | timer        |
//! |--------------------|---------------------|--------------------|--------------|
//! | AUTO               | set/adjust          | MANUAL_TEMPORARY   | start        |
//! | AUTO               | set_mode(manual)    | MANUAL             | none         |
//! | MANUAL             | set/adjust          | MANUAL             | none         |
//! | MANUAL             | set_mode(auto)      | AUTO               | none         |
//! | MANUAL_TEMPORARY   | set/adjust          | MANUAL_TEMPORARY   | restart      |
//! | MANUAL_TEMPORARY   | set_mode(auto)      | AUTO               | cancel       |
//! | MANUAL_TEMPORARY   | set_mode(manual)    | MANUAL             | cancel       |
//! | MANUAL_TEMPORARY   | timeout elapsed     | AUTO               | cancel       |

use std::fmt;
use std::time::{Duration, Instant};

use crate::constants::*;
use crate::logger::Log;

/// The daemon's operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    /// Output follows the ambient light sensor.
    #[default]
    Auto,
    /// User-set brightness that stays until the user returns to auto.
    Manual,
    /// User-set brightness that reverts to auto after the resume timeout.
    ManualTemporary,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Auto => "auto",
            OperatingMode::Manual => "manual",
            OperatingMode::ManualTemporary => "manual_temporary",
        }
    }

    /// Parse a persisted mode name, `None` if unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(OperatingMode::Auto),
            "manual" => Some(OperatingMode::Manual),
            "manual_temporary" => Some(OperatingMode::ManualTemporary),
            _ => None,
        }
    }

    pub fn is_manual(&self) -> bool {
        !matches!(self, OperatingMode::Auto)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode a client may request; the temporary mode is only entered implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedMode {
    Auto,
    Manual,
}

impl RequestedMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(RequestedMode::Auto),
            "manual" => Some(RequestedMode::Manual),
            _ => None,
        }
    }
}

/// A control command delivered to the loop through the command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(RequestedMode),
    SetBrightness(u8),
    AdjustBrightness(i16),
}

/// Mode plus the values the mode needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeContext {
    pub mode: OperatingMode,
    pub manual_brightness: u8,
    pub last_auto_brightness: u8,
    /// Set only while in [`OperatingMode::ManualTemporary`].
    pub manual_temporary_started_at: Option<Instant>,
    pub auto_resume_timeout: Duration,
}

/// What changed as a result of a command or timer check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeChange {
    pub mode_changed: bool,
    pub brightness_changed: bool,
}

impl ModeChange {
    pub fn any(&self) -> bool {
        self.mode_changed || self.brightness_changed
    }

    pub fn merge(&mut self, other: ModeChange) {
        self.mode_changed |= other.mode_changed;
        self.brightness_changed |= other.brightness_changed;
    }
}

/// Owner of the [`ModeContext`] and its transition rules.
#[derive(Debug, Clone)]
pub struct ModeStateMachine {
    context: ModeContext,
}

impl ModeStateMachine {
    pub fn new(auto_resume_timeout: Duration) -> Self {
        Self {
            context: ModeContext {
                mode: OperatingMode::Auto,
                manual_brightness: DEFAULT_MANUAL_BRIGHTNESS,
                last_auto_brightness: DEFAULT_LAST_AUTO_BRIGHTNESS,
                manual_temporary_started_at: None,
                auto_resume_timeout,
            },
        }
    }

    /// Rebuild the machine from persisted values.
    ///
    /// A persisted temporary override never survives a restart: it is coerced
    /// to AUTO here.
    pub fn restore(
        mode: OperatingMode,
        manual_brightness: u8,
        last_auto_brightness: u8,
        auto_resume_timeout: Duration,
    ) -> Self {
        let mode = match mode {
            OperatingMode::ManualTemporary => {
                Log::log_decorated("Temporary manual override does not persist, starting in auto mode");
                OperatingMode::Auto
            }
            other => other,
        };

        Self {
            context: ModeContext {
                mode,
                manual_brightness: manual_brightness.min(MAXIMUM_BRIGHTNESS),
                last_auto_brightness: last_auto_brightness.min(MAXIMUM_BRIGHTNESS),
                manual_temporary_started_at: None,
                auto_resume_timeout,
            },
        }
    }

    pub fn context(&self) -> &ModeContext {
        &self.context
    }

    pub fn mode(&self) -> OperatingMode {
        self.context.mode
    }

    pub fn manual_brightness(&self) -> u8 {
        self.context.manual_brightness
    }

    pub fn last_auto_brightness(&self) -> u8 {
        self.context.last_auto_brightness
    }

    /// Time left before a temporary override reverts, `None` outside MANUAL_TEMPORARY.
    pub fn resume_remaining(&self, now: Instant) -> Option<Duration> {
        let started = self.context.manual_temporary_started_at?;
        Some(
            self.context
                .auto_resume_timeout
                .saturating_sub(now.saturating_duration_since(started)),
        )
    }

    /// Apply one command at time `now`.
    pub fn apply(&mut self, command: Command, now: Instant) -> ModeChange {
        match command {
            Command::SetMode(requested) => self.set_mode(requested),
            Command::SetBrightness(value) => self.set_brightness(value, now),
            Command::AdjustBrightness(delta) => {
                let value = i16::from(self.context.manual_brightness).saturating_add(delta).clamp(
                    i16::from(MINIMUM_BRIGHTNESS),
                    i16::from(MAXIMUM_BRIGHTNESS),
                ) as u8;
                self.set_brightness(value, now)
            }
        }
    }

    /// Apply commands in arrival order, returning the combined change.
    pub fn apply_all<I>(&mut self, commands: I, now: Instant) -> ModeChange
    where
        I: IntoIterator<Item = Command>,
    {
        let mut change = ModeChange::default();
        for command in commands {
            change.merge(self.apply(command, now));
        }
        change
    }

    fn set_mode(&mut self, requested: RequestedMode) -> ModeChange {
        let target = match requested {
            RequestedMode::Auto => OperatingMode::Auto,
            RequestedMode::Manual => OperatingMode::Manual,
        };
        self.context.manual_temporary_started_at = None;
        self.transition_to(target)
    }

    fn set_brightness(&mut self, value: u8, now: Instant) -> ModeChange {
        let value = value.min(MAXIMUM_BRIGHTNESS);
        let brightness_changed = value != self.context.manual_brightness;
        self.context.manual_brightness = value;

        let mut change = match self.context.mode {
            OperatingMode::Auto | OperatingMode::ManualTemporary => {
                self.context.manual_temporary_started_at = Some(now);
                self.transition_to(OperatingMode::ManualTemporary)
            }
            OperatingMode::Manual => ModeChange::default(),
        };
        change.brightness_changed = brightness_changed;
        change
    }

    /// Revert a temporary override once its timeout has elapsed.
    pub fn check_auto_resume(&mut self, now: Instant) -> ModeChange {
        if self.context.mode != OperatingMode::ManualTemporary {
            return ModeChange::default();
        }

        let Some(started) = self.context.manual_temporary_started_at else {
            // Entered without a timestamp; start the clock now
            self.context.manual_temporary_started_at = Some(now);
            return ModeChange::default();
        };

        if now.saturating_duration_since(started) >= self.context.auto_resume_timeout {
            Log::log_block_start("Auto-resume timeout elapsed, returning to auto mode");
            self.context.manual_temporary_started_at = None;
            return self.transition_to(OperatingMode::Auto);
        }

        ModeChange::default()
    }

    /// Record the brightness most recently applied in AUTO. Returns whether it changed.
    pub fn record_auto_brightness(&mut self, value: u8) -> bool {
        let value = value.min(MAXIMUM_BRIGHTNESS);
        let changed = value != self.context.last_auto_brightness;
        self.context.last_auto_brightness = value;
        changed
    }

    fn transition_to(&mut self, mode: OperatingMode) -> ModeChange {
        if self.context.mode == mode {
            return ModeChange::default();
        }
        Log::log_info(&format!("Mode changed: {} -> {}", self.context.mode, mode));
        self.context.mode = mode;
        ModeChange {
            mode_changed: true,
            brightness_changed: false,
        }
    }
}
