//! Lux zones and the ordered zone set the control loop selects from.
//!
//! A zone maps a lux sub-range onto a brightness sub-range through a curve and
//! carries its own transition tuning: independent step triples for brightening
//! and dimming plus the error thresholds that choose between them.
//!
//! Zones are validated once when the [`ZoneSet`] is built and are immutable for
//! the rest of the daemon's run.

use std::fmt;

use thiserror::Error;

use crate::constants::*;

/// Curve used to map normalized lux onto normalized brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveKind {
    #[default]
    Linear,
    /// `ln(1 + x)` response: fast change at low lux, flattening at high lux.
    Logarithmic,
}

impl CurveKind {
    /// Parse a config string, `None` if unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(CurveKind::Linear),
            "logarithmic" | "log" => Some(CurveKind::Logarithmic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurveKind::Linear => "linear",
            CurveKind::Logarithmic => "logarithmic",
        }
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step magnitudes for one direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSizes {
    pub large: u8,
    pub medium: u8,
    pub small: u8,
}

impl StepSizes {
    pub const fn new(large: u8, medium: u8, small: u8) -> Self {
        Self {
            large,
            medium,
            small,
        }
    }

    /// Half of every magnitude, never below 1.
    pub fn halved(&self) -> Self {
        Self {
            large: (self.large / 2).max(1),
            medium: (self.medium / 2).max(1),
            small: (self.small / 2).max(1),
        }
    }
}

impl Default for StepSizes {
    fn default() -> Self {
        Self::new(
            DEFAULT_ZONE_STEP_LARGE,
            DEFAULT_ZONE_STEP_MEDIUM,
            DEFAULT_ZONE_STEP_SMALL,
        )
    }
}

/// Error magnitudes above which the large/medium step is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorThresholds {
    pub large: u8,
    pub small: u8,
}

impl Default for ErrorThresholds {
    fn default() -> Self {
        Self {
            large: DEFAULT_ZONE_THRESHOLD_LARGE,
            small: DEFAULT_ZONE_THRESHOLD_SMALL,
        }
    }
}

/// Configuration errors detected while building zones.
#[derive(Debug, Error, PartialEq)]
pub enum ZoneError {
    #[error("at least one zone is required")]
    Empty,
    #[error("zone '{name}': lux range [{min}, {max}) must be finite with min < max")]
    InvalidLuxRange { name: String, min: f32, max: f32 },
    #[error("zone '{name}': brightness range [{min}, {max}] must satisfy min < max <= 100")]
    InvalidBrightnessRange { name: String, min: u8, max: u8 },
    #[error("zone '{name}': step sizes must be at least 1")]
    ZeroStep { name: String },
    #[error("zone '{name}': small error threshold ({small}) exceeds large threshold ({large})")]
    InvalidThresholds { name: String, small: u8, large: u8 },
}

/// A lux sub-range mapped to a brightness sub-range.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub name: String,
    /// Half-open `[min, max)` for selection; closed for curve clamping.
    pub lux_min: f32,
    pub lux_max: f32,
    pub brightness_min: u8,
    pub brightness_max: u8,
    pub curve: CurveKind,
    pub step_up: StepSizes,
    pub step_down: StepSizes,
    pub thresholds: ErrorThresholds,
}

impl Zone {
    /// Build a zone with default tuning; `step_down` is half of `step_up`.
    pub fn new(
        name: impl Into<String>,
        lux_range: [f32; 2],
        brightness_range: [u8; 2],
        curve: CurveKind,
    ) -> Self {
        let step_up = StepSizes::default();
        Self {
            name: name.into(),
            lux_min: lux_range[0],
            lux_max: lux_range[1],
            brightness_min: brightness_range[0],
            brightness_max: brightness_range[1],
            curve,
            step_up,
            step_down: step_up.halved(),
            thresholds: ErrorThresholds::default(),
        }
    }

    pub fn with_steps(mut self, step_up: StepSizes, step_down: StepSizes) -> Self {
        self.step_up = step_up;
        self.step_down = step_down;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ErrorThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Whether `lux` lies in the zone's half-open selection range.
    pub fn contains(&self, lux: f32) -> bool {
        lux >= self.lux_min && lux < self.lux_max
    }

    pub fn validate(&self) -> Result<(), ZoneError> {
        if !self.lux_min.is_finite() || !self.lux_max.is_finite() || self.lux_min >= self.lux_max
        {
            return Err(ZoneError::InvalidLuxRange {
                name: self.name.clone(),
                min: self.lux_min,
                max: self.lux_max,
            });
        }

        if self.brightness_min >= self.brightness_max || self.brightness_max > MAXIMUM_BRIGHTNESS
        {
            return Err(ZoneError::InvalidBrightnessRange {
                name: self.name.clone(),
                min: self.brightness_min,
                max: self.brightness_max,
            });
        }

        let steps = [self.step_up, self.step_down];
        if steps
            .iter()
            .any(|s| s.large == 0 || s.medium == 0 || s.small == 0)
        {
            return Err(ZoneError::ZeroStep {
                name: self.name.clone(),
            });
        }

        if self.thresholds.small > self.thresholds.large {
            return Err(ZoneError::InvalidThresholds {
                name: self.name.clone(),
                small: self.thresholds.small,
                large: self.thresholds.large,
            });
        }

        Ok(())
    }
}

/// A gap or overlap between two consecutive zones.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageIssue {
    Gap { before: String, after: String, from: f32, to: f32 },
    Overlap { first: String, second: String, from: f32, to: f32 },
}

impl fmt::Display for CoverageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageIssue::Gap {
                before,
                after,
                from,
                to,
            } => write!(
                f,
                "lux {}..{} is not covered between zones '{}' and '{}'",
                from, to, before, after
            ),
            CoverageIssue::Overlap {
                first,
                second,
                from,
                to,
            } => write!(
                f,
                "zones '{}' and '{}' overlap on lux {}..{} ('{}' wins)",
                first, second, from, to, first
            ),
        }
    }
}

/// Ordered, non-empty list of validated zones.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    /// Validate and wrap zones. Order is preserved; selection is first-match.
    pub fn new(zones: Vec<Zone>) -> Result<Self, ZoneError> {
        if zones.is_empty() {
            return Err(ZoneError::Empty);
        }
        for zone in &zones {
            zone.validate()?;
        }
        Ok(Self { zones })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    // A ZoneSet is never empty; provided for clippy's len_without_is_empty.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn last_index(&self) -> usize {
        self.zones.len() - 1
    }

    /// The fallback zone for lux values no zone contains.
    pub fn last(&self) -> &Zone {
        &self.zones[self.last_index()]
    }

    /// Gaps and overlaps between consecutive zones, in configuration order.
    ///
    /// These are not errors: first-match-else-last selection is well defined for
    /// any layout. The config loader reports them as warnings.
    pub fn coverage_issues(&self) -> Vec<CoverageIssue> {
        self.zones
            .windows(2)
            .filter_map(|pair| {
                let (a, b) = (&pair[0], &pair[1]);
                if b.lux_min > a.lux_max {
                    Some(CoverageIssue::Gap {
                        before: a.name.clone(),
                        after: b.name.clone(),
                        from: a.lux_max,
                        to: b.lux_min,
                    })
                } else if b.lux_min < a.lux_max {
                    Some(CoverageIssue::Overlap {
                        first: a.name.clone(),
                        second: b.name.clone(),
                        from: b.lux_min,
                        to: a.lux_max.min(b.lux_max),
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ZoneSet {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.zones.iter()
    }
}
