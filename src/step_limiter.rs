//! Error-proportional, direction-aware brightness stepping.
//!
//! Each AUTO tick moves the output one step toward the curve target. The step is
//! chosen from the error magnitude (large above `threshold_large`, medium above
//! `threshold_small`, else small) using the step triple for the direction of
//! travel. Dimming has its own, slower triple.
//!
//! When the remaining error fits inside one step the output snaps to the target,
//! so the limiter never oscillates around it.

use std::fmt;

use crate::constants::*;
use crate::zone::{ErrorThresholds, StepSizes, Zone};

/// Direction of travel for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Brightening,
    Dimming,
}

/// Size class chosen for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCategory {
    None,
    Small(Direction),
    Medium(Direction),
    Large(Direction),
}

impl StepCategory {
    /// Stable label used in logs and status output, e.g. `large_up`.
    pub fn as_str(&self) -> &'static str {
        use Direction::*;
        match self {
            StepCategory::None => "none",
            StepCategory::Small(Brightening) => "small_up",
            StepCategory::Small(Dimming) => "small_down",
            StepCategory::Medium(Brightening) => "medium_up",
            StepCategory::Medium(Dimming) => "medium_down",
            StepCategory::Large(Brightening) => "large_up",
            StepCategory::Large(Dimming) => "large_down",
        }
    }
}

impl fmt::Display for StepCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the limiter decided for one tick. Read-only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDiagnostic {
    pub target: u8,
    pub current: u8,
    /// `target - current`
    pub error: i16,
    pub step_size: u8,
    pub category: StepCategory,
    pub threshold_large: u8,
    pub threshold_small: u8,
    pub next: u8,
    /// Whether `next` was set to the target because the error fit in one step.
    pub snapped: bool,
}

/// Step triples and thresholds used when no zone is available.
pub fn builtin_tuning(direction: Direction) -> (StepSizes, ErrorThresholds) {
    let up = StepSizes::new(BUILTIN_STEP_LARGE, BUILTIN_STEP_MEDIUM, BUILTIN_STEP_SMALL);
    let steps = match direction {
        Direction::Brightening => up,
        Direction::Dimming => up.halved(),
    };
    let thresholds = ErrorThresholds {
        large: BUILTIN_THRESHOLD_LARGE,
        small: BUILTIN_THRESHOLD_SMALL,
    };
    (steps, thresholds)
}

fn resolve_tuning(zone: Option<&Zone>, direction: Direction) -> (StepSizes, ErrorThresholds) {
    match zone {
        Some(zone) => {
            let steps = match direction {
                Direction::Brightening => zone.step_up,
                Direction::Dimming => zone.step_down,
            };
            (steps, zone.thresholds)
        }
        None => builtin_tuning(direction),
    }
}

/// Compute the next output brightness on the way from `current` to `target`.
pub fn next_brightness(target: u8, current: u8, zone: Option<&Zone>) -> (u8, TransitionDiagnostic) {
    let target = target.min(MAXIMUM_BRIGHTNESS);
    let error = i16::from(target) - i16::from(current);

    if error == 0 {
        let (_, thresholds) = resolve_tuning(zone, Direction::Brightening);
        return (
            current,
            TransitionDiagnostic {
                target,
                current,
                error,
                step_size: 0,
                category: StepCategory::None,
                threshold_large: thresholds.large,
                threshold_small: thresholds.small,
                next: current,
                snapped: false,
            },
        );
    }

    let direction = if error > 0 {
        Direction::Brightening
    } else {
        Direction::Dimming
    };
    let (steps, thresholds) = resolve_tuning(zone, direction);

    let abs_error = error.unsigned_abs();
    let (step_size, category) = if abs_error > u16::from(thresholds.large) {
        (steps.large, StepCategory::Large(direction))
    } else if abs_error > u16::from(thresholds.small) {
        (steps.medium, StepCategory::Medium(direction))
    } else {
        (steps.small, StepCategory::Small(direction))
    };

    let snapped = abs_error <= u16::from(step_size);
    let next = if snapped {
        i16::from(target)
    } else {
        i16::from(current) + error.signum() * i16::from(step_size)
    };
    let next = next.clamp(i16::from(MINIMUM_BRIGHTNESS), i16::from(MAXIMUM_BRIGHTNESS)) as u8;

    (
        next,
        TransitionDiagnostic {
            target,
            current,
            error,
            step_size,
            category,
            threshold_large: thresholds.large,
            threshold_small: thresholds.small,
            next,
            snapped,
        },
    )
}
