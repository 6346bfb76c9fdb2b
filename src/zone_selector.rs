//! Zone selection with boundary hysteresis.
//!
//! Selection is a pure function over the zone set and an explicit
//! [`HysteresisState`] owned by the caller. When hysteresis is enabled and a zone
//! is already active, the active zone is kept while lux stays inside its range
//! widened by `percent` of each bound:
//!
//! ```text
//! [lux_min - lux_min * pct/100, lux_max + lux_max * pct/100)
//! ```
//!
//! Outside that band (or with no active zone) the zones are scanned in order and
//! the first containing zone wins; if none contains the lux the last zone is used.

use crate::zone::{Zone, ZoneSet};

/// The active zone plus the hysteresis setting, threaded through each selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisState {
    /// Index into the zone set; `None` before the first selection.
    pub current: Option<usize>,
    /// Band widening in percent. `0` disables hysteresis.
    pub percent: f32,
}

impl HysteresisState {
    pub fn new(percent: f32) -> Self {
        Self {
            current: None,
            percent: percent.max(0.0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.percent > 0.0
    }

    /// Forget the active zone so the next selection scans from scratch.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Pick the zone for `lux`, updating `state.current`.
///
/// `lux` is expected to be non-negative; the controller clamps readings first.
pub fn select_zone<'z>(zones: &'z ZoneSet, lux: f32, state: &mut HysteresisState) -> &'z Zone {
    if state.is_enabled() {
        if let Some(zone) = state.current.and_then(|index| zones.get(index)) {
            if within_hysteresis_band(zone, lux, state.percent) {
                return zone;
            }
        }
    }

    let (index, zone) = zones
        .iter()
        .enumerate()
        .find(|(_, zone)| zone.contains(lux))
        .unwrap_or_else(|| (zones.last_index(), zones.last()));
    state.current = Some(index);
    zone
}

fn within_hysteresis_band(zone: &Zone, lux: f32, percent: f32) -> bool {
    let margin_lower = zone.lux_min * percent / 100.0;
    let margin_upper = zone.lux_max * percent / 100.0;
    lux >= zone.lux_min - margin_lower && lux < zone.lux_max + margin_upper
}
