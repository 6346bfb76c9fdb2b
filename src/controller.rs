//! One control-loop tick.
//!
//! [`Controller::tick`] is the only place the mode machine, the hysteresis
//! state and the output are mutated. Each tick:
//!
//! 1. applies every pending command in arrival order
//! 2. reverts an expired temporary override to AUTO
//! 3. in AUTO, reads the sensor and chains zone selection, curve mapping and
//!    step limiting into one output write
//! 4. in either manual mode, writes the manual brightness directly
//! 5. hands the resulting [`TickReport`] to the diagnostic sink
//!
//! No failure escapes a tick. A sensor or output error leaves the output at its
//! previous value and is reported in the tick's report.

use std::time::Instant;

use crate::curve::compute_brightness;
use crate::diagnostics::DiagnosticSink;
use crate::logger::Log;
use crate::mode::{Command, ModeChange, ModeStateMachine, OperatingMode};
use crate::output::BrightnessOutput;
use crate::sensor::AmbientSensor;
use crate::step_limiter::{TransitionDiagnostic, next_brightness};
use crate::zone::{CurveKind, ZoneSet};
use crate::zone_selector::{HysteresisState, select_zone};

/// Receives change notifications so mode and brightness can be persisted later.
#[cfg_attr(test, mockall::automock)]
pub trait Persistence {
    fn mark_dirty(&mut self);
}

/// The collaborators a tick reads from and writes to.
pub struct TickIo<'a> {
    pub sensor: &'a mut dyn AmbientSensor,
    pub output: &'a mut dyn BrightnessOutput,
    pub persistence: &'a mut dyn Persistence,
    pub diagnostics: &'a mut dyn DiagnosticSink,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub mode: OperatingMode,
    /// Clamped lux used this tick; `None` outside AUTO or on sensor failure.
    pub lux: Option<f32>,
    pub zone: Option<String>,
    pub curve: Option<CurveKind>,
    /// Output brightness before this tick's write.
    pub previous: u8,
    pub transition: Option<TransitionDiagnostic>,
    /// Brightness written this tick; `None` when the output was held.
    pub applied: Option<u8>,
    pub sensor_error: Option<String>,
    /// Whether the most recent sensor read succeeded.
    pub sensor_healthy: bool,
    pub mode_change: ModeChange,
}

pub struct Controller {
    zones: ZoneSet,
    hysteresis: HysteresisState,
    machine: ModeStateMachine,
    sensor_failing: bool,
    last_lux: Option<f32>,
}

impl Controller {
    pub fn new(zones: ZoneSet, hysteresis_percent: f32, machine: ModeStateMachine) -> Self {
        Self {
            zones,
            hysteresis: HysteresisState::new(hysteresis_percent),
            machine,
            sensor_failing: false,
            last_lux: None,
        }
    }

    pub fn machine(&self) -> &ModeStateMachine {
        &self.machine
    }

    pub fn mode(&self) -> OperatingMode {
        self.machine.mode()
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Name of the zone selected most recently, if any.
    pub fn current_zone(&self) -> Option<&str> {
        self.hysteresis
            .current
            .and_then(|index| self.zones.get(index))
            .map(|zone| zone.name.as_str())
    }

    /// Most recent successful lux reading (after clamping).
    pub fn last_lux(&self) -> Option<f32> {
        self.last_lux
    }

    pub fn tick(&mut self, commands: Vec<Command>, now: Instant, io: &mut TickIo<'_>) -> TickReport {
        let mut change = self.machine.apply_all(commands, now);
        change.merge(self.machine.check_auto_resume(now));

        let mut report = TickReport {
            mode: self.machine.mode(),
            previous: io.output.current_brightness(),
            ..TickReport::default()
        };

        let mut dirty = change.any();
        match self.machine.mode() {
            OperatingMode::Auto => dirty |= self.tick_auto(io, &mut report),
            OperatingMode::Manual | OperatingMode::ManualTemporary => {
                let value = self.machine.manual_brightness();
                match io.output.set_brightness(value) {
                    Ok(()) => report.applied = Some(value),
                    Err(e) => Log::log_warning(&format!(
                        "Failed to apply manual brightness {}%: {}",
                        value, e
                    )),
                }
            }
        }

        if dirty {
            io.persistence.mark_dirty();
        }

        report.sensor_healthy = !self.sensor_failing;
        report.mode_change = change;
        io.diagnostics.record(&report);
        report
    }

    /// AUTO branch of a tick. Returns whether persisted state changed.
    fn tick_auto(&mut self, io: &mut TickIo<'_>, report: &mut TickReport) -> bool {
        let lux = match io.sensor.read_lux() {
            Ok(lux) => {
                if self.sensor_failing {
                    Log::log_info(&format!("Sensor '{}' recovered", io.sensor.sensor_name()));
                    self.sensor_failing = false;
                }
                if lux < 0.0 {
                    Log::log_trace(&format!("Negative lux {} clamped to 0", lux));
                }
                // f32::max also maps NaN to 0
                lux.max(0.0)
            }
            Err(e) => {
                if !self.sensor_failing {
                    Log::log_warning(&format!("Sensor read failed, holding output: {}", e));
                    self.sensor_failing = true;
                } else {
                    Log::log_debug(&format!("Sensor still failing: {}", e));
                }
                report.sensor_error = Some(e.to_string());
                return false;
            }
        };

        self.last_lux = Some(lux);
        report.lux = Some(lux);

        let zone = select_zone(&self.zones, lux, &mut self.hysteresis);
        let target = compute_brightness(lux, zone);
        let (next, diagnostic) = next_brightness(target, report.previous, Some(zone));

        report.zone = Some(zone.name.clone());
        report.curve = Some(zone.curve);
        report.transition = Some(diagnostic);

        match io.output.set_brightness(next) {
            Ok(()) => {
                report.applied = Some(next);
                self.machine.record_auto_brightness(next)
            }
            Err(e) => {
                Log::log_warning(&format!("Failed to apply brightness {}%: {}", next, e));
                false
            }
        }
    }
}
