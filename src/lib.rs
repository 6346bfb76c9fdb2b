//! # dimmerd
//!
//! An ambient-light driven display brightness daemon.
//!
//! Lux readings are mapped to a target brightness through configurable zones,
//! and the output is stepped toward that target with asymmetric, error-scaled
//! step sizes. A control socket lets users take over brightness permanently or
//! temporarily, with automatic return to ambient control.
//!
//! ## Architecture
//!
//! - **zone**, **curve**, **zone_selector**, **step_limiter**: the brightness pipeline
//! - **mode**: operating mode state machine and control commands
//! - **controller**: one control-loop tick over the pipeline and the mode machine
//! - **command**: bounded command queue between the control socket and the loop
//! - **sensor**, **output**: device capability traits and their implementations
//! - **state**: persisted mode and brightness
//! - **diagnostics**: per-tick diagnostic records
//! - **control**: Unix-socket JSON control interface
//! - **config**: configuration loading, validation, and default generation
//! - **daemon**, **signals**, **args**: process runtime
//! - **constants**, **logger**: defaults, limits and structured logging

pub mod args;
pub mod command;
pub mod config;
pub mod constants;
pub mod control;
pub mod controller;
pub mod curve;
pub mod daemon;
pub mod diagnostics;
pub mod logger;
pub mod mode;
pub mod output;
pub mod sensor;
pub mod signals;
pub mod state;
pub mod step_limiter;
pub mod zone;
pub mod zone_selector;

// Re-export important types for easier access
pub use config::Config;
pub use controller::{Controller, TickIo, TickReport};
pub use curve::compute_brightness;
pub use logger::{Log, LogLevel};
pub use mode::{Command, ModeStateMachine, OperatingMode, RequestedMode};
pub use step_limiter::{StepCategory, TransitionDiagnostic, next_brightness};
pub use zone::{CurveKind, Zone, ZoneSet};
pub use zone_selector::{HysteresisState, select_zone};
