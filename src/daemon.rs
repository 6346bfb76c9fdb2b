//! Runtime wiring for the brightness daemon.
//!
//! [`Runtime`] owns the devices, the controller, the state store and the
//! command queue, and performs one loop iteration per [`Runtime::step`].
//! [`run`] adds the process-level concerns around it: the instance lock, the
//! control socket, signal handling and the fixed-period sleep.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::command::{CommandQueue, CommandSender};
use crate::config::Config;
use crate::constants::*;
use crate::control::{ConfigSummary, ControlContext, ControlServer, SharedStatus, StatusSnapshot};
use crate::controller::{Controller, TickIo, TickReport};
use crate::diagnostics::{CsvSink, DiagnosticSink, LogSink, SinkChain};
use crate::logger::Log;
use crate::mode::{ModeStateMachine, OperatingMode};
use crate::output::{BrightnessOutput, create_output};
use crate::sensor::{AmbientSensor, create_sensor};
use crate::signals::{SignalState, setup_signal_handler};
use crate::state::StateStore;

const CHECK_INTERVAL: Duration = Duration::from_millis(CHECK_INTERVAL_MS);

/// Default location of the instance lock file.
pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join(LOCK_FILE_NAME)
}

/// Exclusive lock ensuring a single process drives the output device.
///
/// The lock file holds the owner's PID. It is opened without truncation so a
/// second process never wipes the owner's PID before failing to lock.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            let mut owner = String::new();
            let _ = file.read_to_string(&mut owner);
            let owner = owner.trim();
            if owner.is_empty() {
                anyhow::bail!("Another instance of dimmerd is already running");
            }
            anyhow::bail!("Another instance of dimmerd is already running (PID {})", owner);
        }

        file.set_len(0).context("Failed to truncate lock file")?;
        file.seek(SeekFrom::Start(0))
            .context("Failed to rewind lock file")?;
        writeln!(file, "{}", std::process::id()).context("Failed to write PID to lock file")?;
        file.flush().context("Failed to flush lock file")?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock and remove the lock file.
    pub fn release(self) {
        // Remove before unlocking so a waiting process never sees our stale PID
        if let Err(e) = fs::remove_file(&self.path) {
            Log::log_decorated(&format!("Warning: Failed to remove lock file: {}", e));
        }
        drop(self.file);
    }
}

/// Devices, controller and persistence for one daemon instance.
pub struct Runtime {
    controller: Controller,
    sensor: Box<dyn AmbientSensor>,
    output: Box<dyn BrightnessOutput>,
    store: StateStore,
    sink: SinkChain,
    queue: CommandQueue,
    status: SharedStatus,
    save_interval: Duration,
    last_save: Instant,
}

impl Runtime {
    /// Build the runtime from a validated config.
    ///
    /// Restores the persisted mode; when it is MANUAL the manual brightness is
    /// applied before the first tick.
    pub fn new(config: &Config) -> Result<(Self, CommandSender)> {
        let zones = config.zone_set()?;

        let store = StateStore::new(config.state_file());
        let persisted = store.load();
        let machine = ModeStateMachine::restore(
            persisted.operating_mode(),
            persisted.manual_brightness,
            persisted.last_auto_brightness,
            config.auto_resume_timeout(),
        );

        let sensor = create_sensor(&config.sensor).context("Failed to create sensor")?;
        let mut output = create_output(&config.output).context("Failed to create output")?;

        Log::log_block_start(&format!(
            "Starting in {} mode (manual {}%, last auto {}%)",
            machine.mode(),
            machine.manual_brightness(),
            machine.last_auto_brightness()
        ));
        if machine.mode() == OperatingMode::Manual {
            let value = machine.manual_brightness();
            match output.set_brightness(value) {
                Ok(()) => Log::log_decorated(&format!("Restored manual brightness {}%", value)),
                Err(e) => Log::log_warning(&format!(
                    "Failed to restore manual brightness {}%: {}",
                    value, e
                )),
            }
        }

        let (sender, queue) = CommandQueue::bounded(config.command_queue_capacity());
        let status = Arc::new(Mutex::new(StatusSnapshot {
            mode: machine.mode(),
            brightness: output.current_brightness(),
            manual_brightness: machine.manual_brightness(),
            last_auto_brightness: machine.last_auto_brightness(),
            ..StatusSnapshot::default()
        }));

        let runtime = Self {
            controller: Controller::new(zones, config.hysteresis_percent(), machine),
            sensor,
            output,
            store,
            sink: {
                let mut sink = SinkChain::new();
                sink.push(Box::new(LogSink::new()));
                sink
            },
            queue,
            status,
            save_interval: config.state_save_interval(),
            last_save: Instant::now(),
        };
        Ok((runtime, sender))
    }

    /// Send every tick report to `sink` as well.
    pub fn add_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.sink.push(sink);
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    pub fn current_brightness(&self) -> u8 {
        self.output.current_brightness()
    }

    /// One loop iteration: drain commands, tick, publish status, save if due.
    pub fn step(&mut self, now: Instant) -> TickReport {
        let commands = self.queue.drain();
        let report = {
            let mut io = TickIo {
                sensor: self.sensor.as_mut(),
                output: self.output.as_mut(),
                persistence: &mut self.store,
                diagnostics: &mut self.sink,
            };
            self.controller.tick(commands, now, &mut io)
        };

        self.publish_status(now);

        if self.store.is_dirty() && now.saturating_duration_since(self.last_save) >= self.save_interval
        {
            self.save_state();
            self.last_save = now;
        }

        report
    }

    fn publish_status(&self, now: Instant) {
        let machine = self.controller.machine();
        let snapshot = StatusSnapshot {
            mode: machine.mode(),
            brightness: self.output.current_brightness(),
            lux: self.controller.last_lux(),
            zone: self.controller.current_zone().map(str::to_string),
            manual_brightness: machine.manual_brightness(),
            last_auto_brightness: machine.last_auto_brightness(),
            auto_resume_remaining: machine.resume_remaining(now),
        };
        match self.status.lock() {
            Ok(mut status) => *status = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn save_state(&mut self) {
        let context = *self.controller.machine().context();
        if let Err(e) = self.store.save(&context) {
            // Stays dirty, so the next interval retries
            Log::log_warning(&format!("Failed to save state: {:#}", e));
        }
    }

    /// Flush pending state before exit.
    pub fn shutdown(&mut self) {
        self.sink.flush();
        if self.store.is_dirty() {
            Log::log_decorated(&format!(
                "Saving state to {}",
                self.store.path().display()
            ));
            self.save_state();
        }
    }
}

/// Sleep up to `duration`, returning early once `keep_running` reports false.
fn sleep_while(duration: Duration, keep_running: impl Fn() -> bool) {
    let mut slept = Duration::ZERO;
    while slept < duration && keep_running() {
        let sleep_chunk = CHECK_INTERVAL.min(duration - slept);
        thread::sleep(sleep_chunk);
        slept += sleep_chunk;
    }
}

/// Start the configured control endpoints. Failures are logged and the
/// endpoint is skipped.
fn start_control(config: &Config, context: ControlContext) -> Vec<ControlServer> {
    let mut servers = Vec::new();

    match config.socket_path() {
        Some(path) => match ControlServer::start(&path, context.clone()) {
            Ok(server) => servers.push(server),
            Err(e) => Log::log_warning(&format!("Control socket unavailable: {:#}", e)),
        },
        None => Log::log_decorated("Control socket disabled"),
    }

    if let Some(addr) = config.tcp_listen() {
        match ControlServer::start_tcp(addr, context) {
            Ok(server) => servers.push(server),
            Err(e) => Log::log_warning(&format!("TCP control unavailable: {:#}", e)),
        }
    }

    servers
}

/// Run the daemon until a shutdown signal arrives.
///
/// With `csv_log` set, every tick is also recorded to that CSV file.
pub fn run(config: &Config, csv_log: Option<&Path>) -> Result<()> {
    run_with_signals(config, csv_log, setup_signal_handler)
}

/// [`run`] with the signal listener supplied by `signals`. Whatever happens
/// after the lock is taken, the lock file and socket file are removed.
fn run_with_signals(
    config: &Config,
    csv_log: Option<&Path>,
    signals: impl FnOnce() -> Result<SignalState>,
) -> Result<()> {
    let lock = InstanceLock::acquire(&lock_path())?;
    Log::log_decorated(&format!(
        "Lock acquired at {}, starting dimmerd...",
        lock.path().display()
    ));

    let (mut runtime, sender) = match Runtime::new(config) {
        Ok(parts) => parts,
        Err(e) => {
            lock.release();
            return Err(e);
        }
    };

    if let Some(path) = csv_log {
        match CsvSink::create(path) {
            Ok(sink) => {
                Log::log_decorated(&format!("CSV logging enabled to {}", path.display()));
                runtime.add_sink(Box::new(sink));
            }
            Err(e) => Log::log_warning(&format!("CSV logging disabled: {:#}", e)),
        }
    }

    let context = ControlContext {
        sender,
        status: runtime.status(),
        config: Arc::new(ConfigSummary::from(config)),
    };
    let servers = start_control(config, context);

    let result = signals().map(|signal_state| {
        let interval = config.update_interval();
        while signal_state.poll() {
            let started = Instant::now();
            runtime.step(started);

            let remaining = interval.saturating_sub(started.elapsed());
            sleep_while(remaining, || signal_state.running.load(Ordering::SeqCst));
        }
        Log::log_block_start("Shutting down dimmerd...");
    });

    runtime.shutdown();
    for server in &servers {
        server.cleanup();
    }
    lock.release();
    if result.is_ok() {
        Log::log_end();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use tempfile::tempdir;

    struct Scratch {
        dir: tempfile::TempDir,
        config: Config,
    }

    fn scratch() -> Scratch {
        let dir = tempdir().unwrap();
        let config = Config::parse(&format!(
            r#"
[control]
state_file = "{root}/state.toml"
socket_path = "{root}/dimmerd.sock"

[sensor]
path = "{root}/lux"

[output]
path = "{root}/brightness"

[[zones]]
name = "all"
lux_range = [0.0, 1000.0]
brightness_range = [10, 100]
"#,
            root = dir.path().display()
        ))
        .unwrap();
        Scratch { dir, config }
    }

    /// Point the lock file into `dir` for the duration of `f`.
    fn with_runtime_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let original = std::env::var("XDG_RUNTIME_DIR").ok();
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", dir);
        }
        let result = f();
        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
                None => std::env::remove_var("XDG_RUNTIME_DIR"),
            }
        }
        result
    }

    #[test]
    #[serial]
    fn test_signal_setup_failure_releases_lock_and_socket() {
        let scratch = scratch();
        let root = scratch.dir.path();

        let result = with_runtime_dir(root, || {
            run_with_signals(&scratch.config, None, || {
                Err(anyhow::anyhow!("signal registration failed"))
            })
        });

        let err = result.unwrap_err();
        assert!(err.to_string().contains("signal registration failed"));
        assert!(!root.join(LOCK_FILE_NAME).exists());
        assert!(!root.join("dimmerd.sock").exists());
    }

    #[test]
    #[serial]
    fn test_stopped_run_cleans_up_and_writes_csv_header() {
        let scratch = scratch();
        let root = scratch.dir.path();
        let csv = root.join("ticks.csv");

        with_runtime_dir(root, || {
            run_with_signals(&scratch.config, Some(&csv), || {
                let (_sender, receiver) = mpsc::channel();
                Ok(SignalState {
                    running: Arc::new(AtomicBool::new(false)),
                    signal_receiver: receiver,
                })
            })
        })
        .unwrap();

        assert!(!root.join(LOCK_FILE_NAME).exists());
        assert!(!root.join("dimmerd.sock").exists());
        let content = fs::read_to_string(&csv).unwrap();
        assert!(content.starts_with("timestamp,seq,lux"));
    }

    #[test]
    fn test_sleep_while_stops_early() {
        let start = Instant::now();
        sleep_while(Duration::from_secs(5), || false);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
