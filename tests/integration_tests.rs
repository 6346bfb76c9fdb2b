use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::tempdir;

use dimmerd::daemon::Runtime;
use dimmerd::mode::{Command, OperatingMode, RequestedMode};
use dimmerd::{Config, TickReport};

struct Bench {
    _dir: tempfile::TempDir,
    lux_path: PathBuf,
    output_path: PathBuf,
    state_path: PathBuf,
    config: Config,
}

fn bench_with_state(state: Option<&str>) -> Bench {
    let dir = tempdir().unwrap();
    let lux_path = dir.path().join("lux");
    let output_path = dir.path().join("brightness");
    let state_path = dir.path().join("state").join("state.toml");

    fs::write(&output_path, "20\n").unwrap();
    if let Some(state) = state {
        fs::create_dir_all(state_path.parent().unwrap()).unwrap();
        fs::write(&state_path, state).unwrap();
    }

    let config = Config::parse(&format!(
        r#"
[control]
update_interval_ms = 100
auto_resume_timeout_sec = 60
state_file = "{state}"
state_save_interval_sec = 5
socket_path = ""

[sensor]
type = "file"
path = "{lux}"

[output]
type = "file"
path = "{output}"
value_range = [0, 100]

[[zones]]
name = "night"
lux_range = [0.0, 10.0]
brightness_range = [5, 30]

[[zones]]
name = "day"
lux_range = [10.0, 100.0]
brightness_range = [30, 100]
"#,
        state = state_path.display(),
        lux = lux_path.display(),
        output = output_path.display(),
    ))
    .unwrap();

    Bench {
        _dir: dir,
        lux_path,
        output_path,
        state_path,
        config,
    }
}

fn bench() -> Bench {
    bench_with_state(None)
}

fn set_lux(bench: &Bench, lux: f32) {
    fs::write(&bench.lux_path, format!("{}\n", lux)).unwrap();
}

fn written_value(path: &Path) -> u32 {
    fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

fn run_ticks(runtime: &mut Runtime, start: Instant, ticks: u32) -> TickReport {
    let mut report = TickReport::default();
    for i in 0..ticks {
        report = runtime.step(start + Duration::from_millis(100 * u64::from(i)));
    }
    report
}

#[test]
fn test_integration_auto_converges_to_curve_target() {
    let bench = bench();
    set_lux(&bench, 50.0);
    let (mut runtime, _sender) = Runtime::new(&bench.config).unwrap();

    let start = Instant::now();
    let first = runtime.step(start);
    // 20 -> target 61, error 41 above the large threshold
    assert_eq!(first.applied, Some(30));
    assert_eq!(first.zone.as_deref(), Some("day"));
    assert_eq!(written_value(&bench.output_path), 30);

    let report = run_ticks(&mut runtime, start, 30);
    assert_eq!(report.applied, Some(61));
    assert_eq!(written_value(&bench.output_path), 61);
    assert_eq!(runtime.controller().machine().last_auto_brightness(), 61);
}

#[test]
fn test_integration_dimming_into_night_zone() {
    let bench = bench();
    set_lux(&bench, 2.0);
    let (mut runtime, _sender) = Runtime::new(&bench.config).unwrap();

    let report = run_ticks(&mut runtime, Instant::now(), 40);
    // 5 + trunc(0.2 * 25) = 10
    assert_eq!(report.zone.as_deref(), Some("night"));
    assert_eq!(written_value(&bench.output_path), 10);
}

#[test]
fn test_integration_sensor_failure_holds_output() {
    let bench = bench();
    set_lux(&bench, 50.0);
    let (mut runtime, _sender) = Runtime::new(&bench.config).unwrap();
    let start = Instant::now();
    runtime.step(start);
    assert_eq!(written_value(&bench.output_path), 30);

    fs::write(&bench.lux_path, "not a number\n").unwrap();
    let report = run_ticks(&mut runtime, start, 5);
    assert!(report.sensor_error.is_some());
    assert_eq!(report.applied, None);
    assert_eq!(written_value(&bench.output_path), 30);

    set_lux(&bench, 50.0);
    let report = runtime.step(start + Duration::from_secs(1));
    assert_eq!(report.applied, Some(40));
}

#[test]
fn test_integration_temporary_override_and_auto_resume() {
    let bench = bench();
    set_lux(&bench, 50.0);
    let (mut runtime, sender) = Runtime::new(&bench.config).unwrap();
    let start = Instant::now();

    sender.try_send(Command::SetBrightness(85)).unwrap();
    let report = runtime.step(start);
    assert_eq!(report.mode, OperatingMode::ManualTemporary);
    assert_eq!(written_value(&bench.output_path), 85);

    let status = runtime.status();
    let remaining = status.lock().unwrap().auto_resume_remaining;
    assert_eq!(remaining, Some(Duration::from_secs(60)));

    let report = runtime.step(start + Duration::from_secs(59));
    assert_eq!(report.mode, OperatingMode::ManualTemporary);

    let report = runtime.step(start + Duration::from_secs(60));
    assert_eq!(report.mode, OperatingMode::Auto);
    // Stepping resumes from 85 toward the target of 61: error -24 takes a medium dimming step
    assert_eq!(report.applied, Some(83));
    assert_eq!(status.lock().unwrap().auto_resume_remaining, None);
}

#[test]
fn test_integration_command_burst_applies_in_order() {
    let bench = bench();
    set_lux(&bench, 50.0);
    let (mut runtime, sender) = Runtime::new(&bench.config).unwrap();

    sender.try_send(Command::SetMode(RequestedMode::Manual)).unwrap();
    sender.try_send(Command::SetBrightness(40)).unwrap();
    sender.try_send(Command::AdjustBrightness(15)).unwrap();
    let report = runtime.step(Instant::now());

    assert_eq!(report.mode, OperatingMode::Manual);
    assert_eq!(report.applied, Some(55));
    assert_eq!(written_value(&bench.output_path), 55);
}

#[test]
fn test_integration_state_is_saved_on_interval_and_shutdown() {
    let bench = bench();
    set_lux(&bench, 50.0);
    let (mut runtime, sender) = Runtime::new(&bench.config).unwrap();
    let start = Instant::now();

    sender.try_send(Command::SetMode(RequestedMode::Manual)).unwrap();
    sender.try_send(Command::SetBrightness(70)).unwrap();
    runtime.step(start);
    // Save interval has not elapsed yet
    assert!(!bench.state_path.exists());

    runtime.step(start + Duration::from_secs(6));
    let saved = fs::read_to_string(&bench.state_path).unwrap();
    assert!(saved.contains("mode = \"manual\""));
    assert!(saved.contains("manual_brightness = 70"));

    sender.try_send(Command::AdjustBrightness(-20)).unwrap();
    runtime.step(start + Duration::from_secs(7));
    runtime.shutdown();
    let saved = fs::read_to_string(&bench.state_path).unwrap();
    assert!(saved.contains("manual_brightness = 50"));
}

#[test]
fn test_integration_manual_mode_restored_at_startup() {
    let bench = bench_with_state(Some(
        "version = 1\nmode = \"manual\"\nmanual_brightness = 70\nlast_auto_brightness = 33\n",
    ));
    let (mut runtime, _sender) = Runtime::new(&bench.config).unwrap();

    // Applied before the first tick, without a sensor reading
    assert_eq!(written_value(&bench.output_path), 70);
    assert_eq!(runtime.current_brightness(), 70);

    let report = runtime.step(Instant::now());
    assert_eq!(report.mode, OperatingMode::Manual);
    assert_eq!(report.lux, None);
    assert_eq!(report.applied, Some(70));
}

#[test]
fn test_integration_temporary_mode_restarts_in_auto() {
    let bench = bench_with_state(Some(
        "version = 1\nmode = \"manual_temporary\"\nmanual_brightness = 90\nlast_auto_brightness = 33\n",
    ));
    set_lux(&bench, 50.0);
    let (mut runtime, _sender) = Runtime::new(&bench.config).unwrap();

    assert_eq!(runtime.controller().mode(), OperatingMode::Auto);
    assert_eq!(written_value(&bench.output_path), 20);
    let report = runtime.step(Instant::now());
    assert_eq!(report.mode, OperatingMode::Auto);
    assert_eq!(report.applied, Some(30));
}
