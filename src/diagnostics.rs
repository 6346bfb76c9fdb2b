//! Per-tick diagnostic records.
//!
//! The controller hands every [`TickReport`] to a [`DiagnosticSink`]. Sinks are
//! pure consumers; nothing they do feeds back into control decisions.
//!
//! [`LogSink`] writes through the logger. [`CsvSink`] records one row per tick
//! for offline analysis of zone and step behavior.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::constants::*;
use crate::controller::TickReport;
use crate::logger::{Log, LogLevel};
use crate::mode::OperatingMode;

#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink {
    fn record(&mut self, report: &TickReport);

    /// Push buffered records to their destination.
    fn flush(&mut self) {}
}

/// Forwards every report to each sink in order.
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn DiagnosticSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DiagnosticSink for SinkChain {
    fn record(&mut self, report: &TickReport) {
        for sink in &mut self.sinks {
            sink.record(report);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}

/// Writes one line per tick through the logger.
///
/// AUTO ticks are logged at debug level, manual ticks at trace level, so a
/// daemon running at `info` stays quiet between mode changes.
#[derive(Debug, Default)]
pub struct LogSink {
    last_zone: Option<String>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Render a report as a single `key=value` line.
pub fn format_report(report: &TickReport) -> String {
    let mut line = format!("mode={}", report.mode);

    match report.lux {
        Some(lux) => line.push_str(&format!(" lux={:.1}", lux)),
        None => line.push_str(" lux=-"),
    }
    if let Some(zone) = &report.zone {
        line.push_str(&format!(" zone={}", zone));
    }
    if let Some(diag) = &report.transition {
        line.push_str(&format!(
            " target={} current={} error={} step={} category={} thresholds={}/{} next={}",
            diag.target,
            diag.current,
            diag.error,
            diag.step_size,
            diag.category,
            diag.threshold_large,
            diag.threshold_small,
            diag.next
        ));
    }
    match report.applied {
        Some(value) => line.push_str(&format!(" applied={}", value)),
        None => line.push_str(" applied=held"),
    }
    if let Some(error) = &report.sensor_error {
        line.push_str(&format!(" sensor_error=\"{}\"", error));
    }
    line
}

impl DiagnosticSink for LogSink {
    fn record(&mut self, report: &TickReport) {
        if report.zone.is_some() && report.zone != self.last_zone {
            if let Some(zone) = &report.zone {
                Log::log_info(&format!("Entered zone '{}'", zone));
            }
            self.last_zone = report.zone.clone();
        }

        let level = match report.mode {
            OperatingMode::Auto => LogLevel::Debug,
            OperatingMode::Manual | OperatingMode::ManualTemporary => LogLevel::Trace,
        };
        if Log::enabled_for(level) {
            Log::log(level, &format_report(report));
        }
    }
}

pub const CSV_HEADER: &str = "timestamp,seq,lux,zone,zone_changed,curve,\
target_brightness,current_brightness,previous_brightness,error,step_category,step_size,\
step_threshold_large,step_threshold_small,brightness_change,mode,sensor_healthy";

/// Quote a field when it contains a comma or a quote.
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render one CSV row. Returns `None` for AUTO ticks that never reached the
/// step limiter (sensor failure).
pub fn format_csv_row(
    report: &TickReport,
    timestamp: f64,
    seq: u64,
    zone_changed: bool,
) -> Option<String> {
    let lux = report.lux.map(|lux| format!("{:.1}", lux)).unwrap_or_default();
    let flag = |value: bool| if value { "1" } else { "0" };

    let row = match report.mode {
        OperatingMode::Auto => {
            let diag = report.transition.as_ref()?;
            let zone = report.zone.as_deref().unwrap_or_default();
            let curve = report.curve.map(|curve| curve.as_str()).unwrap_or_default();
            format!(
                "{:.3},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                timestamp,
                seq,
                lux,
                escape_csv(zone),
                flag(zone_changed),
                curve,
                diag.target,
                diag.current,
                report.previous,
                diag.error,
                diag.category,
                diag.step_size,
                diag.threshold_large,
                diag.threshold_small,
                i16::from(diag.next) - i16::from(report.previous),
                report.mode,
                flag(report.sensor_healthy)
            )
        }
        OperatingMode::Manual | OperatingMode::ManualTemporary => {
            let target = report.applied.unwrap_or(report.previous);
            format!(
                "{:.3},{},{},manual,0,manual,{},{},{},0,manual,0,0,0,{},{},{}",
                timestamp,
                seq,
                lux,
                target,
                report.previous,
                report.previous,
                i16::from(target) - i16::from(report.previous),
                report.mode,
                flag(report.sensor_healthy)
            )
        }
    };
    Some(row)
}

/// Appends one CSV row per tick to a file.
///
/// Rows are buffered and flushed every [`CSV_BUFFER_ROWS`] rows or
/// [`CSV_FLUSH_INTERVAL_SECS`], whichever comes first. The header is flushed
/// as soon as the file is created.
pub struct CsvSink {
    writer: BufWriter<File>,
    path: PathBuf,
    started: Instant,
    last_flush: Instant,
    seq: u64,
    pending: usize,
    last_zone: Option<String>,
    failed: bool,
}

impl CsvSink {
    /// Create (or truncate) the CSV file and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV log {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER).context("Failed to write CSV header")?;
        writer.flush().context("Failed to flush CSV header")?;

        let now = Instant::now();
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            started: now,
            last_flush: now,
            seq: 0,
            pending: 0,
            last_zone: None,
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn warn_once(&mut self, e: std::io::Error) {
        if !self.failed {
            Log::log_warning(&format!(
                "Failed to write CSV log {}: {}",
                self.path.display(),
                e
            ));
            self.failed = true;
        }
    }
}

impl DiagnosticSink for CsvSink {
    fn record(&mut self, report: &TickReport) {
        let zone_changed = report.zone.is_some() && report.zone != self.last_zone;
        let timestamp = self.started.elapsed().as_secs_f64();
        let Some(row) = format_csv_row(report, timestamp, self.seq, zone_changed) else {
            return;
        };
        if report.zone.is_some() {
            self.last_zone = report.zone.clone();
        }
        self.seq += 1;

        if let Err(e) = writeln!(self.writer, "{}", row) {
            self.warn_once(e);
            return;
        }
        self.pending += 1;

        if self.pending >= CSV_BUFFER_ROWS
            || self.last_flush.elapsed() >= Duration::from_secs(CSV_FLUSH_INTERVAL_SECS)
        {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.warn_once(e);
        }
        Log::log_trace(&format!("Flushed {} CSV rows", self.pending));
        self.pending = 0;
        self.last_flush = Instant::now();
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if self.pending > 0 {
            self.flush();
        }
    }
}
