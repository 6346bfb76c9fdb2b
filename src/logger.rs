//! Structured logging system with visual formatting.
//!
//! This module provides the logging facade used across dimmerd. It includes
//! level-prefixed lines with a runtime minimum level, and formatting helpers
//! for the structured block output printed at startup and shutdown.
//!
//! The logger supports runtime enable/disable functionality for quiet operation
//! during automated processes or testing.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static MINIMUM_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Log level enumeration for categorizing message importance.
///
/// Variants are ordered by severity so a minimum level can filter everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0, // Per-tick control loop detail
    Debug = 1, // Diagnostic records and collaborator chatter
    Info = 2,  // Informational messages (status updates, mode changes)
    Warn = 3,  // Warning messages (non-fatal issues)
    Err = 4,   // Error messages (recoverable failures)
    Crit = 5,  // Critical errors (may require user intervention)
}

impl LogLevel {
    /// Parse a config/CLI level name. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" | "err" => Some(LogLevel::Err),
            "critical" | "crit" => Some(LogLevel::Crit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Err => "error",
            LogLevel::Crit => "critical",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Trace => "[TRACE] ",
            LogLevel::Debug => "[DEBUG] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Err => "[ERR] ",
            LogLevel::Crit => "[CRIT] ",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Err,
            _ => LogLevel::Crit,
        }
    }
}

/// Main logging interface providing structured output formatting.
pub struct Log;

impl Log {
    /// Enable or disable logging temporarily.
    ///
    /// This is useful for quiet operation during automated processes
    /// or testing where log output would interfere with results.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Set the minimum level that will be printed.
    pub fn set_level(level: LogLevel) {
        MINIMUM_LEVEL.store(level as u8, Ordering::SeqCst);
    }

    pub fn level() -> LogLevel {
        LogLevel::from_u8(MINIMUM_LEVEL.load(Ordering::SeqCst))
    }

    /// Whether a message at `level` would currently be printed.
    pub fn enabled_for(level: LogLevel) -> bool {
        Self::is_enabled() && level >= Self::level()
    }

    /// Main log function with level-based prefixes.
    ///
    /// # Arguments
    /// * `level` - LogLevel indicating message importance
    /// * `message` - Text content to log
    pub fn log(level: LogLevel, message: &str) {
        if !Self::enabled_for(level) {
            return;
        }

        // Warnings and errors go to stderr so they survive stdout redirection
        if level >= LogLevel::Warn {
            eprintln!("{}{}", level.prefix(), message);
        } else {
            println!("{}{}", level.prefix(), message);
        }
    }

    // ═══ Convenience Methods for Common Log Levels ═══

    pub fn log_trace(message: &str) {
        Self::log(LogLevel::Trace, message);
    }

    pub fn log_debug(message: &str) {
        Self::log(LogLevel::Debug, message);
    }

    pub fn log_info(message: &str) {
        Self::log(LogLevel::Info, message);
    }

    pub fn log_warning(message: &str) {
        Self::log(LogLevel::Warn, message);
    }

    pub fn log_error(message: &str) {
        Self::log(LogLevel::Err, message);
    }

    pub fn log_critical(message: &str) {
        Self::log(LogLevel::Crit, message);
    }

    // ═══ Visual Formatting Functions ═══
    // Structural output is printed at info level

    /// Log a decorated message with visual branching indicator.
    pub fn log_decorated(message: &str) {
        if !Self::enabled_for(LogLevel::Info) {
            return;
        }
        println!("┣ {}", message);
    }

    /// Log an indented message for sub-items or details.
    pub fn log_indented(message: &str) {
        if !Self::enabled_for(LogLevel::Info) {
            return;
        }
        println!("┃   {}", message);
    }

    /// Log a visual pipe separator.
    pub fn log_pipe() {
        if !Self::enabled_for(LogLevel::Info) {
            return;
        }
        println!("┃");
    }

    /// Log a block start message with visual separation.
    ///
    /// Used for major state changes or new operational phases.
    pub fn log_block_start(message: &str) {
        if !Self::enabled_for(LogLevel::Info) {
            return;
        }
        println!("┃");
        println!("┣ {}", message);
    }

    /// Log the application version header.
    pub fn log_version() {
        if !Self::enabled_for(LogLevel::Info) {
            return;
        }
        println!("┏ dimmerd v{} ━━╸", env!("CARGO_PKG_VERSION"));
        println!("┃");
    }

    /// Log the final termination marker.
    pub fn log_end() {
        if !Self::enabled_for(LogLevel::Info) {
            return;
        }
        println!("╹");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level_names() {
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse(" DEBUG "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Err));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Err < LogLevel::Crit);
    }

    #[test]
    #[serial]
    fn test_minimum_level_filters_lower_levels() {
        let original = Log::level();

        Log::set_level(LogLevel::Warn);
        assert!(!Log::enabled_for(LogLevel::Info));
        assert!(Log::enabled_for(LogLevel::Warn));
        assert!(Log::enabled_for(LogLevel::Crit));

        Log::set_level(original);
    }

    #[test]
    #[serial]
    fn test_disabled_logger_filters_everything() {
        Log::set_enabled(false);
        assert!(!Log::enabled_for(LogLevel::Crit));
        Log::set_enabled(true);
        assert!(Log::enabled_for(LogLevel::Crit));
    }
}
