//! Command-line argument parsing and processing.
//!
//! Arguments are parsed by hand into a [`CliAction`]. Unknown options, or
//! options missing their value, yield [`CliAction::ShowHelpDueToError`].

use std::path::PathBuf;

use crate::logger::Log;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        config_path: Option<PathBuf>,
        log_level: Option<String>,
        /// Write one CSV row per tick to this file
        csv_log: Option<PathBuf>,
    },
    /// Load and validate the configuration, print it, then exit
    Check { config_path: Option<PathBuf> },
    /// Write the default configuration if none exists, then exit
    WriteDefaultConfig { config_path: Option<PathBuf> },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first element is the program name and is skipped.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut display_help = false;
        let mut display_version = false;
        let mut run_check = false;
        let mut write_default = false;
        let mut config_path: Option<PathBuf> = None;
        let mut log_level: Option<String> = None;
        let mut csv_log: Option<PathBuf> = None;
        let mut unknown_arg_found = false;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--check" => run_check = true,
                "--write-default-config" => write_default = true,
                "--config" | "-c" => match option_value(&args_vec, i) {
                    Some(value) => {
                        config_path = Some(PathBuf::from(value));
                        i += 1;
                    }
                    None => unknown_arg_found = true,
                },
                "--log-level" | "-l" => match option_value(&args_vec, i) {
                    Some(value) => {
                        log_level = Some(value.to_string());
                        i += 1;
                    }
                    None => unknown_arg_found = true,
                },
                "--csvlog" => match option_value(&args_vec, i) {
                    Some(value) => {
                        csv_log = Some(PathBuf::from(value));
                        i += 1;
                    }
                    None => unknown_arg_found = true,
                },
                _ => {
                    if arg_str.starts_with('-') {
                        Log::log_warning(&format!("Unknown option: {}", arg_str));
                    } else {
                        Log::log_warning(&format!("Unexpected argument: {}", arg_str));
                    }
                    unknown_arg_found = true;
                }
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else if run_check {
            CliAction::Check { config_path }
        } else if write_default {
            CliAction::WriteDefaultConfig { config_path }
        } else {
            CliAction::Run {
                config_path,
                log_level,
                csv_log,
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// The value following the option at `index`, warning when it is absent.
fn option_value(args: &[String], index: usize) -> Option<&str> {
    let value = args
        .get(index + 1)
        .map(String::as_str)
        .filter(|value| !value.starts_with('-'));
    if value.is_none() {
        Log::log_warning(&format!("Missing value for {}", args[index]));
    }
    value
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    Log::log_version();
    Log::log_pipe();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    Log::log_version();
    Log::log_block_start(env!("CARGO_PKG_DESCRIPTION"));
    Log::log_block_start("Usage: dimmerd [OPTIONS]");
    Log::log_block_start("Options:");
    Log::log_indented("-c, --config <path>       Use this configuration file");
    Log::log_indented("-l, --log-level <level>   Override control.log_level");
    Log::log_indented("    --csvlog <path>       Record every tick to a CSV file");
    Log::log_indented("    --check               Validate and print the configuration");
    Log::log_indented("    --write-default-config Write a default configuration and exit");
    Log::log_indented("-h, --help                Print help information");
    Log::log_indented("-V, --version             Print version information");
    Log::log_end();
}
