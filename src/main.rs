use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use dimmerd::args::{CliAction, ParsedArgs, display_help, display_version_info};
use dimmerd::config::Config;
use dimmerd::constants::EXIT_FAILURE;
use dimmerd::daemon;
use dimmerd::logger::{Log, LogLevel};

/// Resolve the config path from `--config` or the default location.
fn resolve_config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => Config::get_config_path(),
    }
}

/// Load the config. The default location gets a default file when missing;
/// an explicit `--config` path must exist.
fn load_config(config_path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match config_path {
        Some(path) => Ok((Config::load_from_path(path)?, path.to_path_buf())),
        None => {
            let config = Config::load()?;
            Ok((config, Config::get_config_path()?))
        }
    }
}

fn run(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    csv_log: Option<PathBuf>,
) -> Result<()> {
    // Apply an explicit level before loading so config warnings respect it
    let override_level = match log_level.as_deref() {
        Some(name) => match LogLevel::parse(name) {
            Some(level) => Some(level),
            None => {
                Log::log_warning(&format!("Unknown log level '{}', using info", name));
                Some(LogLevel::Info)
            }
        },
        None => None,
    };
    if let Some(level) = override_level {
        Log::set_level(level);
    }

    Log::log_version();
    let (config, path) = load_config(config_path.as_deref())?;
    if override_level.is_none() {
        Log::set_level(config.log_level());
    }
    config.log_config(&path);

    daemon::run(&config, csv_log.as_deref())
}

fn check(config_path: Option<PathBuf>) -> Result<()> {
    Log::log_version();
    let path = resolve_config_path(config_path)?;
    let config = Config::load_from_path(&path)?;
    config.log_config(&path);
    Log::log_block_start("Configuration is valid");
    Log::log_end();
    Ok(())
}

fn write_default_config(config_path: Option<PathBuf>) -> Result<()> {
    let path = resolve_config_path(config_path)?;
    if path.exists() {
        Log::log_decorated(&format!(
            "Configuration already exists at {}, leaving it untouched",
            path.display()
        ));
        return Ok(());
    }
    Config::create_default_config(&path)
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;
    Log::log_decorated(&format!("Default configuration written to {}", path.display()));
    Ok(())
}

fn main() -> Result<()> {
    let parsed = ParsedArgs::from_env();

    let result = match parsed.action {
        CliAction::ShowVersion => {
            display_version_info();
            return Ok(());
        }
        CliAction::ShowHelp => {
            display_help();
            return Ok(());
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Check { config_path } => check(config_path),
        CliAction::WriteDefaultConfig { config_path } => write_default_config(config_path),
        CliAction::Run {
            config_path,
            log_level,
            csv_log,
        } => run(config_path, log_level, csv_log),
    };

    if let Err(e) = result {
        Log::log_pipe();
        Log::log_error(&format!("{:#}", e));
        Log::log_end();
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}
