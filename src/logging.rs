//! Logging
//!
//! `tracing` subscriber setup for the `infuse` binary and for embedders that
//! want the same output. The engine itself only emits events; nothing in the
//! library installs a subscriber on its own.
//!
//! Priority order (highest to lowest):
//! 1. Environment variables (`INFUSE_LOG`, `INFUSE_LOG_FORMAT`, `INFUSE_LOG_OUTPUT`,
//!    `INFUSE_LOG_MODULES`)
//! 2. Configuration (file, then CLI flags folded in by the caller)
//! 3. Defaults

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when `output` is "file"
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `infuse::engine = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("infuse.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputTarget {
    Stdout,
    Stderr,
    File,
}

/// Install the global subscriber.
///
/// Fails if the configuration is invalid or a subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), LoadError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map_or(true, |c| c.color) && output != OutputTarget::File;

    let writer = match output {
        OutputTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
        OutputTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        OutputTarget::File => BoxMakeWriter::new(Mutex::new(open_log_file(config)?)),
    };

    let base_subscriber = Registry::default().with(filter);
    let result = match format {
        LogFormat::Json => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .try_init(),
    };

    result.map_err(|e| LoadError::Config(format!("Failed to install log subscriber: {}", e)))
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<std::fs::File, LoadError> {
    let log_file = config.map_or_else(default_log_file, |c| c.file.clone());
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| LoadError::Config(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| LoadError::Config(format!("Failed to open log file {:?}: {}", log_file, e)))
}

/// Build the level filter from `INFUSE_LOG`, or from config plus module overrides
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, LoadError> {
    if let Ok(filter) = EnvFilter::try_from_env("INFUSE_LOG") {
        return Ok(filter);
    }

    let level = config.map_or("info", |c| c.level.as_str());
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            filter = filter.add_directive(parse_directive(module, module_level)?);
        }
    }

    if let Ok(modules) = std::env::var("INFUSE_LOG_MODULES") {
        for spec in modules.split(',') {
            if let Some((module, module_level)) = spec.split_once('=') {
                filter = filter.add_directive(parse_directive(module.trim(), module_level.trim())?);
            }
        }
    }

    Ok(filter)
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, LoadError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| LoadError::Config(format!("Invalid log directive '{}={}': {}", module, level, e)))
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<LogFormat, LoadError> {
    if let Ok(format) = std::env::var("INFUSE_LOG_FORMAT") {
        if let Ok(parsed) = parse_format(&format) {
            return Ok(parsed);
        }
    }
    parse_format(config.map_or("text", |c| c.format.as_str()))
}

fn parse_format(format: &str) -> Result<LogFormat, LoadError> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(LoadError::Config(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputTarget, LoadError> {
    if let Ok(output) = std::env::var("INFUSE_LOG_OUTPUT") {
        return parse_output(&output);
    }
    parse_output(config.map_or("stderr", |c| c.output.as_str()))
}

fn parse_output(output: &str) -> Result<OutputTarget, LoadError> {
    match output {
        "stdout" => Ok(OutputTarget::Stdout),
        "stderr" => Ok(OutputTarget::Stderr),
        "file" => Ok(OutputTarget::File),
        other => Err(LoadError::Config(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            other
        ))),
    }
}
