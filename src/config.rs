//! Configuration module for the echo-reactor server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "echo-reactor")]
#[command(author = "echo-reactor authors")]
#[command(version = "0.1.0")]
#[command(about = "A readiness-based TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TCP port to listen on (wildcard address)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Pending-connection queue length for listen()
    #[arg(short, long)]
    pub backlog: Option<i32>,

    /// Size of the per-read receive buffer in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Maximum readiness events returned per wait
    #[arg(long)]
    pub max_events: Option<usize>,

    /// Unsent echo bytes per connection before reading pauses
    #[arg(long)]
    pub max_pending: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            backlog: default_backlog(),
        }
    }
}

/// Event loop configuration
#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_events: default_max_events(),
            max_pending: default_max_pending(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_backlog() -> i32 {
    128
}

fn default_buffer_size() -> usize {
    4096
}

fn default_max_events() -> usize {
    1024
}

fn default_max_pending() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backlog: i32,
    pub buffer_size: usize,
    pub max_events: usize,
    pub max_pending: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(None, TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments against the optional TOML file.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(Some(cli), toml_config))
    }

    fn merge(cli: Option<CliArgs>, toml_config: TomlConfig) -> Self {
        let Some(cli) = cli else {
            return Config {
                port: toml_config.server.port,
                backlog: toml_config.server.backlog,
                buffer_size: toml_config.runtime.buffer_size,
                max_events: toml_config.runtime.max_events,
                max_pending: toml_config.runtime.max_pending,
                log_level: toml_config.logging.level,
            };
        };

        Config {
            port: cli.port.unwrap_or(toml_config.server.port),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.runtime.buffer_size),
            max_events: cli.max_events.unwrap_or(toml_config.runtime.max_events),
            max_pending: cli.max_pending.unwrap_or(toml_config.runtime.max_pending),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {err}", path = .0.display(), err = .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {err}", path = .0.display(), err = .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
