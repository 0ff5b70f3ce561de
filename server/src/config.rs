use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ws::hub::{HubSettings, DEFAULT_OUTBOUND_BUFFER, DEFAULT_WRITE_TIMEOUT};

/// Command-line layer. Only flags that were actually given (or set through
/// their env var) are serialized, so unset flags never mask the TOML file.
#[derive(Parser, Serialize, Clone, Debug)]
#[command(name = "facade-server", version, about = "Facade broadcast and liveness server")]
pub struct Cli {
    /// Port to listen on [default: 8080]
    #[arg(long, env = "FACADE_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "FACADE_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./facade.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "FACADE_JSON_LOGS")]
    #[serde(skip_serializing_if = "is_false")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub generate_config: bool,

    /// Data directory for the SQLite database [default: ./data]
    #[arg(long, env = "FACADE_DATA_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Effective server configuration after all layers are merged.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub generate_config: bool,
    pub data_dir: String,

    /// Broadcast hub tuning ([hub] section)
    #[serde(default)]
    pub hub: HubConfig,

    /// Playback history retention ([retention] section)
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Configuration for WebSocket fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Per-recipient write deadline in milliseconds (default: 5000)
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Frames that may queue for one client before writes start waiting (default: 64)
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl HubConfig {
    pub fn settings(&self) -> HubSettings {
        HubSettings {
            write_timeout: Duration::from_millis(self.write_timeout_ms.max(1)),
            outbound_buffer: self.outbound_buffer.max(1),
        }
    }
}

fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT.as_millis() as u64
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

/// Configuration for the play history cleanup task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days of play history to keep (default: 90)
    #[serde(default = "default_play_history_days")]
    pub play_history_days: u32,

    /// Interval in seconds between cleanup runs (default: 3600 = 1 hour)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            play_history_days: default_play_history_days(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

fn default_play_history_days() -> u32 {
    90
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            hub: HubConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (FACADE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(Cli::parse()).extract()
    }

    pub fn figment(cli: Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("FACADE_").split("__"))
            .merge(Serialized::defaults(cli))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Facade Server Configuration
# Place this file at ./facade.toml or specify with --config <path>
# All settings can be overridden via environment variables (FACADE_PORT,
# FACADE_HUB__WRITE_TIMEOUT_MS, etc.) or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# ---- Broadcast Hub ----
# [hub]

# A client that cannot take a frame within this many milliseconds is dropped
# write_timeout_ms = 5000

# Frames queued per client before broadcasts start waiting on it
# outbound_buffer = 64

# ---- Play History Retention ----
# [retention]

# Days of playback history to keep (default: 90)
# play_history_days = 90

# Interval in seconds between cleanup runs (default: 3600 = 1 hour)
# cleanup_interval_secs = 3600
"#
    .to_string()
}
