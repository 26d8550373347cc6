//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::limits::LimitsConfig;
use super::listen::{ListenConfig, TlsConfig};
use super::oper::OperBlock;
use crate::handlers::ModuleId;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Plaintext listener.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Optional TLS listener.
    pub tls: Option<TlsConfig>,
    /// Operator blocks.
    #[serde(default)]
    pub oper: Vec<OperBlock>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    /// Message of the Day configuration.
    #[serde(default)]
    pub motd: MotdConfig,
    /// Where K/Q/Z-lines are persisted.
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.server.name;
        if name.is_empty() || name.contains(' ') || !name.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "server.name {name:?} must be a dotted name without spaces"
            )));
        }
        if self.server.sid.len() != 3 {
            return Err(ConfigError::Invalid("server.sid must be 3 characters".into()));
        }
        if let Some(oper) = self.oper.iter().find(|o| o.password.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "oper block {:?} has an empty password",
                oper.name
            )));
        }
        if let Some(unknown) = self
            .modules
            .autoload
            .iter()
            .find(|m| ModuleId::from_name(m).is_none())
        {
            return Err(ConfigError::Invalid(format!("unknown module {unknown:?}")));
        }
        Ok(())
    }

    /// Find an operator block by name (case-sensitive, like the OPER command).
    pub fn oper_block(&self, name: &str) -> Option<&OperBlock> {
        self.oper.iter().find(|o| o.name == name)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "irc.lantern.test").
    pub name: String,
    #[serde(default = "default_network")]
    pub network: String,
    /// Server ID used as the UID prefix (3 characters).
    #[serde(default = "default_sid")]
    pub sid: String,
    #[serde(default = "default_description")]
    pub description: String,
    /// Connection password hash. Clients must send a matching PASS when set.
    pub password: Option<String>,
    /// Shared-secret hash required by DIE and RESTART.
    pub admin_secret: Option<String>,
    /// Enables HMAC host cloaking when set.
    pub cloak_secret: Option<String>,
}

fn default_network() -> String {
    "LanternNet".to_string()
}

fn default_sid() -> String {
    "0LN".to_string()
}

fn default_description() -> String {
    "Lantern IRC daemon".to_string()
}

/// Ping/pong liveness and registration deadline.
#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveConfig {
    /// Seconds between server PINGs (default: 90).
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Consecutive unanswered PINGs tolerated before disconnect (default: 2).
    #[serde(default = "default_max_strikes")]
    pub max_strikes: u32,
    /// Seconds allowed for NICK/USER before disconnect (default: 60).
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
            max_strikes: default_max_strikes(),
            registration_timeout: default_registration_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    90
}

fn default_max_strikes() -> u32 {
    2
}

fn default_registration_timeout() -> u64 {
    60
}

/// Message of the Day configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MotdConfig {
    /// Path to MOTD file (one line per MOTD line).
    pub file: Option<String>,
    /// Inline MOTD lines (used when `file` is not set).
    #[serde(default)]
    pub lines: Vec<String>,
}

impl MotdConfig {
    /// Resolve the MOTD text. `None` means there is no MOTD.
    pub fn load_lines(&self) -> std::io::Result<Option<Vec<String>>> {
        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)?;
            return Ok(Some(text.lines().map(str::to_owned).collect()));
        }
        if self.lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.lines.clone()))
        }
    }
}

/// Flat files backing the moderation stores. Unset paths keep the list in memory only.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModerationConfig {
    pub kline_file: Option<PathBuf>,
    pub qline_file: Option<PathBuf>,
    pub zline_file: Option<PathBuf>,
}

/// Command modules loaded at startup and on `REHASH modules`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesConfig {
    #[serde(default = "default_autoload")]
    pub autoload: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            autoload: default_autoload(),
        }
    }
}

fn default_autoload() -> Vec<String> {
    ModuleId::ALL.iter().map(|m| m.name().to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}
