//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: the top-level [`Config`], server identity, keepalive, MOTD and module lists
//! - [`listen`]: plaintext and TLS listener addresses
//! - [`limits`]: protocol field lengths and flood limits
//! - [`oper`]: operator blocks

mod limits;
mod listen;
mod oper;
mod types;

pub use limits::LimitsConfig;
pub use listen::{ListenConfig, TlsConfig};
pub use oper::OperBlock;
pub use types::{
    Config, ConfigError, KeepaliveConfig, LogFormat, LoggingConfig, ModerationConfig,
    ModulesConfig, MotdConfig, ServerConfig,
};
