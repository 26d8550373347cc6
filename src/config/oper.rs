//! Operator block configuration.

use serde::Deserialize;

use crate::security::mask::wildcard_match;
use crate::security::password::verify_secret;

/// Operator block configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OperBlock {
    /// Operator name (used in OPER command).
    pub name: String,
    /// Password hash (Argon2 PHC string, bcrypt, or `sha256:<hex>`).
    pub password: String,
    /// Optional hostmask restriction (e.g., "*!*@trusted.host").
    pub hostmask: Option<String>,
    /// Grants user mode `+a` in addition to `+o`.
    #[serde(default)]
    pub admin: bool,
    /// Require TLS connection to use this oper block.
    #[serde(default)]
    pub require_tls: bool,
}

impl OperBlock {
    /// Verify the provided password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_secret(password, &self.password)
    }

    /// Whether `mask` (`nick!ident@host`) satisfies the block's hostmask.
    pub fn allows_host(&self, mask: &str) -> bool {
        match &self.hostmask {
            None => true,
            Some(pattern) if pattern.contains('!') => wildcard_match(pattern, mask),
            Some(pattern) => mask
                .split_once('!')
                .is_some_and(|(_, userhost)| wildcard_match(pattern, userhost)),
        }
    }
}
