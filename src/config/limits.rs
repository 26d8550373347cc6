//! Protocol limits configuration.

use serde::Deserialize;

/// Field length limits advertised in `RPL_ISUPPORT` and enforced by handlers,
/// plus per-connection flood control.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum nickname length (default: 30).
    #[serde(default = "default_nicklen")]
    pub nicklen: usize,
    /// Ident is truncated to this many characters (default: 10).
    #[serde(default = "default_identlen")]
    pub identlen: usize,
    /// Real name is truncated to this many characters (default: 50).
    #[serde(default = "default_gecoslen")]
    pub gecoslen: usize,
    #[serde(default = "default_topiclen")]
    pub topiclen: usize,
    #[serde(default = "default_kicklen")]
    pub kicklen: usize,
    #[serde(default = "default_awaylen")]
    pub awaylen: usize,
    #[serde(default = "default_quitlen")]
    pub quitlen: usize,
    /// Channels a single user may be in at once (default: 20).
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
    /// Absolute inbound line ceiling in bytes; longer lines close the connection.
    #[serde(default = "default_line_ceiling")]
    pub line_ceiling: usize,
    /// Entries kept in the WHOWAS ring (default: 256).
    #[serde(default = "default_whowas_size")]
    pub whowas_size: usize,
    /// Sustained lines per second per connection (default: 10).
    #[serde(default = "default_message_rate")]
    pub message_rate: u32,
    /// Burst allowance on top of the sustained rate (default: 20).
    #[serde(default = "default_message_burst")]
    pub message_burst: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            nicklen: default_nicklen(),
            identlen: default_identlen(),
            gecoslen: default_gecoslen(),
            topiclen: default_topiclen(),
            kicklen: default_kicklen(),
            awaylen: default_awaylen(),
            quitlen: default_quitlen(),
            max_channels: default_max_channels(),
            line_ceiling: default_line_ceiling(),
            whowas_size: default_whowas_size(),
            message_rate: default_message_rate(),
            message_burst: default_message_burst(),
        }
    }
}

fn default_nicklen() -> usize {
    30
}

fn default_identlen() -> usize {
    10
}

fn default_gecoslen() -> usize {
    50
}

fn default_topiclen() -> usize {
    307
}

fn default_kicklen() -> usize {
    307
}

fn default_awaylen() -> usize {
    200
}

fn default_quitlen() -> usize {
    300
}

fn default_max_channels() -> usize {
    20
}

fn default_line_ceiling() -> usize {
    lantern_proto::DEFAULT_LINE_CEILING
}

fn default_whowas_size() -> usize {
    256
}

fn default_message_rate() -> u32 {
    10
}

fn default_message_burst() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let config = LimitsConfig::default();
        assert_eq!(config.nicklen, 30);
        assert_eq!(config.identlen, 10);
        assert_eq!(config.gecoslen, 50);
        assert_eq!(config.max_channels, 20);
        assert_eq!(config.line_ceiling, 8192);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config: LimitsConfig = toml::from_str("nicklen = 9\nmax_channels = 2").unwrap();
        assert_eq!(config.nicklen, 9);
        assert_eq!(config.max_channels, 2);
        assert_eq!(config.topiclen, 307);
    }
}
