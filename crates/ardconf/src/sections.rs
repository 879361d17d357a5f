//! Configuration sections. Each field has a serde default so a file only
//! needs to name what it changes.

use serde::{Deserialize, Serialize};

/// Where the Ardour WebSockets surface lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host name or address of the machine running Ardour.
    /// Default: 127.0.0.1
    #[serde(default = "ConnectionConfig::default_host")]
    pub host: String,

    /// Port the surface serves both HTTP and WebSocket traffic on.
    /// Default: 3818
    #[serde(default = "ConnectionConfig::default_port")]
    pub port: u16,

    /// Surface path used for relative metadata such as `manifest.xml`.
    /// Default: builtin/mixer
    #[serde(default = "ConnectionConfig::default_surface")]
    pub surface: String,

    /// WebSocket handshake timeout in milliseconds.
    /// Default: 5000
    #[serde(default = "ConnectionConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ConnectionConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        3818
    }

    fn default_surface() -> String {
        "builtin/mixer".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        5_000
    }

    /// `host:port`, the authority both the socket and HTTP URLs share.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            surface: Self::default_surface(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }
}

/// Behaviour of the root client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    /// Create the mixer and transport components.
    /// Default: true
    #[serde(default = "ClientSection::default_components")]
    pub components: bool,

    /// Reopen the socket after it is lost.
    /// Default: true
    #[serde(default = "ClientSection::default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Fixed delay before each reconnect attempt, in milliseconds.
    /// Default: 1000
    #[serde(default = "ClientSection::default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

impl ClientSection {
    fn default_components() -> bool {
        true
    }

    fn default_auto_reconnect() -> bool {
        true
    }

    fn default_reconnect_interval_ms() -> u64 {
        1_000
    }
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            components: Self::default_components(),
            auto_reconnect: Self::default_auto_reconnect(),
            reconnect_interval_ms: Self::default_reconnect_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
