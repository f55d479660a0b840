// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay configuration.
//!
//! Supports both programmatic and file-based configuration.

use go2_webrtc::topics;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Bind address of the HTTP control surface.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (or any `tracing` filter directive).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout of each signaling request to the robot (seconds).
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Time the robot has to validate a session (seconds, 0 disables).
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout_secs: u64,

    /// STUN/TURN servers for both sides. Empty on a plain LAN.
    #[serde(default)]
    pub ice_servers: Vec<String>,

    /// Topics subscribed when `/go2/connect` names none.
    #[serde(default = "default_topics")]
    pub default_topics: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_validation_timeout() -> u64 {
    20
}

/// Topics relayed by default.
pub fn default_topics() -> Vec<String> {
    [
        topics::MULTIPLE_STATE,
        topics::LF_SPORT_MOD_STATE,
        topics::LOW_STATE,
        topics::ULIDAR,
        topics::ULIDAR_ARRAY,
        topics::ULIDAR_STATE,
        topics::ROBOTODOM,
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            log_level: default_log_level(),
            http_timeout_secs: default_http_timeout(),
            validation_timeout_secs: default_validation_timeout(),
            ice_servers: Vec::new(),
            default_topics: default_topics(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.is_empty() {
            return Err(ConfigError::Invalid("Empty bind address".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("Port must be non-zero".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP timeout must be non-zero".into()));
        }

        for (i, server) in self.ice_servers.iter().enumerate() {
            let scheme_ok = ["stun:", "stuns:", "turn:", "turns:"]
                .iter()
                .any(|s| server.starts_with(s));
            if !scheme_ok {
                return Err(ConfigError::Invalid(format!(
                    "ICE server {} has unsupported URL '{}'",
                    i, server
                )));
            }
        }

        if let Some(i) = self.default_topics.iter().position(|t| t.is_empty()) {
            return Err(ConfigError::Invalid(format!("Topic {} is empty", i)));
        }

        Ok(())
    }

    /// Socket address string of the HTTP surface.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validation_timeout(&self) -> Option<Duration> {
        match self.validation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.validation_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(config.default_topics.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port = 9000
validation_timeout_secs = 0
ice_servers = ["stun:stun.l.google.com:19302"]
"#
        )
        .unwrap();

        let config = RelayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.validation_timeout(), None);
        assert_eq!(config.ice_servers.len(), 1);
        assert_eq!(config.default_topics, default_topics());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = RelayConfig {
            port: 8123,
            default_topics: vec![topics::LOW_STATE.into()],
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: RelayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects() {
        let bad_ice = RelayConfig {
            ice_servers: vec!["http://example.com".into()],
            ..Default::default()
        };
        assert!(matches!(bad_ice.validate(), Err(ConfigError::Invalid(_))));

        let zero_port = RelayConfig {
            port: 0,
            ..Default::default()
        };
        assert!(zero_port.validate().is_err());

        let empty_topic = RelayConfig {
            default_topics: vec!["rt/lf/lowstate".into(), String::new()],
            ..Default::default()
        };
        assert!(empty_topic.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RelayConfig::from_file("/nonexistent/go2-relay.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
