//! CLI configuration module
//!
//! Merges an optional JSON configuration file with command-line overrides.

use crate::cli::args::CliArgs;
use crate::error::SessionError;
use crate::peer::DEFAULT_RECONNECT_DELAY;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default number of demo sessions
const DEFAULT_PEERS: usize = 3;

/// Upper bound on demo sessions
const MAX_PEERS: usize = 64;

/// Settings accepted in a JSON configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub peers: Option<usize>,
    pub reconnect_delay_ms: Option<u64>,
    pub simulate_network_error: Option<bool>,
}

impl FileConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(SessionError::from)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from JSON text
    pub fn parse(text: &str) -> Result<Self> {
        let config = serde_json::from_str(text).map_err(SessionError::from)?;
        Ok(config)
    }
}

/// Configuration for the peer session demo
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of sessions to start
    pub peers: usize,
    /// Delay before reconnecting after a network error
    pub reconnect_delay: Duration,
    /// Drop a signaling link during the run
    pub simulate_network_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peers: DEFAULT_PEERS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            simulate_network_error: false,
        }
    }
}

impl Config {
    /// Create configuration from CLI arguments
    ///
    /// Values given on the command line take precedence over the file.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        debug!("File configuration: {:?}", file);
        Ok(Self::merge(args, file))
    }

    fn merge(args: &CliArgs, file: FileConfig) -> Self {
        let defaults = Self::default();
        let reconnect_delay = args
            .reconnect_delay_ms
            .or(file.reconnect_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.reconnect_delay);

        Self {
            peers: args.peers.or(file.peers).unwrap_or(defaults.peers),
            reconnect_delay,
            simulate_network_error: args.simulate_network_error || file.simulate_network_error.unwrap_or(false),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.peers < 2 {
            return Err(SessionError::config_error_with_field("At least two peers are required", "peers").into());
        }

        if self.peers > MAX_PEERS {
            return Err(SessionError::config_error_with_field(
                format!("At most {} peers are supported", MAX_PEERS),
                "peers",
            )
            .into());
        }

        if self.reconnect_delay.is_zero() {
            return Err(SessionError::config_error_with_field(
                "Reconnect delay must be greater than zero",
                "reconnect_delay_ms",
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_defaults() {
        let args = CliArgs::try_parse_from(["peer-session"]).unwrap();
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.peers, 3);
        assert_eq!(config.reconnect_delay, Duration::from_millis(50));
        assert!(!config.simulate_network_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = CliArgs::try_parse_from(["peer-session", "--reconnect-delay-ms", "20"]).unwrap();
        let file = FileConfig::parse(r#"{"peers": 5, "reconnect_delay_ms": 500, "simulate_network_error": true}"#)
            .unwrap();

        let config = Config::merge(&args, file);

        assert_eq!(config.peers, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(20));
        assert!(config.simulate_network_error);
    }

    #[test]
    fn test_file_rejects_unknown_fields() {
        assert!(FileConfig::parse(r#"{"peer_count": 2}"#).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = CliArgs::try_parse_from(["peer-session", "--config", "/nonexistent/peer-session.json"]).unwrap();
        let err = Config::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_validate_invalid() {
        let mut config = Config::default();
        config.peers = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.peers = MAX_PEERS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reconnect_delay = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reconnect_delay_ms"));
    }
}
