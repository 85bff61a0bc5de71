//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the peer session demo
#[derive(Debug, Parser)]
#[command(name = "peer-session")]
#[command(about = "Run peer sessions over an in-process signaling hub", long_about = None)]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of peer sessions to start
    #[arg(short, long)]
    pub peers: Option<usize>,

    /// Delay before reconnecting after a signaling network error, in milliseconds
    #[arg(long, value_name = "MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Drop the first session's signaling link to exercise reconnection
    #[arg(long)]
    pub simulate_network_error: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "peer-session",
            "--peers",
            "4",
            "--reconnect-delay-ms",
            "75",
            "--simulate-network-error",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.peers, Some(4));
        assert_eq!(args.reconnect_delay_ms, Some(75));
        assert!(args.simulate_network_error);
        assert!(args.is_verbose());
        assert_eq!(args.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_default_values() {
        let args = CliArgs::try_parse_from(["peer-session"]).unwrap();

        assert!(args.config.is_none());
        assert!(args.peers.is_none());
        assert!(args.reconnect_delay_ms.is_none());
        assert!(!args.simulate_network_error);
        assert_eq!(args.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_quiet_log_level() {
        let args = CliArgs::try_parse_from(["peer-session", "-q"]).unwrap();
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
