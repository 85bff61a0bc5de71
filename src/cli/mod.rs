//! CLI module
//!
//! Command-line interface for the peer session demo.

pub mod args;
pub mod config;

pub use args::CliArgs;
pub use config::Config;
