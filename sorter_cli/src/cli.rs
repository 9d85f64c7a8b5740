//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "sorter", version, about = "Sorter line CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/sorter_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the line: discover the ring, track position and hold the target speed
    Run {
        /// Stop after this many milliseconds (runs until Ctrl-C otherwise)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Override simulation.cart_count
        #[arg(long, value_name = "N")]
        carts: Option<u32>,
        /// Override line.target_speed (decimal)
        #[arg(long, value_name = "SPEED")]
        target_speed: Option<String>,
    },
    /// Validate config and exercise a short ring discovery
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
