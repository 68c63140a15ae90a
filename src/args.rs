//! CLI argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::config::LogFormat;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "trajhook.toml";

#[derive(Parser, Debug)]
#[command(name = "trajhook")]
#[command(about = "Drive a scripted agent trajectory through the hook engine")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (missing file means defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log filter, overrides RUST_LOG and the config file
    #[arg(long, env = "TRAJHOOK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format, overrides the config file
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Trajectory id (generated when omitted)
    #[arg(long)]
    pub trajectory_id: Option<String>,

    /// Tools invoked by the scripted run, one per step
    #[arg(long = "tool", default_values_t = ["read_file".to_string(), "grep".to_string()])]
    pub tools: Vec<String>,

    /// Tools the policy hook refuses
    #[arg(long = "deny-tool")]
    pub deny_tools: Vec<String>,

    /// Delay before the simulated operator approves the run, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub approval_delay_ms: u64,

    /// Skip the simulated operator so the approval gate times out
    #[arg(long)]
    pub no_approval: bool,

    /// Times a step is retried when hooks ask for it
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,
}
