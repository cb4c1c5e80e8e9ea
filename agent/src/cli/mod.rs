//! CLI module for api-health
//!
//! Provides the command-line interface for the monitoring agent.

pub mod check;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// API health monitor - Scheduled HTTP endpoint and TLS certificate checks
#[derive(Parser, Debug)]
#[command(name = "api-health")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    APIHEALTH_CONFIG              Config file path (default: config.yaml)
    APIHEALTH_LOG_LEVEL           Log level / filter (default: info, falls back to RUST_LOG)
    APIHEALTH_WEBHOOK_URL         Overrides feishu.webhook_url
    APIHEALTH_NOTIFY_ON_FAILURE   Overrides feishu.notify_on_failure (1/true/yes/on)
"#)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(
        short,
        long,
        global = true,
        default_value = "config.yaml",
        env = "APIHEALTH_CONFIG"
    )]
    pub config: PathBuf,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler and run until Ctrl+C / SIGTERM
    Run,
    /// Run rounds once and exit (non-zero when a probe is unhealthy)
    Check(check::CheckArgs),
}
