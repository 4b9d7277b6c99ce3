//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for SafeData using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// SafeData - privacy-utility pipeline for tabular microdata
#[derive(Parser, Debug)]
#[command(name = "safedata")]
#[command(version, about, long_about = None)]
#[command(author = "SafeData Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "safedata.toml", env = "SAFEDATA_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SAFEDATA_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a run for a dataset and execute it
    Run(commands::run::RunArgs),

    /// Continue a persisted run, or retry it with a smaller k
    Resume(commands::resume::ResumeArgs),

    /// List runs or show one run
    Status(commands::status::StatusArgs),

    /// Cancel a run at its next stage boundary
    Cancel(commands::cancel::CancelArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
