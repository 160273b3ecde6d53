use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "crr")]
#[command(about = "Replicate a DynamoDB table into another region from its stream")]
#[command(version)]
pub struct Cli {
    /// Path to the replication config file
    #[arg(short, long, global = true, default_value = "crr.toml")]
    pub config: PathBuf,

    /// Environment to load (loads .env.{ENV} instead of .env)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a sample config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Validate the config, discover the source stream and print the worker configuration
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Start replicating until interrupted
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Settings that take precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Application name used for worker coordination
    #[arg(long)]
    pub task_name: Option<String>,

    /// Maximum records read per stream request
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Do not publish worker metrics
    #[arg(long)]
    pub no_metrics: bool,
}
