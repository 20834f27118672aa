use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tfstate",
    about = "Remote state backend for Terraform, with encryption at rest and version history",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file
    #[arg(short, long, global = true, env = "TFSTATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP backend
    Serve(ServeArgs),
    /// List refs that have a current state
    States(StatesArgs),
    /// List the versions of a ref
    Versions(VersionsArgs),
    /// Delete all but the newest versions of a ref
    Prune(PruneArgs),
    /// Show store-wide counters
    Stats(StatsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding config and TFSTATE_BIND
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Store states under this directory
    #[arg(long, conflicts_with = "memory")]
    pub data_dir: Option<PathBuf>,
    /// Keep states in memory only
    #[arg(long)]
    pub memory: bool,
}

#[derive(Args)]
pub struct StatesArgs {
    /// Only states below this ref, shown relative to it
    #[arg(long)]
    pub scope: Option<String>,
}

#[derive(Args)]
pub struct VersionsArgs {
    pub reference: String,
}

#[derive(Args)]
pub struct PruneArgs {
    pub reference: String,
    /// Number of newest versions to keep
    #[arg(long)]
    pub keep: usize,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Also count locks older than this many days
    #[arg(long)]
    pub stale_days: Option<u32>,
}
