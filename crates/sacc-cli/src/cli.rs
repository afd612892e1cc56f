use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sacc",
    about = "Simple asset chaincode with a write-coalescing update buffer",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP host
    Serve(ServeArgs),
    /// Run one invocation against a fresh in-memory ledger
    Invoke(InvokeArgs),
    /// Run a script of invocations against one in-memory ledger
    Run(RunArgs),
    /// Drive the batched-increment workload and report write savings
    Workload(WorkloadArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct InvokeArgs {
    pub function: String,
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct RunArgs {
    /// One JSON invocation per line; `#` starts a comment line
    pub script: PathBuf,
    /// Flush threshold (distinct pending keys)
    #[arg(long, default_value = "25")]
    pub threshold: u64,
}

#[derive(Args)]
pub struct WorkloadArgs {
    /// Number of assets to create
    #[arg(long, default_value = "10")]
    pub assets: usize,
    /// Increments per asset
    #[arg(long, default_value = "10")]
    pub reps: usize,
    /// Pick a random asset for each increment instead of cycling
    #[arg(long)]
    pub random: bool,
    /// Flush threshold (distinct pending keys)
    #[arg(long, default_value = "25")]
    pub threshold: u64,
}
