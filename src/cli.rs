use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::paths;

#[derive(Parser, Debug)]
#[command(name = "keel", about = "VM lifecycle agent bootstrap: settings resolution")]
pub struct Cli {
    /// Path to the agent config file
    #[arg(short, long, default_value = paths::DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve settings and persist them under the agent state directory
    Bootstrap,

    /// Resolve settings and print them
    Settings,

    /// Report which metadata sources are available
    Probe,
}
