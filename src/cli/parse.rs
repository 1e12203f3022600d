//! CLI parse: clap types only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "infuse")]
#[command(about = "Load paths from a JSON fixture through the infuse engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch paths once and print their data nodes
    Get {
        /// JSON file serving as the remote source
        #[arg(long)]
        fixture: PathBuf,

        /// Also print the load records of the requested paths
        #[arg(long)]
        status: bool,

        /// Paths to fetch
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Listen to a path and print its value whenever the fixture changes
    Watch {
        /// JSON file serving as the remote source
        #[arg(long)]
        fixture: PathBuf,

        /// Fail when the first value takes longer than this (milliseconds)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Path to listen to
        path: String,
    },
}
