pub mod config;
pub mod rules;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A3S Reply - Canned-reply messaging bot with a status server
#[derive(Debug, Parser)]
#[command(name = "a3s-reply", version, about)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the status server and the bot session
    Serve {
        /// Port to listen on (overrides $PORT and the config file)
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for session credentials and config
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Seconds to wait for a pairing scan before giving up
        #[arg(long)]
        pairing_timeout: Option<u64>,
    },

    /// Print the resolved configuration as TOML
    Config {
        /// Data directory to resolve the config from
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// List the reply table
    Rules,
}
