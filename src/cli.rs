use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::catalog::Tier;

#[derive(Debug, Parser)]
#[command(
    name = "letras-offline",
    version,
    about = "Download and serve offline audio packs for the reading app"
)]
pub struct Cli {
    /// Origin that relative audio paths resolve against.
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Directory holding the cache database and client state.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show every pack with its state and stored entries.
    Packs,
    /// Download one pack, printing progress as it arrives.
    Download { tier: Tier },
    /// Ask the worker which packs have a store.
    Inventory,
    /// Request a URL through the cache-first interception.
    Fetch {
        url: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the exercise catalog by island.
    Levels,
    Tui,
}
