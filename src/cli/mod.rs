//! CLI Module
//!
//! Thin command-line wrapper over the file weight store and growth engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Netgrow - grow trained dense networks without changing their output
#[derive(Parser, Debug)]
#[command(name = "netgrow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a network with random initial weights
    #[command(name = "init")]
    Init {
        /// Network identifier
        #[arg(long)]
        id: u64,

        /// Width of every layer, input and output included (e.g. 784,30,10)
        #[arg(long, value_delimiter = ',', required = true)]
        units: Vec<usize>,
    },

    /// Add units to a hidden layer
    #[command(name = "widen")]
    Widen {
        /// Network identifier
        #[arg(long)]
        id: u64,

        /// Index of the hidden layer to widen
        #[arg(short, long)]
        layer: usize,

        /// Number of units to add
        #[arg(short, long)]
        units: usize,
    },

    /// Insert an identity-initialised layer
    #[command(name = "deepen")]
    Deepen {
        /// Network identifier
        #[arg(long)]
        id: u64,

        /// Index of the layer after which the new one is inserted
        #[arg(short, long)]
        layer: usize,
    },

    /// Print the architecture and stored weight shapes
    #[command(name = "show")]
    Show {
        /// Network identifier
        #[arg(long)]
        id: u64,
    },

    /// Copy the committed weights out of the store before a destructive edit
    #[command(name = "snapshot")]
    Snapshot {
        /// Network identifier
        #[arg(long)]
        id: u64,

        /// Destination directory (defaults to <store_root>/snapshots/model<id>-<time>)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace the stored weights with a snapshot
    #[command(name = "restore")]
    Restore {
        /// Network identifier
        #[arg(long)]
        id: u64,

        /// Snapshot directory written by `snapshot`
        #[arg(short, long)]
        from: PathBuf,
    },

    /// Delete every stored weight of a network
    #[command(name = "clear")]
    Clear {
        /// Network identifier
        #[arg(long)]
        id: u64,
    },

    /// Remove generations left behind by interrupted saves
    #[command(name = "prune")]
    Prune {
        /// Network identifier
        #[arg(long)]
        id: u64,
    },
}
