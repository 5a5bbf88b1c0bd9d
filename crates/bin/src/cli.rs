//! CLI argument definitions for the driftdoc binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Shared JSON documents that sync peer to peer
#[derive(Parser, Debug)]
#[command(name = "driftdoc")]
#[command(about = "driftdoc: eventually-consistent JSON documents")]
#[command(version)]
pub struct Cli {
    /// Document file. Created on first write.
    #[arg(short, long, default_value = "driftdoc.json", env = "DRIFTDOC_DB")]
    pub db: PathBuf,

    /// JSON configuration file
    #[arg(short, long, env = "DRIFTDOC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the value at a path as JSON
    Get {
        /// Dot-separated path; empty for the whole document
        #[arg(default_value = "")]
        path: String,
    },
    /// Write a value at a path
    Set {
        path: String,
        /// JSON value. Anything that does not parse is stored as a string.
        value: String,
    },
    /// Remove the value at a path
    Delete { path: String },
    /// Print a fresh unique id
    NewId,
    /// Sync copies of the document across in-process peers and print the result
    DemoSync(DemoSyncArgs),
}

/// Arguments for the demo-sync command
#[derive(clap::Args, Debug)]
pub struct DemoSyncArgs {
    /// Number of peers, joined in a line
    #[arg(short, long, default_value_t = 3)]
    pub peers: usize,

    /// Write the converged document back to the database file
    #[arg(long)]
    pub save: bool,
}
