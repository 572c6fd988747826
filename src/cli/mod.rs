//! Command-line interface for rehearse.

pub mod commands;
pub mod interactive;
pub mod session;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rehearse - timed interview rehearsal with postmortems and progress tracking.
#[derive(Parser, Debug)]
#[command(name = "rehearse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./rehearse.toml, then the user config dir).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create rehearse.toml and the .rehearse/ data directory.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Run a timed session.
    Start {
        /// Track: core or specialized.
        #[arg(short, long, default_value = "core")]
        mode: String,

        /// Only pick problems of this pattern.
        #[arg(short, long)]
        pattern: Option<String>,

        /// Practise this problem id instead of letting the selector choose.
        #[arg(long)]
        problem: Option<String>,

        /// Overall limit in minutes; phase targets scale along.
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// List catalog problems.
    Problems {
        /// Track: core or specialized (default: both).
        #[arg(short, long)]
        mode: Option<String>,

        /// Only this pattern.
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Progress dashboard.
    Progress {
        #[arg(short, long, default_value = "core")]
        mode: String,

        /// Print the dashboard as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the weakest pattern.
    Weakest {
        #[arg(short, long, default_value = "core")]
        mode: String,
    },

    /// Bug-class frequency over failed sessions.
    Bugs,

    /// Time-to-solution trend for one pattern.
    Trend {
        /// Pattern name (e.g. binary_search).
        pattern: String,
    },

    /// Recent postmortems.
    History {
        /// Number of records to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the most recent postmortem.
    Last,

    /// Export history as JSON Lines.
    Export {
        /// Output file.
        #[arg(short, long, default_value = "rehearse-history.jsonl")]
        output: PathBuf,
    },

    /// Recompute record digests and report tampering.
    Verify,

    /// Edit configuration interactively.
    Config,

    /// Check configuration, catalog and history.
    Doctor,

    /// Show version.
    Version,
}
