use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "comicshelf")]
#[command(author, version, about = "Comic archive ingestion and filing daemon")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the daemon: watch the download directory and file archives
    Start,

    /// Process a single archive through the pipeline and exit
    Run {
        /// Archive to process
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Parse a filename and display the extracted components
    Parse {
        /// Filename to parse
        #[arg(required = true)]
        filename: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect an archive: entries, embedded metadata, cover candidate
    Inspect {
        /// Archive to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List records waiting for review
    Pending,

    /// List filed archives and their conversion status
    Filed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a held record with corrected metadata
    Resolve {
        /// Content hash of the held record
        #[arg(required = true)]
        hash: String,

        /// Corrected series name
        #[arg(long, required = true)]
        series: String,

        /// Corrected volume number
        #[arg(long)]
        volume: Option<u32>,

        /// Corrected chapter number (decimals allowed, e.g. 76.5)
        #[arg(long)]
        chapter: Option<f64>,

        /// Corrected chapter title
        #[arg(long)]
        title: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
