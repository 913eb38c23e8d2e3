use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::discover::DiscoveryMethod;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "tubescribe",
    about = "Batch transcript extraction for YouTube videos, playlists, and channels",
    version,
    long_about = "Resolves YouTube URLs, handles, and bare IDs; discovers playlist and \
channel video lists; and extracts caption transcripts in bulk with adaptive rate \
limiting and resumable job state."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract transcripts for a video, playlist, channel, or saved manifest
    Extract {
        /// URL, handle, bare ID, or path to a playlist manifest JSON
        #[arg(value_name = "INPUT")]
        input: String,

        /// Base directory for transcripts (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Artifact format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Preferred caption language
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Cap on fetch attempts this run (skips don't count)
        #[arg(long, value_name = "COUNT")]
        max_videos: Option<usize>,

        /// Attempt only videos that failed in a previous run
        #[arg(long)]
        retry_failed: bool,

        /// Re-extract videos that already succeeded
        #[arg(long)]
        no_skip_existing: bool,

        /// Seconds between successful fetches
        #[arg(long, value_name = "SECONDS")]
        rate_limit: Option<u64>,

        /// Video list discovery method
        #[arg(long, value_enum, default_value_t = DiscoveryMethod::Auto)]
        method: DiscoveryMethod,

        /// Also write the discovered video list as a manifest JSON
        #[arg(long)]
        save_manifest: bool,
    },

    /// Discover and print a playlist or channel video list
    List {
        /// URL, handle, or bare ID
        #[arg(value_name = "INPUT")]
        input: String,

        /// Stop after this many videos
        #[arg(short, long, value_name = "COUNT")]
        max: Option<usize>,

        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show how an input resolves (video / playlist / channel)
    Resolve {
        /// URL, handle, or bare ID
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Configure extraction settings
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
