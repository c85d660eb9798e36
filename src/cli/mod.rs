use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::metadata::ContentType;
use crate::providers::ProviderKind;

#[derive(Parser)]
#[command(
    name = "viralscope",
    about = "Viralscope - Harvest YouTube video metadata, transcripts, and virality rankings",
    version,
    long_about = "A CLI for batch-fetching YouTube video metadata, discovering a channel's top videos, \
fetching transcripts through pluggable providers, and ranking videos by a derived virality score."
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
    /// Fetch metadata (and optionally transcripts) for a list of video URLs/IDs
    Videos {
        /// Video URLs or IDs (any mix of watch/shorts/embed/short-link forms)
        #[arg(value_name = "URL_OR_ID", required = true)]
        inputs: Vec<String>,

        /// Also fetch a transcript for every video
        #[arg(short, long)]
        transcripts: bool,

        /// Transcript provider (defaults to the configured one)
        #[arg(short, long, value_enum)]
        provider: Option<ProviderKind>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Discover a channel's top videos by view count
    Channel {
        /// Channel URL, @handle, or canonical channel ID
        #[arg(value_name = "CHANNEL")]
        channel: String,

        /// Maximum number of videos to return (1-50)
        #[arg(short, long, value_name = "COUNT")]
        limit: Option<usize>,

        /// Filter by content type
        #[arg(short, long, value_enum, default_value = "any")]
        content_type: ContentType,

        /// Also fetch a transcript for every video
        #[arg(short, long)]
        transcripts: bool,

        /// Transcript provider (defaults to the configured one)
        #[arg(short, long, value_enum)]
        provider: Option<ProviderKind>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Rank videos by virality score
    Analyze {
        /// Video URLs or IDs to analyze (omit when using --channel)
        #[arg(value_name = "URL_OR_ID")]
        inputs: Vec<String>,

        /// Analyze a channel's top videos instead of an explicit list
        #[arg(long, value_name = "CHANNEL", conflicts_with = "inputs")]
        channel: Option<String>,

        /// Maximum number of channel videos to analyze (1-50)
        #[arg(short, long, value_name = "COUNT")]
        limit: Option<usize>,

        /// Filter channel videos by content type
        #[arg(short, long, value_enum, default_value = "any")]
        content_type: ContentType,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show or override transcript-provider usage counters
    Usage {
        /// Override a counter, e.g. --set direct=0 or --set polling=42
        #[arg(long, value_name = "PROVIDER=COUNT")]
        set: Option<String>,
    },

    /// Show configuration or where to edit it
    Config {
        /// Show current configuration (credentials masked)
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Compact console table
    Table,
    /// CSV matching the dashboard export columns
    Csv,
    /// Pretty-printed JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
