//! Viralscope - A Rust CLI for harvesting YouTube video metadata and transcripts
//!
//! This library resolves video/channel identifiers, fetches metadata in batches
//! from the YouTube Data API, routes transcript fetches across two provider
//! backends (one synchronous, one submit-then-poll), and ranks videos by a
//! derived virality score.

pub mod cli;
pub mod config;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod providers;
pub mod rank;
pub mod resolve;
pub mod usage;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use metadata::{VideoRecord, YoutubeClient};
pub use pipeline::Pipeline;
pub use providers::{ProviderKind, TranscriptRouter};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the pipeline
#[derive(thiserror::Error, Debug)]
pub enum ViralscopeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No valid video IDs found in input")]
    NoValidInput,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote service error: {0}")]
    RemoteService(String),

    #[error("Usage quota exhausted for {provider} ({count}/{ceiling} used)")]
    QuotaExceeded {
        provider: String,
        count: u32,
        ceiling: u32,
    },
}
