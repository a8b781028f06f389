//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use std::num::NonZeroUsize;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::client::{DEFAULT_ENDPOINT, FeedConfig, REQUEST_TIMEOUT_SECS};
use crate::output::Format;
use crate::sync::{DEFAULT_TICK_SECS, SyncConfig};

/// Live earthquake dashboard over a rolling record window.
#[derive(Parser, Debug)]
#[command(name = "quakeboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one window and print it
    Fetch(FetchArgs),

    /// Run the dashboard in the terminal
    Watch(WatchArgs),

    /// Start the web dashboard
    Serve(ServeArgs),
}

/// Feed endpoint options shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct FeedArgs {
    /// Feed endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Records per window (sent as `valuesToShow`)
    #[arg(long, short = 'n', default_value = "19")]
    pub page_size: NonZeroUsize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Accept invalid TLS certificates (self-signed dev endpoints)
    #[arg(long)]
    pub insecure: bool,
}

impl FeedArgs {
    #[must_use]
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.timeout.max(1)),
            insecure: self.insecure,
        }
    }
}

/// Timer options for commands that run the synchronizer.
#[derive(Args, Debug, Clone)]
pub struct TimingArgs {
    /// Seconds between highlight steps
    #[arg(long, default_value_t = DEFAULT_TICK_SECS)]
    pub tick: u64,

    /// Retry a failed initial load after this many seconds
    #[arg(long)]
    pub retry: Option<u64>,
}

impl TimingArgs {
    #[must_use]
    pub fn sync_config(&self, page_size: NonZeroUsize) -> SyncConfig {
        SyncConfig {
            page_size,
            tick_interval: Duration::from_secs(self.tick.max(1)),
            retry_after: self.retry.map(|secs| Duration::from_secs(secs.max(1))),
        }
    }
}

/// Arguments for the `fetch` command.
#[derive(Parser, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub timing: TimingArgs,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub timing: TimingArgs,

    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}
