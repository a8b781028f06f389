//! QuakeBoard - live earthquake dashboard.
//!
//! Keeps a rolling window of the most recent seismic records, walks a
//! highlight cursor over it on a timer, and refetches the feed once the
//! cursor exhausts the window. The same snapshots drive a terminal view
//! and a web dashboard with a map overlay.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

mod cli;
mod client;
mod cursor;
mod errors;
mod models;
mod output;
mod overlay;
mod server;
mod sync;
mod window;

use cli::{Cli, Command};
use client::FeedClient;
use sync::SyncHandle;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;

    match cli.command {
        Command::Fetch(args) => runtime.block_on(cmd_fetch(args)),
        Command::Watch(args) => runtime.block_on(cmd_watch(args)),
        Command::Serve(args) => runtime.block_on(cmd_serve(args)),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `fetch` command - one-shot fetch of the current window.
async fn cmd_fetch(args: cli::FetchArgs) -> Result<()> {
    let client =
        FeedClient::new(&args.feed.feed_config()).context("failed to create feed client")?;

    let window = client
        .fetch_window(args.feed.page_size)
        .await
        .context("failed to fetch quake feed")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_window(&mut handle, &window, None, args.format)?;

    Ok(())
}

/// Execute the `watch` command - run the dashboard in the terminal.
async fn cmd_watch(args: cli::WatchArgs) -> Result<()> {
    let client =
        FeedClient::new(&args.feed.feed_config()).context("failed to create feed client")?;
    let sync = args.timing.sync_config(args.feed.page_size);

    tracing::info!(
        "watching {} ({} records, tick every {:?})",
        client.endpoint(),
        sync.page_size,
        sync.tick_interval
    );

    let handle = SyncHandle::spawn(client, sync);
    let mut snapshots = handle.subscribe();
    let mut last_generation = None;

    loop {
        {
            let snapshot = snapshots.borrow_and_update().clone();
            let stdout = io::stdout();
            let mut out = stdout.lock();
            output::write_snapshot(&mut out, &snapshot, last_generation, args.format)?;
            out.flush()?;
            last_generation = Some(snapshot.generation);
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Execute the `serve` command - start the web dashboard.
async fn cmd_serve(args: cli::ServeArgs) -> Result<()> {
    let client =
        FeedClient::new(&args.feed.feed_config()).context("failed to create feed client")?;
    let sync = args.timing.sync_config(args.feed.page_size);
    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 QuakeBoard\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{url}\x1b[0m");
    println!("  Feed:    {}", client.endpoint());
    println!("  Window:  {} records", sync.page_size);
    println!("  Tick:    {}s", sync.tick_interval.as_secs());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    server::run_server(config, client, sync).await
}
