//! linkrot service entry point
//!
//! The `serve` subcommand runs the re-check scheduler and the webhook
//! dispatcher; the other subcommands exercise the pipeline and the
//! administrative migrations by hand.

use anyhow::Context;
use clap::{Parser, Subcommand};
use linkrot::config::{load_config, Config};
use linkrot::crawler::{Coordinator, Fetcher, Scheduler};
use linkrot::hash::url_key;
use linkrot::storage::{Frequency, RedisStorage, Storage};
use linkrot::webhook::WebhookDispatcher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// linkrot: URL liveness monitoring
#[derive(Parser, Debug)]
#[command(name = "linkrot")]
#[command(version = "1.0.0")]
#[command(about = "URL liveness monitoring service", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "linkrot.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the re-check scheduler and the webhook dispatcher
    Serve,

    /// Check one URL now and print the stored record
    Check {
        url: String,

        /// Group to file the URL under
        #[arg(long)]
        group: Option<String>,

        /// Re-check cadence (hourly, daily or monthly)
        #[arg(long, requires = "group")]
        frequency: Option<Frequency>,

        /// Callback URL notified when the check completes
        #[arg(long)]
        callback_url: Option<String>,
    },

    /// Print the stored record for a URL as JSON
    Show { url: String },

    /// Delete every stored URL record for a domain
    PurgeDomain { domain: String },

    /// Re-split legacy content-type values carrying a charset
    SplitContentTypes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = load_config(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let storage = Arc::new(
        RedisStorage::connect(
            &config.storage.redis_url,
            Duration::from_secs(config.storage.check_flag_ttl),
        )
        .await
        .context("connecting to the key-value store")?,
    );

    match cli.command {
        Command::Serve => serve(config, storage).await,
        Command::Check {
            url,
            group,
            frequency,
            callback_url,
        } => check_once(config, storage, url, group, frequency, callback_url).await,
        Command::Show { url } => show(storage, &url).await,
        Command::PurgeDomain { domain } => {
            let deleted = linkrot::migrations::delete_urls_for(storage.as_ref(), &domain).await?;
            println!("{} records deleted", deleted);
            Ok(())
        }
        Command::SplitContentTypes => {
            let rewritten = linkrot::migrations::split_content_types(storage.as_ref()).await?;
            println!("{} records rewritten", rewritten);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkrot=info,warn"),
            1 => EnvFilter::new("linkrot=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs the long-lived service: cadence timers feeding the coordinator and
/// the webhook dispatcher consuming its crawled events.
async fn serve(config: Config, storage: Arc<RedisStorage>) -> anyhow::Result<()> {
    let fetcher = Fetcher::new(&config.fetcher)?;
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&storage),
        fetcher,
        config.fetcher.max_concurrent_probes,
    ));

    let dispatcher = Arc::new(WebhookDispatcher::new(Arc::clone(&storage), &config.webhook)?);
    tokio::spawn(Arc::clone(&dispatcher).run(coordinator.subscribe()));

    let scheduler = Arc::new(Scheduler::new(Arc::clone(&storage), Arc::clone(&coordinator)));
    let timers = scheduler.spawn();
    tracing::info!("linkrot serving, {} cadence timers running", timers.len());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutting down");
    Ok(())
}

/// Runs a single check end to end, including webhook deliveries, and prints
/// the stored record.
async fn check_once(
    config: Config,
    storage: Arc<RedisStorage>,
    url: String,
    group: Option<String>,
    frequency: Option<Frequency>,
    callback_url: Option<String>,
) -> anyhow::Result<()> {
    let fetcher = Fetcher::new(&config.fetcher)?;
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&storage),
        fetcher,
        config.fetcher.max_concurrent_probes,
    ));
    let dispatcher = Arc::new(WebhookDispatcher::new(Arc::clone(&storage), &config.webhook)?);

    if let Some(callback_url) = &callback_url {
        coordinator.register_webhook(&url, callback_url).await?;
    }

    let mut events = coordinator.subscribe();
    coordinator
        .check(&url, group.as_deref(), frequency)
        .await?;

    while let Ok(record) = events.try_recv() {
        dispatcher.dispatch(&record).await;
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

/// Prints the stored record for a URL.
async fn show(storage: Arc<RedisStorage>, url: &str) -> anyhow::Result<()> {
    match storage.get_url(&url_key(url)).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!("no record stored for {}", url),
    }
}
