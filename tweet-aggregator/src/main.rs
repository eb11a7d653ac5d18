use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tweet_aggregator::{server, AggregatorConfig, CycleScheduler, Feed, TweetAggregator};

#[derive(Debug, Parser)]
#[command(name = "tweet-aggregator", version, about = "Polls twitter timelines into a merged, cached feed")]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra feed as `screenname` or `screenname:tag1,tag2`
    #[arg(short, long = "feed")]
    feeds: Vec<Feed>,

    #[arg(long)]
    port: Option<u16>,

    /// Seconds between cycles
    #[arg(long)]
    refresh_time: Option<u64>,

    #[arg(long)]
    no_server: bool,

    /// Serve the bundled sample timeline instead of calling the API
    #[arg(long)]
    test_data: bool,

    #[arg(long)]
    log_reports: bool,

    /// Run a single cycle, print the result and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AggregatorConfig::from_file(path)?,
        None => AggregatorConfig::default(),
    };
    config.apply_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(refresh_time) = cli.refresh_time {
        config.refresh_time = refresh_time;
    }
    config.server &= !cli.no_server;
    config.use_test_data |= cli.test_data;
    config.log_reports |= cli.log_reports;

    let aggregator = TweetAggregator::builder(config)
        .feeds(cli.feeds)
        .build()
        .context("Invalid aggregator configuration")?;
    let aggregator = Arc::new(aggregator);
    let config = aggregator.config().clone();
    aggregator.reporter().log_start_message(&config, aggregator.feeds().len());

    let scheduler = CycleScheduler::new(aggregator.clone());

    if cli.once {
        if let Some(report) = scheduler.run_once().await.report() {
            for failure in &report.failures {
                error!("@{}: {}", failure.screenname, failure.error);
            }
            println!("{}", serde_json::to_string_pretty(aggregator.cache().read().await.as_slice())?);
            info!("Cycle finished with {} tweets in {:?}", report.item_count, report.elapsed);
        }
        return Ok(());
    }

    scheduler.start(config.refresh_interval()).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = if config.server {
        let listener = server::bind(config.port)
            .await
            .with_context(|| format!("Failed to bind query server on port {}", config.port))?;
        let router = server::router(aggregator.cache(), &config.url);
        Some(tokio::spawn(server::serve(listener, router, async move {
            let _ = shutdown_rx.await;
        })))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    scheduler.stop().await?;
    let _ = shutdown_tx.send(());
    if let Some(handle) = server_handle {
        if let Err(e) = handle.await? {
            error!("Query server error: {}", e);
        }
    }

    Ok(())
}
