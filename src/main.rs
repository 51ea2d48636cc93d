//! GoalShockEngine - Main Entry Point
//!
//! Connects to the live-score feed, trades goal shocks on the exchange and
//! runs until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use goal_shock_engine::common::channels::{create_feed_channel, create_report_channel};
use goal_shock_engine::config::{load_config, load_from_env};
use goal_shock_engine::{
    Dispatcher, EligibilityEvaluator, Engine, ExchangeClient, ExitRules, FixedUnderdogOracle,
    LatencyTracker, MarketPort, PaperMarketPort, ReportTally, ScoreFeedClient, TradingHalt,
    UnderdogOracle,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file; plain environment variables are used when it does not exist
    #[arg(short, long, default_value = "config.toml", env = "GOAL_SHOCK_CONFIG")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Quote live prices but simulate fills
    #[arg(long)]
    dry_run: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: Level, json: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn log_latency(latency: &LatencyTracker) {
    match latency.stats() {
        Some(stats) => info!("Goal-to-order latency: {}", stats),
        None => info!("Goal-to-order latency: no orders yet"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config = if Path::new(&args.config).exists() {
        load_config(Some(&args.config))
    } else {
        load_from_env()
    }
    .context("failed to load configuration")?;

    if args.dry_run {
        config.trading.dry_run = true;
    }

    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.settings.log_level));
    init_logging(level, args.json_logs)?;

    info!("Starting GoalShockEngine");
    info!("Configuration file: {}", args.config);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e).context("refusing to start");
    }

    let trading = Arc::new(config.trading.clone());

    let exchange: Arc<dyn MarketPort> = Arc::new(ExchangeClient::from_config(&config.exchange)?);
    let port: Arc<dyn MarketPort> = if trading.dry_run {
        warn!("Dry run: orders are simulated, quotes are live");
        Arc::new(PaperMarketPort::new(exchange))
    } else {
        exchange
    };
    info!("Market port: {}", port.port_name());

    // No pre-event odds source yet; every goal fails the underdog gate
    let oracle: Arc<dyn UnderdogOracle> = Arc::new(FixedUnderdogOracle::default());

    let halt = TradingHalt::new(trading.start_halted);
    if halt.is_halted() {
        warn!("Trading starts halted");
    }

    let (report_tx, report_rx) = create_report_channel();
    let evaluator = EligibilityEvaluator::new(Arc::clone(&trading), Arc::clone(&port), oracle);
    let dispatcher = Dispatcher::new(
        evaluator,
        port,
        ExitRules::from(trading.as_ref()),
        halt.clone(),
        Some(report_tx),
    );
    let latency = dispatcher.latency();

    let (feed_tx, feed_rx) = create_feed_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed = ScoreFeedClient::from_config(&config.feed)?;
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed.run(feed_tx, shutdown_rx).await {
            error!("Score feed stopped: {}", e);
        }
    });

    let engine_task = tokio::spawn(Engine::new(dispatcher).run(feed_rx));
    let report_task = tokio::spawn(ReportTally::default().run(report_rx));

    let stats_latency = Arc::clone(&latency);
    let stats_every = Duration::from_secs(config.settings.stats_interval_seconds.max(1));
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(stats_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            log_latency(&stats_latency);
        }
    });

    info!("Application initialized successfully");

    // Keep the application running
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");

    halt.halt();
    let _ = shutdown_tx.send(true);
    stats_task.abort();

    feed_task.await?;
    let engine_stats = engine_task.await?;
    info!("Engine: {:?}", engine_stats);

    // Open position monitors keep report senders alive; do not wait on them
    match tokio::time::timeout(Duration::from_secs(1), report_task).await {
        Ok(Ok(tally)) => info!("Reports: {:?}", tally),
        _ => info!("Position monitors still running at shutdown"),
    }
    log_latency(&latency);

    Ok(())
}
