use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podcast_ingest::{
    config::Config,
    database::{
        Database,
        repositories::{EpisodeSeaOrmRepository, JobStoreSeaOrmRepository},
    },
    ingestor::EpisodeIngester,
    job_scheduling::{ExecutionLogPruner, JobExecutor, SchedulerEngine, SchedulerSettings},
    observability::AppObservability,
    sources::RssFeedSource,
    utils::StandardHttpClient,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "podcast-ingest")]
#[command(version)]
#[command(about = "Scheduled podcast feed ingestion with a persistent job store")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("podcast_ingest={}", cli.log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    info!("Starting podcast-ingest v{}", env!("CARGO_PKG_VERSION"));

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration from specified file
    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    config.validate()?;

    let settings = SchedulerSettings::from_config(&config.scheduler)?;
    info!(
        "Scheduler timezone: {}, {} feed(s) configured",
        settings.timezone,
        config.feeds.len()
    );

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let observability = AppObservability::new("podcast-ingest");

    let connection = database.connection().clone();
    let job_store = JobStoreSeaOrmRepository::new(connection.clone());
    let episodes = EpisodeSeaOrmRepository::new(connection);

    let http_client = StandardHttpClient::new(&config.fetch)?;
    let feed_source = Arc::new(RssFeedSource::new(http_client));
    let executor = JobExecutor::new(
        feed_source,
        EpisodeIngester::new(episodes, settings.timezone),
        ExecutionLogPruner::new(job_store.clone()),
        observability.clone(),
    );

    let mut engine = SchedulerEngine::new(job_store, executor, observability.clone(), settings);
    let now = Utc::now();
    engine
        .register(&config.job_definitions(), now)
        .await
        .context("failed to register jobs")?;
    let scheduled = engine.load(now).await.context("failed to load jobs")?;
    info!("{} job(s) scheduled", scheduled);

    let cancellation_token = CancellationToken::new();
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => signal_token.cancel(),
            Err(e) => error!("Failed to listen for shutdown signals: {}", e),
        }
    });

    engine.run(cancellation_token).await?;

    observability.shutdown();
    database.close().await?;
    Ok(())
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down gracefully");
    }

    Ok(())
}
