//! toot-absa - aspect-based sentiment analysis worker for Mastodon posts.
//!
//! Pops posts from a Redis list, analyzes them and bulk-indexes the results.

use absa_core::{
    AppConfig, CoreError, ErrorRecovery, ErrorReporter, FilterModeTable, QueueError, SinkKind,
    StatsAggregator,
};
use absa_worker::{AnalysisPipeline, Worker, WorkerSettings};
use clap::Parser;
use index_sink::{build_sink, BatchWriter};
use queue_client::RedisQueue;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "toot_absa=info,absa_worker=info,absa_engine=info,absa_core=info,index_sink=info,queue_client=info";

#[derive(Parser)]
#[command(name = "toot-absa")]
#[command(about = "Aspect-based sentiment analysis worker for Mastodon posts")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "TOOT_ABSA_CONFIG")]
    config: Option<PathBuf>,

    /// Filter mode (strict, balanced, permissive or one defined in the config)
    #[arg(short, long)]
    filter_mode: Option<String>,

    /// Output sink: elasticsearch (es) or jsonl
    #[arg(long)]
    sink: Option<SinkKind>,

    /// Output file for the jsonl sink
    #[arg(long)]
    jsonl_path: Option<PathBuf>,

    /// Documents per bulk request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Validate the configuration, list filter modes and exit
    #[arg(long)]
    check_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(mode) = &self.filter_mode {
            config.worker.filter_mode = mode.trim().to_lowercase();
        }
        if let Some(kind) = self.sink {
            config.sink.kind = kind;
        }
        if let Some(path) = &self.jsonl_path {
            config.sink.jsonl_path = Some(path.clone());
        }
        if let Some(size) = self.batch_size {
            config.sink.batch_size = size;
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, CoreError> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        DEFAULT_LOG_FILTER.replace("=info", "=debug")
    } else {
        DEFAULT_LOG_FILTER.to_string()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let reporter = ErrorReporter::new();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            reporter.report_error(&e);
            return Err(e);
        }
    };

    if cli.check_config {
        let table = FilterModeTable::with_definitions(&config.filter.modes)?;
        let modes: Vec<&str> = table.names().collect();
        info!(
            "Configuration OK: filter_mode={} available=[{}]",
            config.worker.filter_mode,
            modes.join(", ")
        );
        return Ok(());
    }

    run(config).await.inspect_err(|e| reporter.report_error(e))
}

async fn run(config: AppConfig) -> Result<(), CoreError> {
    let stats = StatsAggregator::new();
    let pipeline = AnalysisPipeline::from_config(&config, stats.clone())?;
    info!(
        "Filter mode '{}': min_length={} max_repetition={}",
        pipeline.filter_mode().name,
        pipeline.filter_mode().min_length,
        pipeline.filter_mode().max_repetition
    );

    let sink = build_sink(&config.sink)?;
    if let Err(e) = sink.prepare().await {
        warn!("Sink setup incomplete ({}): {}", sink.describe(), e);
    }
    let writer = BatchWriter::new(sink, &config.sink, stats);

    let queue = connect_queue(&config).await?;
    let worker = Worker::new(
        Arc::new(queue),
        pipeline,
        writer,
        WorkerSettings {
            pop_timeout: Duration::from_secs(config.queue.pop_timeout_secs),
            stats_every: config.worker.stats_every,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Signal received, finishing the current post");
        let _ = shutdown_tx.send(true);
    });

    let stats = worker.run(shutdown_rx).await?;
    info!(
        "Processed {} posts ({} indexed, {} errors)",
        stats.processed, stats.indexed, stats.errors
    );
    Ok(())
}

async fn connect_queue(config: &AppConfig) -> Result<RedisQueue, CoreError> {
    let url = config.queue.redis_url.clone();
    let name = config.queue.queue_name.clone();

    let unreachable = CoreError::Queue(QueueError::ConnectionFailed {
        url: url.clone(),
        reason: String::new(),
    });
    let strategy = ErrorRecovery::determine_strategy(&unreachable);

    ErrorRecovery::apply_strategy(strategy, || {
        let url = url.clone();
        let name = name.clone();
        async move { RedisQueue::connect(&url, &name).await.map_err(CoreError::from) }
    })
    .await
    .into_result()
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
