use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shardgate_api::{router, AppState};
use shardgate_process::{
    BaseProcessor, CoreProcessor, ElasticReader, HeartbeatProcessor, HistoryReader,
    NetworkProcessor, TransactionProcessor,
};

mod config;

use config::GatewayConfig;

#[derive(Parser)]
#[command(name = "shardgate", about = "Routing gateway for sharded observer nodes")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "shardgate.toml")]
    config: PathBuf,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8079)]
    port: u16,

    /// Default log filter, overridden by RUST_LOG when set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let request_timeout = Duration::from_secs(config.request_timeout_secs);

    let base = Arc::new(BaseProcessor::new(request_timeout)?);
    base.apply_config(config.observers.clone())?;
    info!(
        observers = config.observers.len(),
        shards = base.shard_ids().len(),
        pool_queries = config.allow_pool_queries,
        "observer registry loaded"
    );

    let core: Arc<dyn CoreProcessor> = base;
    let transactions = Arc::new(TransactionProcessor::new(
        core.clone(),
        config.event_markers(),
        config.allow_pool_queries,
    ));
    let heartbeat = Arc::new(HeartbeatProcessor::new(
        core.clone(),
        Duration::from_secs(config.heartbeat_cache_secs),
    )?);
    heartbeat.clone().spawn_cache_update();

    let history: Option<Arc<dyn HistoryReader>> = match &config.history {
        Some(history) => {
            info!(url = %history.url, "secondary index enabled");
            Some(Arc::new(ElasticReader::new(&history.url, request_timeout)?))
        }
        None => None,
    };

    let state = AppState {
        transactions,
        heartbeat,
        network: Arc::new(NetworkProcessor::new(core)),
        history,
    };

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
