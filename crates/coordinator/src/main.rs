//! Unite settlement coordinator service
//!
//! Loads configuration, starts tracing, the metrics endpoint and the order
//! API, opens the configured order store and runs the coordinator until
//! Ctrl-C. With `--local-resolver` a resolver agent shares the process and
//! channel.
//!
//! The binary only drives the built-in mock chains, so it accepts `local`
//! environments only. Testnet and mainnet configs such as
//! `config/testnet.toml` are loaded by deployments that embed the library
//! and register live chain adapters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use unite_chain::{ChainAdapterRegistry, MockChainAdapter};
use unite_channel::{InMemoryChannel, NotificationChannel};
use unite_config::{
    validate_config, AppConfig, ConfigLoader, Environment, StoreBackend, ENV_PREFIX,
};
use unite_coordinator::{CoordinatorSettings, OrderApi, SettlementCoordinator};
use unite_metrics::{
    init_tracing, init_tracing_with_metrics, ChainHealth, MetricsCollector, MetricsServer,
};
use unite_resolver::{FixedRateQuoter, ResolverAgent, ResolverSettings};
use unite_settlement::{InMemoryStore, SettlementBackend, SqliteStore};

/// Unite settlement coordinator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML, YAML or JSON config file; local defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured metrics port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Override the configured order API port
    #[arg(long)]
    api_port: Option<u16>,

    /// Also run the configured resolver in-process against the mock chains
    #[arg(long)]
    local_resolver: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, ENV_PREFIX)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::local(),
    };
    if let Some(port) = args.metrics_port {
        config.network.metrics_port = port;
    }
    if let Some(port) = args.api_port {
        config.network.api_port = port;
    }
    validate_config(&config)?;

    if config.network.metrics_enabled {
        init_tracing_with_metrics()?;
    } else {
        init_tracing()?;
    }

    info!(
        environment = ?config.network.environment,
        store = ?config.coordinator.store,
        chains = config.chains.len(),
        "starting unite coordinator"
    );

    let metrics = Arc::new(MetricsCollector::new());
    let health = Arc::new(ChainHealth::new());
    if config.network.metrics_enabled {
        let server = MetricsServer::new(
            metrics.clone(),
            format!("0.0.0.0:{}", config.network.metrics_port),
        )
        .with_health(health.clone());
        tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                error!(error = %e, "metrics server stopped");
            }
        });
    }

    match config.coordinator.store {
        StoreBackend::Memory => {
            warn!("using in-memory order store, state is lost on restart");
            run(Arc::new(InMemoryStore::new()), &config, &args, metrics, health).await
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::new(&config.coordinator.database_path)
                .await
                .with_context(|| format!("opening {}", config.coordinator.database_path))?;
            run(Arc::new(store), &config, &args, metrics, health).await
        }
    }
}

async fn run<S>(
    store: Arc<S>,
    config: &AppConfig,
    args: &Args,
    metrics: Arc<MetricsCollector>,
    health: Arc<ChainHealth>,
) -> anyhow::Result<()>
where
    S: SettlementBackend + 'static,
{
    let adapters = chain_adapters(config)?;

    let monitored = adapters.clone();
    let interval = config.coordinator.sweep_interval();
    tokio::spawn(async move {
        loop {
            health.update(monitored.health_check().await);
            tokio::time::sleep(interval).await;
        }
    });

    let channel: Arc<dyn NotificationChannel> = Arc::new(InMemoryChannel::new());

    let coordinator = SettlementCoordinator::new(
        store,
        channel.clone(),
        adapters.clone(),
        CoordinatorSettings::from_config(config),
    )
    .with_metrics(metrics);

    let api = OrderApi::new(coordinator.clone());
    let api_addr = format!("0.0.0.0:{}", config.network.api_port);
    tokio::spawn(async move {
        if let Err(e) = api.serve(&api_addr).await {
            error!(error = %e, "order api stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if args.local_resolver {
        let settings = ResolverSettings::from_config(&config.resolver);
        info!(resolver = %settings.address, "starting in-process resolver");
        let quoter = FixedRateQuoter::new("local").with_default_rate(Decimal::ONE);
        let agent = Arc::new(ResolverAgent::new(
            settings,
            channel.clone(),
            adapters.clone(),
            Arc::new(quoter),
        ));
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = agent.run(shutdown).await {
                error!(error = %e, "resolver stopped");
            }
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    coordinator.run(shutdown_rx).await?;
    Ok(())
}

/// Only the in-process mock adapters ship with the coordinator; live chain
/// adapters are registered by the deployment embedding the library.
fn chain_adapters(config: &AppConfig) -> anyhow::Result<ChainAdapterRegistry> {
    if config.network.environment != Environment::Local {
        anyhow::bail!(
            "no built-in chain adapters for {:?}; this config is for deployments embedding unite-coordinator with live adapters",
            config.network.environment
        );
    }

    let mut registry = ChainAdapterRegistry::new();
    for chain_id in config.chains.keys() {
        registry.register(Arc::new(MockChainAdapter::new(chain_id.as_str())));
    }
    Ok(registry)
}
