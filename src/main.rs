use indexer_api::{ApiConfig, ApiServer, AppState};
use indexer_core::IndexerConfig;
use indexer_db::{DatabaseConfig, DatabasePool};
use indexer_processor::Backfill;
use indexer_sync::{PendingTracker, SyncEngine, SyncOrchestrator};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("indexer_sync=info".parse()?)
                .add_directive("indexer_processor=info".parse()?),
        )
        .init();

    info!("Registry indexer starting...");

    let config = match IndexerConfig::load() {
        Ok(config) => {
            info!(
                chain_id = config.chain_id,
                registry = ?config.registry_address,
                start_block = config.start_block,
                providers = config.providers.len(),
                mode = config.sync_mode.as_str(),
                tier = config.tier.as_str(),
                "Configuration loaded from deployment"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let db_config = DatabaseConfig::from_env();
    let db = match DatabasePool::new(&db_config).await {
        Ok(pool) => {
            if let Err(e) = pool.migrate().await {
                error!(error = %e, "Failed to run database migrations");
                std::process::exit(1);
            }
            info!("Database connected and migrations applied");
            Arc::new(pool)
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to install metrics recorder");
            std::process::exit(1);
        }
    };

    let engine = match SyncEngine::new(config.clone(), db.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, "Failed to create sync engine");
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(SyncOrchestrator::new(
        config.clone(),
        db.clone(),
        engine.fetcher().clone(),
    ));
    let tracker = Arc::new(PendingTracker::new(
        db.clone(),
        config.pending_tx_timeout_secs,
    ));
    let backfill = Arc::new(Backfill::new(db.clone()));

    if let Err(e) = engine.start().await {
        error!(error = %e, "Failed to start sync engine");
        std::process::exit(1);
    }

    let api_config = ApiConfig::from_env();
    let state = AppState {
        config: config.clone(),
        db: db.clone(),
        engine: engine.clone(),
        orchestrator,
        tracker,
        backfill,
        metrics,
    };
    let api_server = ApiServer::new(api_config, state);
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            error!(error = %e, "API server error");
        }
    });

    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received (Ctrl+C)");

    engine.stop().await;
    api_handle.abort();

    db.close().await;
    info!("Registry indexer shutdown complete");
    Ok(())
}
