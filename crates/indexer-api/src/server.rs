use axum::routing::{get, post};
use axum::Router;
use indexer_core::IndexerConfig;
use indexer_db::DatabasePool;
use indexer_processor::Backfill;
use indexer_sync::{PendingTracker, SyncEngine, SyncOrchestrator};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::routes;

/// Shared handles behind every route
#[derive(Clone)]
pub struct AppState {
    pub config: IndexerConfig,
    pub db: Arc<DatabasePool>,
    pub engine: Arc<SyncEngine>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub tracker: Arc<PendingTracker>,
    pub backfill: Arc<Backfill>,
    pub metrics: PrometheusHandle,
}

/// REST control and browse surface over the indexer
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(state: AppState, cors_enabled: bool) -> Router {
        let cors = if cors_enabled {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        };

        Router::new()
            .route("/health", get(routes::health))
            .route("/status", get(routes::status))
            .route("/events", get(routes::events))
            .route("/metrics", get(routes::metrics))
            .route("/indexer/start", post(routes::indexer_start))
            .route("/indexer/stop", post(routes::indexer_stop))
            .route("/indexer/restart", post(routes::indexer_restart))
            .route("/backfill", post(routes::backfill))
            .route("/sync", post(routes::sync_full))
            .route(
                "/sync/organizations/{org_id}",
                post(routes::sync_organization),
            )
            .route("/organizations/{org_id}", get(routes::organization_detail))
            .route("/credentials/{token_id}", get(routes::credential_detail))
            .route("/requests/{request_id}", get(routes::request_detail))
            .route("/transactions", post(routes::register_transaction))
            .route("/transactions/{tx_hash}", get(routes::transaction_status))
            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> crate::Result<()> {
        let addr = self.config.address();
        let app = Self::router(self.state, self.config.cors_enabled);

        info!(address = %addr, "Starting API server");

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::ApiError::Server(e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| crate::ApiError::Server(e.to_string()))?;

        Ok(())
    }
}
