use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use indexer_db::models::DbRawEvent;
use indexer_db::repositories::{
    ApprovalRequestRepository, CredentialRepository, EventBrowseFilter, EventStoreRepository,
    OrganizationRepository, RoleGrantRepository, SyncStatusRepository,
};
use indexer_processor::BackfillReport;
use indexer_sync::{OrgScope, ProviderHealth, SyncResult, SyncTarget, TrackedTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::server::AppState;
use crate::{ApiError, Result};

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub chain_id: u64,
    pub registry_address: String,
    pub sync_mode: String,
    pub last_synced_block: i64,
    pub finalized_block: i64,
    pub last_full_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub unprocessed_events: i64,
    pub organizations: i64,
    pub providers: Vec<ProviderHealth>,
}

pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let sync = SyncStatusRepository::get(state.db.inner()).await?;
    let unprocessed = EventStoreRepository::count_unprocessed(state.db.inner()).await?;
    let organizations = OrganizationRepository::count(state.db.inner()).await?;

    let (last_synced_block, finalized_block, sync_mode, last_full_sync_at) = match sync {
        Some(row) => (
            row.last_synced_block,
            row.finalized_block,
            row.sync_mode,
            row.last_full_sync_at,
        ),
        None => (0, 0, state.config.sync_mode.as_str().to_string(), None),
    };

    Ok(Json(StatusResponse {
        running: state.engine.is_running(),
        chain_id: state.config.chain_id,
        registry_address: format!("{:?}", state.config.registry_address),
        sync_mode,
        last_synced_block,
        finalized_block,
        last_full_sync_at,
        last_error: state.engine.last_error(),
        unprocessed_events: unprocessed,
        organizations,
        providers: state.engine.provider_health(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub from_block: Option<i64>,
    pub to_block: Option<i64>,
    pub event_name: Option<String>,
    pub tx_hash: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<DbRawEvent>>> {
    let filter = EventBrowseFilter {
        from_block: query.from_block,
        to_block: query.to_block,
        event_name: query.event_name,
        tx_hash: query.tx_hash,
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };
    let rows = EventStoreRepository::browse(state.db.inner(), &filter).await?;
    Ok(Json(rows))
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

pub async fn indexer_start(State(state): State<AppState>) -> Result<Json<Value>> {
    state.engine.start().await?;
    Ok(Json(json!({ "running": true })))
}

pub async fn indexer_stop(State(state): State<AppState>) -> Result<Json<Value>> {
    state.engine.stop().await;
    Ok(Json(json!({ "running": false })))
}

pub async fn indexer_restart(State(state): State<AppState>) -> Result<Json<Value>> {
    state.engine.restart().await?;
    Ok(Json(json!({ "running": true })))
}

#[derive(Debug, Deserialize, Default)]
pub struct BackfillRequest {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub batch_size: Option<i64>,
}

pub async fn backfill(
    State(state): State<AppState>,
    body: Option<Json<BackfillRequest>>,
) -> Result<Json<BackfillReport>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let mode = request.mode.as_deref().unwrap_or("reprocess");
    info!(mode = mode, "Backfill requested");

    let report = match mode {
        "reprocess" => {
            state
                .backfill
                .reprocess(request.batch_size.unwrap_or(500))
                .await?
        }
        "reconcile" => state.backfill.reconcile().await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown backfill mode '{}', expected reprocess or reconcile",
                other
            )))
        }
    };
    Ok(Json(report))
}

pub async fn sync_full(State(state): State<AppState>) -> Result<Json<SyncResult>> {
    let result = state.orchestrator.sync(SyncTarget::Full).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Default)]
pub struct SyncScopeQuery {
    pub scope: Option<String>,
}

pub async fn sync_organization(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
    Query(query): Query<SyncScopeQuery>,
) -> Result<Json<SyncResult>> {
    if org_id < 0 {
        return Err(ApiError::BadRequest("org_id must be non-negative".into()));
    }
    let scope = match query.scope.as_deref() {
        None | Some("all") => OrgScope::All,
        Some("roles") => OrgScope::Roles,
        Some("credentials") => OrgScope::Credentials,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "unknown scope '{}', expected roles or credentials",
                other
            )))
        }
    };
    let result = state
        .orchestrator
        .sync(SyncTarget::Organization { org_id, scope })
        .await?;
    Ok(Json(result))
}

pub async fn organization_detail(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<Json<Value>> {
    let org = OrganizationRepository::get(state.db.inner(), org_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("organization {}", org_id)))?;
    let roles = RoleGrantRepository::for_organization(state.db.inner(), org_id).await?;
    let credentials = CredentialRepository::for_organization(state.db.inner(), org_id).await?;

    Ok(Json(json!({
        "organization": org,
        "role_grants": roles,
        "credentials": credentials,
    })))
}

pub async fn credential_detail(
    State(state): State<AppState>,
    Path(token_id): Path<i64>,
) -> Result<Json<Value>> {
    let credential = CredentialRepository::get(state.db.inner(), token_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("credential {}", token_id)))?;
    Ok(Json(json!({ "credential": credential })))
}

pub async fn request_detail(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
) -> Result<Json<Value>> {
    let request = ApprovalRequestRepository::get(state.db.inner(), request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("request {}", request_id)))?;
    let approvals = ApprovalRequestRepository::approvals(state.db.inner(), request_id).await?;

    Ok(Json(json!({
        "request": request,
        "approvals": approvals,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterTransactionRequest {
    pub tx_hash: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub org_id: Option<i64>,
    pub initiator: Option<String>,
}

pub async fn register_transaction(
    State(state): State<AppState>,
    Json(request): Json<RegisterTransactionRequest>,
) -> Result<Json<Value>> {
    if !is_tx_hash(&request.tx_hash) {
        return Err(ApiError::BadRequest(
            "tx_hash must be a 0x-prefixed 32-byte hex string".into(),
        ));
    }

    let row = state
        .tracker
        .register(
            &request.tx_hash,
            &request.action,
            request.entity_type.as_deref(),
            request.entity_id,
            request.org_id,
            request.initiator.as_deref(),
        )
        .await?;
    Ok(Json(json!({ "transaction": row })))
}

pub async fn transaction_status(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<TrackedTransaction>> {
    let tracked = state
        .tracker
        .status(&tx_hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("transaction {} not registered", tx_hash)))?;
    Ok(Json(tracked))
}

fn is_tx_hash(s: &str) -> bool {
    s.len() == 66
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_validation() {
        let good = format!("0x{}", "ab".repeat(32));
        assert!(is_tx_hash(&good));
        assert!(!is_tx_hash("0x1234"));
        assert!(!is_tx_hash(&format!("0y{}", "ab".repeat(32))));
        assert!(!is_tx_hash(&format!("0x{}", "zz".repeat(32))));
    }
}
