use indexer_core::types::{RequestAction, RequestStatus};
use indexer_core::Result;
use indexer_db::repositories::{ApprovalRequestRepository, OrganizationRepository};
use sqlx::PgConnection;
use tracing::info;

use super::storage;

pub struct RequestHandler;

impl RequestHandler {
    pub async fn handle_created(
        conn: &mut PgConnection,
        request_id: i64,
        org_id: i64,
        action: RequestAction,
        required_approvals: i32,
        initiator: &str,
        block: i64,
    ) -> Result<()> {
        OrganizationRepository::ensure_placeholder(conn, org_id)
            .await
            .map_err(storage)?;
        ApprovalRequestRepository::insert_created(
            conn,
            request_id,
            org_id,
            action.as_str(),
            required_approvals,
            initiator,
            block,
        )
        .await
        .map_err(storage)?;

        info!(
            request_id = request_id,
            org_id = org_id,
            action = action.as_str(),
            required = required_approvals,
            "Approval request created"
        );
        Ok(())
    }

    /// Insert-if-absent approval, then recompute the count from the
    /// approval rows so replay never double-counts.
    pub async fn handle_approved(
        conn: &mut PgConnection,
        request_id: i64,
        approver: &str,
        block: i64,
    ) -> Result<()> {
        ApprovalRequestRepository::ensure_placeholder(conn, request_id)
            .await
            .map_err(storage)?;
        ApprovalRequestRepository::insert_approval(conn, request_id, approver, block)
            .await
            .map_err(storage)?;
        ApprovalRequestRepository::recompute_approval_count(conn, request_id)
            .await
            .map_err(storage)?;

        info!(request_id = request_id, approver = approver, "Request approved");
        Ok(())
    }

    pub async fn handle_executed(conn: &mut PgConnection, request_id: i64) -> Result<()> {
        ApprovalRequestRepository::ensure_placeholder(conn, request_id)
            .await
            .map_err(storage)?;
        ApprovalRequestRepository::set_status(conn, request_id, RequestStatus::Executed.as_str())
            .await
            .map_err(storage)?;

        info!(request_id = request_id, "Request executed");
        Ok(())
    }

    pub async fn handle_rejected(
        conn: &mut PgConnection,
        request_id: i64,
        rejecter: &str,
    ) -> Result<()> {
        ApprovalRequestRepository::ensure_placeholder(conn, request_id)
            .await
            .map_err(storage)?;
        ApprovalRequestRepository::set_status(conn, request_id, RequestStatus::Rejected.as_str())
            .await
            .map_err(storage)?;

        info!(request_id = request_id, rejecter = rejecter, "Request rejected");
        Ok(())
    }
}
