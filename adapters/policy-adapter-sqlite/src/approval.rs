//! Approval requests
//!
//! Status transitions are conditional UPDATEs on `status='P'`; a request
//! that is no longer pending is never modified.

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use warden_types::escalation::{
	ActionContext, ApprovalRequest, ApprovalStatus, CreateApprovalData, EscalationTarget,
	ListApprovalOptions, ResolveApprovalData,
};
use warden_types::prelude::*;

use crate::utils::*;

const APPROVAL_COLUMNS: &str = "approval_id, rule_id, admin_id, resource_code, action_code, context,
	escalate_role, escalate_admin, status, created_at, resolved_at, resolved_by, resolution_note";

fn row_to_approval(row: &SqliteRow) -> Result<ApprovalRequest, sqlx::Error> {
	let escalate_to = EscalationTarget::from_columns(
		row.try_get("escalate_role")?,
		row.try_get("escalate_admin")?,
	)
	.ok_or_else(|| sqlx::Error::Decode("approval request without target".into()))?;
	let status: &str = row.try_get("status")?;
	let status = ApprovalStatus::from_code(status)
		.ok_or_else(|| sqlx::Error::Decode(format!("invalid approval status: {}", status).into()))?;
	let context: &str = row.try_get("context")?;
	let context_snapshot: ActionContext =
		serde_json::from_str(context).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

	Ok(ApprovalRequest {
		approval_id: row.try_get("approval_id")?,
		rule_id: row.try_get("rule_id")?,
		admin_id: row.try_get("admin_id")?,
		resource_code: row.try_get("resource_code")?,
		action_code: row.try_get("action_code")?,
		context_snapshot,
		escalate_to,
		status,
		created_at: Timestamp(row.try_get("created_at")?),
		resolved_at: row.try_get::<Option<i64>, _>("resolved_at")?.map(Timestamp),
		resolved_by: row.try_get("resolved_by")?,
		resolution_note: row.try_get("resolution_note")?,
	})
}

pub(crate) async fn create(db: &SqlitePool, data: &CreateApprovalData<'_>) -> WdResult<ApprovalRequest> {
	let (escalate_role, escalate_admin) = data.escalate_to.as_columns();
	let res = sqlx::query(&format!(
		"INSERT INTO approval_requests (rule_id, admin_id, resource_code, action_code, context,
			escalate_role, escalate_admin, status, created_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, 'P', ?)
		RETURNING {}",
		APPROVAL_COLUMNS
	))
	.bind(data.rule_id)
	.bind(data.admin_id)
	.bind(data.resource_code)
	.bind(data.action_code)
	.bind(serde_json::to_string(data.context_snapshot)?)
	.bind(escalate_role)
	.bind(escalate_admin)
	.bind(data.created_at.0)
	.fetch_one(db)
	.await;

	map_res(res, row_to_approval)
}

pub(crate) async fn read(db: &SqlitePool, approval_id: i64) -> WdResult<ApprovalRequest> {
	let res = sqlx::query(&format!(
		"SELECT {} FROM approval_requests WHERE approval_id=?",
		APPROVAL_COLUMNS
	))
	.bind(approval_id)
	.fetch_one(db)
	.await;

	map_res(res, row_to_approval)
}

pub(crate) async fn list(
	db: &SqlitePool,
	opts: &ListApprovalOptions<'_>,
) -> WdResult<Vec<ApprovalRequest>> {
	let mut query = sqlx::QueryBuilder::new(format!(
		"SELECT {} FROM approval_requests WHERE 1=1",
		APPROVAL_COLUMNS
	));
	if let Some(status) = opts.status {
		query.push(" AND status=").push_bind(status.code());
	}
	if let Some(admin_id) = opts.admin_id {
		query.push(" AND admin_id=").push_bind(admin_id);
	}
	match opts.escalate_to {
		Some(EscalationTarget::Role(role)) => {
			query.push(" AND escalate_role=").push_bind(&**role);
		}
		Some(EscalationTarget::Admin(admin)) => {
			query.push(" AND escalate_admin=").push_bind(&**admin);
		}
		None => {}
	}
	query.push(" ORDER BY created_at, approval_id");
	if let Some(limit) = opts.limit {
		query.push(" LIMIT ").push_bind(i64::from(limit));
	}

	let rows = query.build().fetch_all(db).await.map_err(db_err)?;
	collect_res(rows.iter().map(row_to_approval))
}

pub(crate) async fn resolve(
	db: &SqlitePool,
	approval_id: i64,
	data: &ResolveApprovalData<'_>,
) -> WdResult<ApprovalRequest> {
	if !data.status.is_terminal() {
		return Err(Error::ValidationError("approval can only move to a terminal status".into()));
	}

	let res = sqlx::query(&format!(
		"UPDATE approval_requests SET status=?, resolved_at=?, resolved_by=?, resolution_note=?
		WHERE approval_id=? AND status='P'
		RETURNING {}",
		APPROVAL_COLUMNS
	))
	.bind(data.status.code())
	.bind(data.resolved_at.0)
	.bind(data.resolved_by)
	.bind(data.note)
	.bind(approval_id)
	.fetch_optional(db)
	.await
	.map_err(db_err)?;

	match res {
		Some(row) => row_to_approval(&row).inspect_err(inspect).map_err(|_| Error::DbError),
		None => {
			// Either unknown or already resolved
			let current = read(db, approval_id).await?;
			Err(Error::Conflict(format!(
				"approval request {} is no longer pending ({:?})",
				approval_id, current.status
			)))
		}
	}
}

pub(crate) async fn expire(db: &SqlitePool, created_before: Timestamp, at: Timestamp) -> WdResult<u64> {
	let res = sqlx::query(
		"UPDATE approval_requests SET status='E', resolved_at=?
		WHERE status='P' AND created_at<?",
	)
	.bind(at.0)
	.bind(created_before.0)
	.execute(db)
	.await
	.map_err(db_err)?;

	Ok(res.rows_affected())
}

// vim: ts=4
