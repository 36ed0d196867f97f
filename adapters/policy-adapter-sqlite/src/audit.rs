//! Audit log

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use warden_types::audit::{AuditEntry, AuditKind, ListAuditOptions};
use warden_types::prelude::*;

use crate::utils::*;

fn parse_kind(kind: &str) -> Result<AuditKind, sqlx::Error> {
	match kind {
		"authorization" => Ok(AuditKind::Authorization),
		"constraint" => Ok(AuditKind::Constraint),
		"escalation" => Ok(AuditKind::Escalation),
		other => Err(sqlx::Error::Decode(format!("invalid audit kind: {}", other).into())),
	}
}

fn row_to_entry(row: &SqliteRow) -> Result<AuditEntry, sqlx::Error> {
	let detail = match row.try_get::<Option<&str>, _>("detail")? {
		Some(raw) => Some(serde_json::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))?),
		None => None,
	};
	Ok(AuditEntry {
		admin_id: row.try_get("admin_id")?,
		resource_code: row.try_get("resource_code")?,
		action_code: row.try_get("action_code")?,
		permission_code: row.try_get("permission_code")?,
		kind: parse_kind(row.try_get("kind")?)?,
		outcome: row.try_get("outcome")?,
		reason: row.try_get("reason")?,
		detail,
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

pub(crate) async fn append(db: &SqlitePool, entry: &AuditEntry) -> WdResult<()> {
	let detail = entry.detail.as_ref().map(serde_json::to_string).transpose()?;
	sqlx::query(
		"INSERT INTO audit_log (admin_id, resource_code, action_code, permission_code, kind,
			outcome, reason, detail, created_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(&*entry.admin_id)
	.bind(&*entry.resource_code)
	.bind(&*entry.action_code)
	.bind(entry.permission_code.as_deref())
	.bind(entry.kind.as_str())
	.bind(&*entry.outcome)
	.bind(entry.reason.as_deref())
	.bind(detail)
	.bind(entry.created_at.0)
	.execute(db)
	.await
	.map_err(db_err)?;
	Ok(())
}

/// Lists entries, newest first
pub(crate) async fn list(db: &SqlitePool, opts: &ListAuditOptions<'_>) -> WdResult<Vec<AuditEntry>> {
	let mut query = sqlx::QueryBuilder::new(
		"SELECT admin_id, resource_code, action_code, permission_code, kind, outcome, reason,
		detail, created_at FROM audit_log WHERE 1=1",
	);
	if let Some(admin_id) = opts.admin_id {
		query.push(" AND admin_id=").push_bind(admin_id);
	}
	if let Some(kind) = opts.kind {
		query.push(" AND kind=").push_bind(kind.as_str());
	}
	query.push(" ORDER BY audit_id DESC");
	if let Some(limit) = opts.limit {
		query.push(" LIMIT ").push_bind(i64::from(limit));
	}

	let rows = query.build().fetch_all(db).await.map_err(db_err)?;
	collect_res(rows.iter().map(row_to_entry))
}

// vim: ts=4
