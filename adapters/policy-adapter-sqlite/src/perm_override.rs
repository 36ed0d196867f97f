//! Direct permission overrides

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use warden_types::permission::{DirectPermissionOverride, GrantType};
use warden_types::prelude::*;

use crate::utils::*;

fn grant_code(grant_type: GrantType) -> &'static str {
	match grant_type {
		GrantType::Grant => "G",
		GrantType::Deny => "D",
	}
}

pub(crate) fn row_to_override(row: &SqliteRow) -> Result<DirectPermissionOverride, sqlx::Error> {
	let grant_type = match row.try_get::<&str, _>("grant_type")? {
		"G" => GrantType::Grant,
		"D" => GrantType::Deny,
		other => {
			return Err(sqlx::Error::Decode(format!("invalid grant_type: {}", other).into()));
		}
	};
	Ok(DirectPermissionOverride {
		admin_id: row.try_get("admin_id")?,
		permission_code: row.try_get("permission_code")?,
		grant_type,
		constraints: parse_json_map(row.try_get("constraints")?)?,
		reason: row.try_get("reason")?,
		granted_by: row.try_get("granted_by")?,
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

/// Inserts or replaces the single override of (admin, permission)
pub(crate) async fn upsert(db: &SqlitePool, data: &DirectPermissionOverride) -> WdResult<()> {
	let constraints = if data.constraints.is_empty() {
		None
	} else {
		Some(serde_json::to_string(&data.constraints)?)
	};

	sqlx::query(
		"INSERT INTO admin_permissions
			(admin_id, permission_code, grant_type, constraints, reason, granted_by, created_at)
		VALUES (?, ?, ?, ?, ?, ?, ?)
		ON CONFLICT (admin_id, permission_code) DO UPDATE SET
			grant_type=excluded.grant_type,
			constraints=excluded.constraints,
			reason=excluded.reason,
			granted_by=excluded.granted_by,
			created_at=excluded.created_at",
	)
	.bind(&*data.admin_id)
	.bind(&*data.permission_code)
	.bind(grant_code(data.grant_type))
	.bind(constraints)
	.bind(data.reason.as_deref())
	.bind(&*data.granted_by)
	.bind(data.created_at.0)
	.execute(db)
	.await
	.map_err(db_err)?;
	Ok(())
}

pub(crate) async fn delete(db: &SqlitePool, admin_id: &str, permission_code: &str) -> WdResult<()> {
	let res = sqlx::query("DELETE FROM admin_permissions WHERE admin_id=? AND permission_code=?")
		.bind(admin_id)
		.bind(permission_code)
		.execute(db)
		.await
		.map_err(db_err)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

pub(crate) async fn list(
	db: impl sqlx::SqliteExecutor<'_>,
	admin_id: &str,
) -> WdResult<Vec<DirectPermissionOverride>> {
	let rows = sqlx::query(
		"SELECT admin_id, permission_code, grant_type, constraints, reason, granted_by, created_at
		FROM admin_permissions WHERE admin_id=? ORDER BY permission_code",
	)
	.bind(admin_id)
	.fetch_all(db)
	.await
	.map_err(db_err)?;

	collect_res(rows.iter().map(row_to_override))
}

// vim: ts=4
