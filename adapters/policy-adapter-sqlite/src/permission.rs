//! Permission catalog

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use warden_types::permission::{Permission, UpdatePermissionData};
use warden_types::policy_adapter::ReferenceCount;
use warden_types::prelude::*;

use crate::utils::*;

fn row_to_permission(row: &SqliteRow) -> Result<Permission, sqlx::Error> {
	let severity: &str = row.try_get("severity")?;
	Ok(Permission {
		code: row.try_get("code")?,
		resource: row.try_get("resource")?,
		action: row.try_get("action")?,
		severity: parse_column(severity)?,
		requires_reason: row.try_get("requires_reason")?,
	})
}

pub(crate) async fn create(db: &SqlitePool, permission: &Permission) -> WdResult<()> {
	sqlx::query(
		"INSERT INTO permissions (code, resource, action, severity, requires_reason)
		VALUES (?, ?, ?, ?, ?)",
	)
	.bind(&*permission.code)
	.bind(&*permission.resource)
	.bind(&*permission.action)
	.bind(permission.severity.as_str())
	.bind(permission.requires_reason)
	.execute(db)
	.await
	.map_err(|err| map_write_err(err, "permission"))?;
	Ok(())
}

pub(crate) async fn read(db: &SqlitePool, code: &str) -> WdResult<Permission> {
	let res = sqlx::query(
		"SELECT code, resource, action, severity, requires_reason FROM permissions WHERE code=?",
	)
	.bind(code)
	.fetch_one(db)
	.await;

	map_res(res, row_to_permission)
}

pub(crate) async fn find(db: &SqlitePool, resource: &str, action: &str) -> WdResult<Option<Permission>> {
	let res = sqlx::query(
		"SELECT code, resource, action, severity, requires_reason FROM permissions
		WHERE resource=? AND action=?",
	)
	.bind(resource)
	.bind(action)
	.fetch_one(db)
	.await;

	match map_res(res, row_to_permission) {
		Ok(permission) => Ok(Some(permission)),
		Err(Error::NotFound) => Ok(None),
		Err(err) => Err(err),
	}
}

pub(crate) async fn list(db: &SqlitePool, resource: Option<&str>) -> WdResult<Vec<Permission>> {
	let mut query = sqlx::QueryBuilder::new(
		"SELECT code, resource, action, severity, requires_reason FROM permissions",
	);
	if let Some(resource) = resource {
		query.push(" WHERE resource=").push_bind(resource);
	}
	query.push(" ORDER BY resource, action");

	let rows = query.build().fetch_all(db).await.map_err(db_err)?;
	collect_res(rows.iter().map(row_to_permission))
}

pub(crate) async fn update(db: &SqlitePool, code: &str, data: &UpdatePermissionData) -> WdResult<()> {
	let mut query = sqlx::QueryBuilder::new("UPDATE permissions SET ");
	let mut has_updates = false;
	has_updates = push_patch!(query, has_updates, "severity", &data.severity, |v| v.as_str());
	has_updates = push_patch!(query, has_updates, "requires_reason", &data.requires_reason);
	if !has_updates {
		// Nothing to change, still report unknown codes
		return read(db, code).await.map(|_| ());
	}
	query.push(" WHERE code=").push_bind(code);

	let res = query.build().execute(db).await.map_err(db_err)?;
	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

pub(crate) async fn delete(db: &SqlitePool, code: &str) -> WdResult<()> {
	let res = sqlx::query("DELETE FROM permissions WHERE code=?")
		.bind(code)
		.execute(db)
		.await
		.map_err(db_err)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

pub(crate) async fn count_references(db: &SqlitePool, code: &str) -> WdResult<ReferenceCount> {
	let res = sqlx::query(
		"SELECT
			(SELECT count(*) FROM role_permissions WHERE permission_code=?1) AS roles,
			(SELECT count(*) FROM admin_permissions WHERE permission_code=?1) AS overrides,
			(SELECT count(*) FROM escalation_rules r JOIN permissions p
				ON p.resource=r.resource_code AND p.action=r.action_code WHERE p.code=?1) AS rules",
	)
	.bind(code)
	.fetch_one(db)
	.await;

	map_res(res, |row| {
		Ok(ReferenceCount {
			roles: row.try_get::<i64, _>("roles")? as u64,
			bindings: 0,
			overrides: row.try_get::<i64, _>("overrides")? as u64,
			rules: row.try_get::<i64, _>("rules")? as u64,
		})
	})
}

// vim: ts=4
