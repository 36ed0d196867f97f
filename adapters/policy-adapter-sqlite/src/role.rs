//! Roles and their permission sets

use std::collections::HashMap;

use sqlx::{Row, Sqlite, SqlitePool, Transaction, sqlite::SqliteRow};

use warden_types::permission::{CreateRoleData, Role, UpdateRoleData};
use warden_types::policy_adapter::ReferenceCount;
use warden_types::prelude::*;

use crate::utils::*;

fn row_to_role(row: &SqliteRow) -> Result<Role, sqlx::Error> {
	let status: &str = row.try_get("status")?;
	Ok(Role {
		code: row.try_get("code")?,
		name: row.try_get("name")?,
		description: row.try_get("description")?,
		permission_codes: Vec::new(),
		is_system: row.try_get("is_system")?,
		is_active: is_active_status(status),
	})
}

async fn insert_permissions(
	tx: &mut Transaction<'_, Sqlite>,
	role_code: &str,
	permission_codes: &[&str],
) -> WdResult<()> {
	for permission_code in permission_codes {
		sqlx::query("INSERT OR IGNORE INTO role_permissions (role_code, permission_code) VALUES (?, ?)")
			.bind(role_code)
			.bind(*permission_code)
			.execute(&mut **tx)
			.await
			.map_err(db_err)?;
	}
	Ok(())
}

/// Attaches permission codes to already loaded roles
pub(crate) async fn load_permissions(
	db: impl sqlx::SqliteExecutor<'_>,
	roles: &mut [Role],
) -> WdResult<()> {
	if roles.is_empty() {
		return Ok(());
	}
	let query = sqlx::QueryBuilder::new(
		"SELECT role_code, permission_code FROM role_permissions WHERE role_code IN ",
	);
	let codes: Vec<&str> = roles.iter().map(|role| role.code.as_ref()).collect();
	let mut query = push_in(query, &codes);
	query.push(" ORDER BY role_code, permission_code");

	let rows = query.build().fetch_all(db).await.map_err(db_err)?;
	let mut by_role: HashMap<Box<str>, Vec<Box<str>>> = HashMap::new();
	for row in &rows {
		let role_code: Box<str> = row.try_get("role_code").map_err(db_err)?;
		let permission_code: Box<str> = row.try_get("permission_code").map_err(db_err)?;
		by_role.entry(role_code).or_default().push(permission_code);
	}
	for role in roles.iter_mut() {
		role.permission_codes = by_role.remove(&role.code).unwrap_or_default();
	}
	Ok(())
}

pub(crate) async fn create(db: &SqlitePool, data: &CreateRoleData<'_>) -> WdResult<Role> {
	let mut tx = db.begin().await.map_err(db_err)?;

	sqlx::query("INSERT INTO roles (code, name, description, is_system, status) VALUES (?, ?, ?, ?, 'A')")
		.bind(data.code)
		.bind(data.name)
		.bind(data.description)
		.bind(data.is_system)
		.execute(&mut *tx)
		.await
		.map_err(|err| map_write_err(err, "role"))?;
	insert_permissions(&mut tx, data.code, data.permission_codes).await?;

	tx.commit().await.map_err(db_err)?;
	read(db, data.code).await
}

pub(crate) async fn read(db: &SqlitePool, code: &str) -> WdResult<Role> {
	let res = sqlx::query("SELECT code, name, description, is_system, status FROM roles WHERE code=?")
		.bind(code)
		.fetch_one(db)
		.await;

	let mut roles = [map_res(res, row_to_role)?];
	load_permissions(db, &mut roles).await?;
	let [role] = roles;
	Ok(role)
}

pub(crate) async fn list(db: &SqlitePool) -> WdResult<Vec<Role>> {
	let rows = sqlx::query("SELECT code, name, description, is_system, status FROM roles ORDER BY code")
		.fetch_all(db)
		.await
		.map_err(db_err)?;

	let mut roles = collect_res(rows.iter().map(row_to_role))?;
	load_permissions(db, &mut roles).await?;
	Ok(roles)
}

pub(crate) async fn update(db: &SqlitePool, code: &str, data: &UpdateRoleData) -> WdResult<()> {
	let mut query = sqlx::QueryBuilder::new("UPDATE roles SET ");
	let mut has_updates = false;
	has_updates = push_patch!(query, has_updates, "name", &data.name, |v| v.to_string());
	has_updates = push_patch!(query, has_updates, "description", &data.description, |v| v.to_string());
	has_updates =
		push_patch!(query, has_updates, "status", &data.is_active, |v| status_code(*v));
	if !has_updates {
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
	let mut tx = db.begin().await.map_err(db_err)?;

	let res = sqlx::query("DELETE FROM roles WHERE code=?")
		.bind(code)
		.execute(&mut *tx)
		.await
		.map_err(db_err)?;
	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	sqlx::query("DELETE FROM role_permissions WHERE role_code=?")
		.bind(code)
		.execute(&mut *tx)
		.await
		.map_err(db_err)?;

	tx.commit().await.map_err(db_err)?;
	Ok(())
}

pub(crate) async fn set_permissions(
	db: &SqlitePool,
	code: &str,
	permission_codes: &[&str],
) -> WdResult<()> {
	let mut tx = db.begin().await.map_err(db_err)?;

	let exists = sqlx::query("SELECT 1 FROM roles WHERE code=?")
		.bind(code)
		.fetch_optional(&mut *tx)
		.await
		.map_err(db_err)?;
	if exists.is_none() {
		return Err(Error::NotFound);
	}

	sqlx::query("DELETE FROM role_permissions WHERE role_code=?")
		.bind(code)
		.execute(&mut *tx)
		.await
		.map_err(db_err)?;
	insert_permissions(&mut tx, code, permission_codes).await?;

	tx.commit().await.map_err(db_err)?;
	Ok(())
}

pub(crate) async fn count_references(db: &SqlitePool, code: &str) -> WdResult<ReferenceCount> {
	let res = sqlx::query(
		"SELECT
			(SELECT count(*) FROM admin_roles WHERE role_code=?1) AS bindings,
			(SELECT count(*) FROM escalation_rules WHERE escalate_role=?1) AS rules",
	)
	.bind(code)
	.fetch_one(db)
	.await;

	map_res(res, |row| {
		Ok(ReferenceCount {
			roles: 0,
			bindings: row.try_get::<i64, _>("bindings")? as u64,
			overrides: 0,
			rules: row.try_get::<i64, _>("rules")? as u64,
		})
	})
}

// vim: ts=4
