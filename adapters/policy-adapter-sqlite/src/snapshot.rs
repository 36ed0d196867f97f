//! Consistent read of everything the resolver needs for one admin
//!
//! All queries run inside one transaction, so a concurrent grant change is
//! either fully visible or not visible at all.

use sqlx::{Row, SqlitePool};

use warden_types::permission::{GrantSnapshot, Role};
use warden_types::prelude::*;

use crate::admin::row_to_admin;
use crate::binding::row_to_binding;
use crate::utils::*;
use crate::{perm_override, role};

pub(crate) async fn load(db: &SqlitePool, admin_id: &str) -> WdResult<GrantSnapshot> {
	let mut tx = db.begin().await.map_err(db_err)?;

	let admin = sqlx::query("SELECT admin_id, name, status, created_at FROM admins WHERE admin_id=?")
		.bind(admin_id)
		.fetch_optional(&mut *tx)
		.await
		.map_err(db_err)?;
	let Some(admin) = admin else {
		return Ok(GrantSnapshot::default());
	};
	let admin = row_to_admin(&admin).inspect_err(inspect).map_err(|_| Error::DbError)?;

	let rows = sqlx::query(
		"SELECT admin_id, role_code, is_primary, assigned_at, expires_at FROM admin_roles
		WHERE admin_id=? ORDER BY assigned_at, role_code",
	)
	.bind(admin_id)
	.fetch_all(&mut *tx)
	.await
	.map_err(db_err)?;
	let bindings = collect_res(rows.iter().map(row_to_binding))?;

	let rows = sqlx::query(
		"SELECT code, name, description, is_system, status FROM roles
		WHERE code IN (SELECT role_code FROM admin_roles WHERE admin_id=?) ORDER BY code",
	)
	.bind(admin_id)
	.fetch_all(&mut *tx)
	.await
	.map_err(db_err)?;
	let mut roles = collect_res(rows.iter().map(|row| {
		let status: &str = row.try_get("status")?;
		Ok(Role {
			code: row.try_get("code")?,
			name: row.try_get("name")?,
			description: row.try_get("description")?,
			permission_codes: Vec::new(),
			is_system: row.try_get("is_system")?,
			is_active: is_active_status(status),
		})
	}))?;
	role::load_permissions(&mut *tx, &mut roles).await?;

	let overrides = perm_override::list(&mut *tx, admin_id).await?;

	tx.commit().await.map_err(db_err)?;

	Ok(GrantSnapshot { admin: Some(admin), bindings, roles, overrides })
}

// vim: ts=4
