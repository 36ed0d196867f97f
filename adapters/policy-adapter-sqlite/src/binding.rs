//! Admin role bindings
//!
//! The partial unique index `idx_admin_roles_primary` guarantees at most one
//! primary binding per admin; the functions below keep exactly one primary
//! whenever an admin has any binding.

use sqlx::{Row, Sqlite, SqlitePool, Transaction, sqlite::SqliteRow};

use warden_types::permission::{AdminRoleBinding, CreateBindingData};
use warden_types::prelude::*;

use crate::utils::*;

pub(crate) fn row_to_binding(row: &SqliteRow) -> Result<AdminRoleBinding, sqlx::Error> {
	Ok(AdminRoleBinding {
		admin_id: row.try_get("admin_id")?,
		role_code: row.try_get("role_code")?,
		is_primary: row.try_get("is_primary")?,
		assigned_at: Timestamp(row.try_get("assigned_at")?),
		expires_at: row.try_get::<Option<i64>, _>("expires_at")?.map(Timestamp),
	})
}

pub(crate) async fn list(db: &SqlitePool, admin_id: &str) -> WdResult<Vec<AdminRoleBinding>> {
	let rows = sqlx::query(
		"SELECT admin_id, role_code, is_primary, assigned_at, expires_at FROM admin_roles
		WHERE admin_id=? ORDER BY assigned_at, role_code",
	)
	.bind(admin_id)
	.fetch_all(db)
	.await
	.map_err(db_err)?;

	collect_res(rows.iter().map(row_to_binding))
}

pub(crate) async fn list_members(db: &SqlitePool, role_code: &str) -> WdResult<Vec<AdminRoleBinding>> {
	let rows = sqlx::query(
		"SELECT admin_id, role_code, is_primary, assigned_at, expires_at FROM admin_roles
		WHERE role_code=? ORDER BY admin_id",
	)
	.bind(role_code)
	.fetch_all(db)
	.await
	.map_err(db_err)?;

	collect_res(rows.iter().map(row_to_binding))
}

async fn clear_primary(tx: &mut Transaction<'_, Sqlite>, admin_id: &str) -> WdResult<()> {
	sqlx::query("UPDATE admin_roles SET is_primary=0 WHERE admin_id=? AND is_primary")
		.bind(admin_id)
		.execute(&mut **tx)
		.await
		.map_err(db_err)?;
	Ok(())
}

pub(crate) async fn create(db: &SqlitePool, data: &CreateBindingData<'_>) -> WdResult<AdminRoleBinding> {
	let mut tx = db.begin().await.map_err(db_err)?;

	let existing: i64 = sqlx::query_scalar("SELECT count(*) FROM admin_roles WHERE admin_id=?")
		.bind(data.admin_id)
		.fetch_one(&mut *tx)
		.await
		.map_err(db_err)?;
	let is_primary = data.is_primary || existing == 0;
	if is_primary {
		clear_primary(&mut tx, data.admin_id).await?;
	}

	let res = sqlx::query(
		"INSERT INTO admin_roles (admin_id, role_code, is_primary, assigned_at, expires_at)
		VALUES (?, ?, ?, ?, ?)
		RETURNING admin_id, role_code, is_primary, assigned_at, expires_at",
	)
	.bind(data.admin_id)
	.bind(data.role_code)
	.bind(is_primary)
	.bind(Timestamp::now().0)
	.bind(data.expires_at.map(|ts| ts.0))
	.fetch_one(&mut *tx)
	.await
	.map_err(|err| map_write_err(err, "role binding"))?;
	let binding = row_to_binding(&res).inspect_err(inspect).map_err(|_| Error::DbError)?;

	tx.commit().await.map_err(db_err)?;
	Ok(binding)
}

pub(crate) async fn delete(db: &SqlitePool, admin_id: &str, role_code: &str) -> WdResult<()> {
	let mut tx = db.begin().await.map_err(db_err)?;

	let was_primary: Option<bool> =
		sqlx::query_scalar("DELETE FROM admin_roles WHERE admin_id=? AND role_code=? RETURNING is_primary")
			.bind(admin_id)
			.bind(role_code)
			.fetch_optional(&mut *tx)
			.await
			.map_err(db_err)?;

	match was_primary {
		None => return Err(Error::NotFound),
		Some(true) => {
			// Promote the earliest remaining binding, unexpired ones first
			sqlx::query(
				"UPDATE admin_roles SET is_primary=1 WHERE admin_id=?1 AND role_code=(
					SELECT role_code FROM admin_roles WHERE admin_id=?1
					ORDER BY expires_at IS NOT NULL AND expires_at <= ?2, assigned_at, role_code
					LIMIT 1)",
			)
			.bind(admin_id)
			.bind(Timestamp::now().0)
			.execute(&mut *tx)
			.await
			.map_err(db_err)?;
		}
		Some(false) => {}
	}

	tx.commit().await.map_err(db_err)?;
	Ok(())
}

pub(crate) async fn set_primary(db: &SqlitePool, admin_id: &str, role_code: &str) -> WdResult<()> {
	let mut tx = db.begin().await.map_err(db_err)?;

	let exists = sqlx::query("SELECT 1 FROM admin_roles WHERE admin_id=? AND role_code=?")
		.bind(admin_id)
		.bind(role_code)
		.fetch_optional(&mut *tx)
		.await
		.map_err(db_err)?;
	if exists.is_none() {
		return Err(Error::NotFound);
	}

	clear_primary(&mut tx, admin_id).await?;
	sqlx::query("UPDATE admin_roles SET is_primary=1 WHERE admin_id=? AND role_code=?")
		.bind(admin_id)
		.bind(role_code)
		.execute(&mut *tx)
		.await
		.map_err(|err| map_write_err(err, "primary binding"))?;

	tx.commit().await.map_err(db_err)?;
	Ok(())
}

// vim: ts=4
