//! Admin directory

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use warden_types::permission::Admin;
use warden_types::prelude::*;

use crate::utils::*;

pub(crate) fn row_to_admin(row: &SqliteRow) -> Result<Admin, sqlx::Error> {
	let status: &str = row.try_get("status")?;
	Ok(Admin {
		admin_id: row.try_get("admin_id")?,
		name: row.try_get("name")?,
		is_active: is_active_status(status),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

pub(crate) async fn create(db: &SqlitePool, admin_id: &str, name: Option<&str>) -> WdResult<Admin> {
	let res = sqlx::query(
		"INSERT INTO admins (admin_id, name, status) VALUES (?, ?, 'A')
		RETURNING admin_id, name, status, created_at",
	)
	.bind(admin_id)
	.bind(name)
	.fetch_one(db)
	.await
	.map_err(|err| map_write_err(err, "admin"))?;

	row_to_admin(&res).inspect_err(inspect).map_err(|_| Error::DbError)
}

pub(crate) async fn read(db: &SqlitePool, admin_id: &str) -> WdResult<Admin> {
	let res = sqlx::query("SELECT admin_id, name, status, created_at FROM admins WHERE admin_id=?")
		.bind(admin_id)
		.fetch_one(db)
		.await;

	map_res(res, row_to_admin)
}

pub(crate) async fn list(db: &SqlitePool) -> WdResult<Vec<Admin>> {
	let rows = sqlx::query("SELECT admin_id, name, status, created_at FROM admins ORDER BY admin_id")
		.fetch_all(db)
		.await
		.map_err(db_err)?;

	collect_res(rows.iter().map(row_to_admin))
}

pub(crate) async fn update_status(db: &SqlitePool, admin_id: &str, is_active: bool) -> WdResult<()> {
	let res = sqlx::query("UPDATE admins SET status=? WHERE admin_id=?")
		.bind(status_code(is_active))
		.bind(admin_id)
		.execute(db)
		.await
		.map_err(db_err)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

// vim: ts=4
