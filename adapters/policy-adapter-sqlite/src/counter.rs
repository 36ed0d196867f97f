//! Per-day action counters
//!
//! The increment is a single UPSERT ... RETURNING statement, so concurrent
//! increments of the same key are serialized by SQLite and each caller sees
//! a distinct value.

use sqlx::SqlitePool;

use warden_types::policy_adapter::CounterKey;
use warden_types::prelude::*;

use crate::utils::*;

pub(crate) async fn increment(db: &SqlitePool, key: &CounterKey<'_>) -> WdResult<u64> {
	let count: i64 = sqlx::query_scalar(
		"INSERT INTO action_counters (admin_id, resource_code, action_code, day, count)
		VALUES (?, ?, ?, ?, 1)
		ON CONFLICT (admin_id, resource_code, action_code, day) DO UPDATE SET count=count+1
		RETURNING count",
	)
	.bind(key.admin_id)
	.bind(key.resource_code)
	.bind(key.action_code)
	.bind(key.day)
	.fetch_one(db)
	.await
	.map_err(db_err)?;

	Ok(count.max(0) as u64)
}

pub(crate) async fn decrement(db: &SqlitePool, key: &CounterKey<'_>) -> WdResult<()> {
	sqlx::query(
		"UPDATE action_counters SET count=MAX(count-1, 0)
		WHERE admin_id=? AND resource_code=? AND action_code=? AND day=?",
	)
	.bind(key.admin_id)
	.bind(key.resource_code)
	.bind(key.action_code)
	.bind(key.day)
	.execute(db)
	.await
	.map_err(db_err)?;

	Ok(())
}

pub(crate) async fn read(db: &SqlitePool, key: &CounterKey<'_>) -> WdResult<u64> {
	let count: Option<i64> = sqlx::query_scalar(
		"SELECT count FROM action_counters
		WHERE admin_id=? AND resource_code=? AND action_code=? AND day=?",
	)
	.bind(key.admin_id)
	.bind(key.resource_code)
	.bind(key.action_code)
	.bind(key.day)
	.fetch_optional(db)
	.await
	.map_err(db_err)?;

	Ok(count.unwrap_or(0).max(0) as u64)
}

// vim: ts=4
