//! Database schema initialization and migrations

use sqlx::{Sqlite, SqlitePool, Transaction};

/// Get the current database version from vars table
async fn get_db_version(tx: &mut Transaction<'_, Sqlite>) -> i64 {
	sqlx::query_scalar::<_, String>("SELECT value FROM vars WHERE key = 'db_version'")
		.fetch_optional(&mut **tx)
		.await
		.ok()
		.flatten()
		.and_then(|v| v.parse().ok())
		.unwrap_or(0)
}

/// Set the database version in vars table
async fn set_db_version(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<(), sqlx::Error> {
	sqlx::query("INSERT OR REPLACE INTO vars (key, value) VALUES ('db_version', ?)")
		.bind(version.to_string())
		.execute(&mut **tx)
		.await?;
	Ok(())
}

// Current schema version - update this when adding new migrations
const CURRENT_DB_VERSION: i64 = 2;

/// Initialize the database schema and run migrations
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS vars (
		key text NOT NULL,
		value text NOT NULL,
		created_at INTEGER DEFAULT (unixepoch()),
		updated_at INTEGER DEFAULT (unixepoch()),
		PRIMARY KEY(key)
	)",
	)
	.execute(&mut *tx)
	.await?;

	let version = get_db_version(&mut tx).await;

	// Admin directory
	//*****************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS admins (
		admin_id text NOT NULL,
		name text,
		status char(1) NOT NULL DEFAULT 'A',	-- 'A': active, 'I': inactive
		created_at INTEGER DEFAULT (unixepoch()),
		PRIMARY KEY(admin_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Permission catalog
	//********************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS permissions (
		code text NOT NULL,
		resource text NOT NULL,
		action text NOT NULL,
		severity text NOT NULL,
		requires_reason boolean NOT NULL DEFAULT 0,
		created_at INTEGER DEFAULT (unixepoch()),
		PRIMARY KEY(code),
		UNIQUE(resource, action)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Roles
	//*******
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS roles (
		code text NOT NULL,
		name text NOT NULL,
		description text,
		is_system boolean NOT NULL DEFAULT 0,
		status char(1) NOT NULL DEFAULT 'A',
		created_at INTEGER DEFAULT (unixepoch()),
		PRIMARY KEY(code)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS role_permissions (
		role_code text NOT NULL,
		permission_code text NOT NULL,
		PRIMARY KEY(role_code, permission_code)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_role_permissions_perm ON role_permissions(permission_code)",
	)
	.execute(&mut *tx)
	.await?;

	// Role bindings
	//***************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS admin_roles (
		admin_id text NOT NULL,
		role_code text NOT NULL,
		is_primary boolean NOT NULL DEFAULT 0,
		assigned_at INTEGER NOT NULL,
		expires_at INTEGER,
		PRIMARY KEY(admin_id, role_code)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_admin_roles_role ON admin_roles(role_code)")
		.execute(&mut *tx)
		.await?;

	// Direct overrides
	//******************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS admin_permissions (
		admin_id text NOT NULL,
		permission_code text NOT NULL,
		grant_type char(1) NOT NULL,		-- 'G': grant, 'D': deny
		constraints json,
		reason text,
		granted_by text NOT NULL,
		created_at INTEGER NOT NULL,
		PRIMARY KEY(admin_id, permission_code)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_admin_permissions_perm ON admin_permissions(permission_code)",
	)
	.execute(&mut *tx)
	.await?;

	// Escalation rules
	//******************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS escalation_rules (
		rule_id integer NOT NULL,
		name text NOT NULL,
		trigger_type text NOT NULL,
		resource_code text NOT NULL,
		action_code text NOT NULL,
		trigger_conditions json NOT NULL,
		escalate_role text,
		escalate_admin text,
		action_type text NOT NULL,
		priority integer NOT NULL DEFAULT 0,
		status char(1) NOT NULL DEFAULT 'A',
		created_at INTEGER DEFAULT (unixepoch()),
		PRIMARY KEY(rule_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_escalation_rules_target
		ON escalation_rules(resource_code, action_code, priority, rule_id)",
	)
	.execute(&mut *tx)
	.await?;

	// Action counters
	//*****************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS action_counters (
		admin_id text NOT NULL,
		resource_code text NOT NULL,
		action_code text NOT NULL,
		day text NOT NULL,
		count integer NOT NULL DEFAULT 0,
		PRIMARY KEY(admin_id, resource_code, action_code, day)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Approval requests
	//*******************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS approval_requests (
		approval_id integer NOT NULL,
		rule_id integer NOT NULL,
		admin_id text NOT NULL,
		resource_code text NOT NULL,
		action_code text NOT NULL,
		context json NOT NULL,
		escalate_role text,
		escalate_admin text,
		status char(1) NOT NULL DEFAULT 'P',	-- 'P': pending, 'A': approved, 'R': rejected, 'E': expired
		created_at INTEGER NOT NULL,
		resolved_at INTEGER,
		resolved_by text,
		resolution_note text,
		PRIMARY KEY(approval_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_approval_requests_status ON approval_requests(status, created_at)",
	)
	.execute(&mut *tx)
	.await?;

	// Audit trail
	//*************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS audit_log (
		audit_id integer NOT NULL,
		admin_id text NOT NULL,
		resource_code text NOT NULL,
		action_code text NOT NULL,
		permission_code text,
		kind text NOT NULL,
		outcome text NOT NULL,
		reason text,
		detail json,
		created_at INTEGER NOT NULL,
		PRIMARY KEY(audit_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_admin ON audit_log(admin_id, created_at)")
		.execute(&mut *tx)
		.await?;

	// Migrations
	//************
	if version < 2 {
		// At most one primary binding per admin
		sqlx::query(
			"CREATE UNIQUE INDEX IF NOT EXISTS idx_admin_roles_primary
			ON admin_roles(admin_id) WHERE is_primary",
		)
		.execute(&mut *tx)
		.await?;
	}

	if version != CURRENT_DB_VERSION {
		set_db_version(&mut tx, CURRENT_DB_VERSION).await?;
	}

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
