//! SQLite implementation of the Warden `PolicyAdapter` and `AuditSink`.
//!
//! The database lives in a single file (`policy.db`) inside the directory the
//! adapter is opened with. WAL journaling lets resolutions read concurrently
//! with grant changes.

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::path::Path;

use warden_types::audit::{AuditEntry, AuditSink, ListAuditOptions};
use warden_types::escalation::{
	ApprovalRequest, CreateApprovalData, CreateRuleData, EscalationRule, ListApprovalOptions,
	ListRuleOptions, ResolveApprovalData, UpdateRuleData,
};
use warden_types::permission::{
	Admin, AdminRoleBinding, CreateBindingData, CreateRoleData, DirectPermissionOverride,
	GrantSnapshot, Permission, Role, UpdatePermissionData, UpdateRoleData,
};
use warden_types::policy_adapter::{CounterKey, PolicyAdapter, ReferenceCount};
use warden_types::prelude::*;

mod admin;
mod approval;
mod audit;
mod binding;
mod counter;
mod perm_override;
mod permission;
mod role;
mod rule;
mod schema;
mod snapshot;
mod utils;

use crate::schema::init_db;

/// Default connection pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DB_FILE: &str = "policy.db";

#[derive(Debug)]
pub struct PolicyAdapterSqlite {
	db: SqlitePool,
}

impl PolicyAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> WdResult<Self> {
		Self::with_max_connections(path, DEFAULT_MAX_CONNECTIONS).await
	}

	pub async fn with_max_connections(path: impl AsRef<Path>, max_connections: u32) -> WdResult<Self> {
		let path = path.as_ref();
		tokio::fs::create_dir_all(path).await?;

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.join(DB_FILE))
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal)
			.busy_timeout(std::time::Duration::from_secs(5));
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(max_connections.max(1))
			.connect_with(opts)
			.await
			.inspect_err(|err| warn!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		init_db(&db)
			.await
			.inspect_err(|err| warn!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		info!(path = %path.display(), "Policy database ready");
		Ok(Self { db })
	}
}

#[async_trait]
impl PolicyAdapter for PolicyAdapterSqlite {
	// Admin directory
	//*****************
	async fn create_admin(&self, admin_id: &str, name: Option<&str>) -> WdResult<Admin> {
		admin::create(&self.db, admin_id, name).await
	}

	async fn read_admin(&self, admin_id: &str) -> WdResult<Admin> {
		admin::read(&self.db, admin_id).await
	}

	async fn list_admins(&self) -> WdResult<Vec<Admin>> {
		admin::list(&self.db).await
	}

	async fn update_admin_status(&self, admin_id: &str, is_active: bool) -> WdResult<()> {
		admin::update_status(&self.db, admin_id, is_active).await
	}

	// Permission catalog
	//********************
	async fn create_permission(&self, data: &Permission) -> WdResult<()> {
		permission::create(&self.db, data).await
	}

	async fn read_permission(&self, code: &str) -> WdResult<Permission> {
		permission::read(&self.db, code).await
	}

	async fn find_permission(&self, resource: &str, action: &str) -> WdResult<Option<Permission>> {
		permission::find(&self.db, resource, action).await
	}

	async fn list_permissions(&self, resource: Option<&str>) -> WdResult<Vec<Permission>> {
		permission::list(&self.db, resource).await
	}

	async fn update_permission(&self, code: &str, data: &UpdatePermissionData) -> WdResult<()> {
		permission::update(&self.db, code, data).await
	}

	async fn delete_permission(&self, code: &str) -> WdResult<()> {
		permission::delete(&self.db, code).await
	}

	async fn count_permission_references(&self, code: &str) -> WdResult<ReferenceCount> {
		permission::count_references(&self.db, code).await
	}

	// Roles
	//*******
	async fn create_role(&self, data: &CreateRoleData<'_>) -> WdResult<Role> {
		role::create(&self.db, data).await
	}

	async fn read_role(&self, code: &str) -> WdResult<Role> {
		role::read(&self.db, code).await
	}

	async fn list_roles(&self) -> WdResult<Vec<Role>> {
		role::list(&self.db).await
	}

	async fn update_role(&self, code: &str, data: &UpdateRoleData) -> WdResult<()> {
		role::update(&self.db, code, data).await
	}

	async fn delete_role(&self, code: &str) -> WdResult<()> {
		role::delete(&self.db, code).await
	}

	async fn set_role_permissions(&self, code: &str, permission_codes: &[&str]) -> WdResult<()> {
		role::set_permissions(&self.db, code, permission_codes).await
	}

	async fn count_role_references(&self, code: &str) -> WdResult<ReferenceCount> {
		role::count_references(&self.db, code).await
	}

	// Role bindings
	//***************
	async fn list_bindings(&self, admin_id: &str) -> WdResult<Vec<AdminRoleBinding>> {
		binding::list(&self.db, admin_id).await
	}

	async fn list_role_members(&self, role_code: &str) -> WdResult<Vec<AdminRoleBinding>> {
		binding::list_members(&self.db, role_code).await
	}

	async fn create_binding(&self, data: &CreateBindingData<'_>) -> WdResult<AdminRoleBinding> {
		binding::create(&self.db, data).await
	}

	async fn delete_binding(&self, admin_id: &str, role_code: &str) -> WdResult<()> {
		binding::delete(&self.db, admin_id, role_code).await
	}

	async fn set_primary_binding(&self, admin_id: &str, role_code: &str) -> WdResult<()> {
		binding::set_primary(&self.db, admin_id, role_code).await
	}

	// Direct overrides
	//******************
	async fn upsert_override(&self, data: &DirectPermissionOverride) -> WdResult<()> {
		perm_override::upsert(&self.db, data).await
	}

	async fn delete_override(&self, admin_id: &str, permission_code: &str) -> WdResult<()> {
		perm_override::delete(&self.db, admin_id, permission_code).await
	}

	async fn list_overrides(&self, admin_id: &str) -> WdResult<Vec<DirectPermissionOverride>> {
		perm_override::list(&self.db, admin_id).await
	}

	async fn load_grant_snapshot(&self, admin_id: &str) -> WdResult<GrantSnapshot> {
		snapshot::load(&self.db, admin_id).await
	}

	// Escalation rules
	//******************
	async fn create_rule(&self, data: &CreateRuleData<'_>) -> WdResult<EscalationRule> {
		rule::create(&self.db, data).await
	}

	async fn read_rule(&self, rule_id: i64) -> WdResult<EscalationRule> {
		rule::read(&self.db, rule_id).await
	}

	async fn list_rules(&self, opts: &ListRuleOptions<'_>) -> WdResult<Vec<EscalationRule>> {
		rule::list(&self.db, opts).await
	}

	async fn update_rule(&self, rule_id: i64, data: &UpdateRuleData) -> WdResult<()> {
		rule::update(&self.db, rule_id, data).await
	}

	async fn delete_rule(&self, rule_id: i64) -> WdResult<()> {
		rule::delete(&self.db, rule_id).await
	}

	// Action counters
	//*****************
	async fn increment_action_counter(&self, key: &CounterKey<'_>) -> WdResult<u64> {
		counter::increment(&self.db, key).await
	}

	async fn decrement_action_counter(&self, key: &CounterKey<'_>) -> WdResult<()> {
		counter::decrement(&self.db, key).await
	}

	async fn read_action_counter(&self, key: &CounterKey<'_>) -> WdResult<u64> {
		counter::read(&self.db, key).await
	}

	// Approval requests
	//*******************
	async fn create_approval(&self, data: &CreateApprovalData<'_>) -> WdResult<ApprovalRequest> {
		approval::create(&self.db, data).await
	}

	async fn read_approval(&self, approval_id: i64) -> WdResult<ApprovalRequest> {
		approval::read(&self.db, approval_id).await
	}

	async fn list_approvals(&self, opts: &ListApprovalOptions<'_>) -> WdResult<Vec<ApprovalRequest>> {
		approval::list(&self.db, opts).await
	}

	async fn resolve_approval(
		&self,
		approval_id: i64,
		data: &ResolveApprovalData<'_>,
	) -> WdResult<ApprovalRequest> {
		approval::resolve(&self.db, approval_id, data).await
	}

	async fn expire_approvals(&self, created_before: Timestamp, at: Timestamp) -> WdResult<u64> {
		approval::expire(&self.db, created_before, at).await
	}
}

#[async_trait]
impl AuditSink for PolicyAdapterSqlite {
	async fn append_audit(&self, entry: &AuditEntry) -> WdResult<()> {
		audit::append(&self.db, entry).await
	}

	async fn list_audit(&self, opts: &ListAuditOptions<'_>) -> WdResult<Vec<AuditEntry>> {
		audit::list(&self.db, opts).await
	}
}

// vim: ts=4
