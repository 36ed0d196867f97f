//! Adapter that stores the policy data model: catalog, roles, bindings,
//! overrides, escalation rules, approval requests and action counters.
//!
//! Implementations are responsible for the storage-level invariants:
//! - unique permission codes and unique (resource, action) pairs
//! - at most one binding per (admin, role), at most one primary binding per admin
//! - at most one override per (admin, permission), later writes replace
//! - atomic counter increments
//! - compare-and-set approval transitions (only from pending)

use async_trait::async_trait;
use std::fmt::Debug;

use crate::escalation::{
	ApprovalRequest, CreateApprovalData, CreateRuleData, EscalationRule, ListApprovalOptions,
	ListRuleOptions, ResolveApprovalData, UpdateRuleData,
};
use crate::permission::{
	Admin, AdminRoleBinding, CreateBindingData, CreateRoleData, DirectPermissionOverride,
	GrantSnapshot, Permission, Role, UpdatePermissionData, UpdateRoleData,
};
use crate::prelude::*;

/// Number of places referencing a catalog entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceCount {
	pub roles: u64,
	pub bindings: u64,
	pub overrides: u64,
	pub rules: u64,
}

impl ReferenceCount {
	pub fn total(&self) -> u64 {
		self.roles + self.bindings + self.overrides + self.rules
	}
}

/// Key of a per-day action counter
#[derive(Debug, Clone, Copy)]
pub struct CounterKey<'a> {
	pub admin_id: &'a str,
	pub resource_code: &'a str,
	pub action_code: &'a str,
	/// Calendar day, `YYYY-MM-DD`
	pub day: &'a str,
}

#[async_trait]
pub trait PolicyAdapter: Debug + Send + Sync {
	// Admin directory
	//*****************
	async fn create_admin(&self, admin_id: &str, name: Option<&str>) -> WdResult<Admin>;
	async fn read_admin(&self, admin_id: &str) -> WdResult<Admin>;
	async fn list_admins(&self) -> WdResult<Vec<Admin>>;
	async fn update_admin_status(&self, admin_id: &str, is_active: bool) -> WdResult<()>;

	// Permission catalog
	//********************
	/// Fails with `Conflict` on a duplicate code or (resource, action) pair
	async fn create_permission(&self, permission: &Permission) -> WdResult<()>;
	async fn read_permission(&self, code: &str) -> WdResult<Permission>;
	async fn find_permission(&self, resource: &str, action: &str) -> WdResult<Option<Permission>>;
	async fn list_permissions(&self, resource: Option<&str>) -> WdResult<Vec<Permission>>;
	async fn update_permission(&self, code: &str, data: &UpdatePermissionData) -> WdResult<()>;
	async fn delete_permission(&self, code: &str) -> WdResult<()>;
	async fn count_permission_references(&self, code: &str) -> WdResult<ReferenceCount>;

	// Roles
	//*******
	async fn create_role(&self, data: &CreateRoleData<'_>) -> WdResult<Role>;
	async fn read_role(&self, code: &str) -> WdResult<Role>;
	async fn list_roles(&self) -> WdResult<Vec<Role>>;
	async fn update_role(&self, code: &str, data: &UpdateRoleData) -> WdResult<()>;
	async fn delete_role(&self, code: &str) -> WdResult<()>;
	/// Replaces the role's permission set in one transaction
	async fn set_role_permissions(&self, code: &str, permission_codes: &[&str]) -> WdResult<()>;
	async fn count_role_references(&self, code: &str) -> WdResult<ReferenceCount>;

	// Role bindings
	//***************
	async fn list_bindings(&self, admin_id: &str) -> WdResult<Vec<AdminRoleBinding>>;
	async fn list_role_members(&self, role_code: &str) -> WdResult<Vec<AdminRoleBinding>>;
	/// Creates a binding. If `is_primary` is set, or the admin has no other
	/// binding, the new binding becomes the only primary one.
	async fn create_binding(&self, data: &CreateBindingData<'_>) -> WdResult<AdminRoleBinding>;
	/// Removes a binding. A removed primary is replaced by the earliest remaining binding.
	async fn delete_binding(&self, admin_id: &str, role_code: &str) -> WdResult<()>;
	/// Clears the previous primary and sets the new one in one transaction
	async fn set_primary_binding(&self, admin_id: &str, role_code: &str) -> WdResult<()>;

	// Direct overrides
	//******************
	/// Inserts or replaces the override for (admin, permission)
	async fn upsert_override(&self, data: &DirectPermissionOverride) -> WdResult<()>;
	async fn delete_override(&self, admin_id: &str, permission_code: &str) -> WdResult<()>;
	async fn list_overrides(&self, admin_id: &str) -> WdResult<Vec<DirectPermissionOverride>>;

	/// Reads admin, bindings, bound roles and overrides in one consistent snapshot
	async fn load_grant_snapshot(&self, admin_id: &str) -> WdResult<GrantSnapshot>;

	// Escalation rules
	//******************
	async fn create_rule(&self, data: &CreateRuleData<'_>) -> WdResult<EscalationRule>;
	async fn read_rule(&self, rule_id: i64) -> WdResult<EscalationRule>;
	async fn list_rules(&self, opts: &ListRuleOptions<'_>) -> WdResult<Vec<EscalationRule>>;
	async fn update_rule(&self, rule_id: i64, data: &UpdateRuleData) -> WdResult<()>;
	async fn delete_rule(&self, rule_id: i64) -> WdResult<()>;

	// Action counters
	//*****************
	/// Atomically increments the counter and returns the new value
	async fn increment_action_counter(&self, key: &CounterKey<'_>) -> WdResult<u64>;
	/// Takes back one increment of an action that did not proceed. Never goes below zero.
	async fn decrement_action_counter(&self, key: &CounterKey<'_>) -> WdResult<()>;
	async fn read_action_counter(&self, key: &CounterKey<'_>) -> WdResult<u64>;

	// Approval requests
	//*******************
	async fn create_approval(&self, data: &CreateApprovalData<'_>) -> WdResult<ApprovalRequest>;
	async fn read_approval(&self, approval_id: i64) -> WdResult<ApprovalRequest>;
	async fn list_approvals(&self, opts: &ListApprovalOptions<'_>) -> WdResult<Vec<ApprovalRequest>>;
	/// Moves a pending request to a terminal status. Fails with `Conflict` if
	/// the request is no longer pending.
	async fn resolve_approval(
		&self,
		approval_id: i64,
		data: &ResolveApprovalData<'_>,
	) -> WdResult<ApprovalRequest>;
	/// Expires every pending request created before `created_before`, returns the count
	async fn expire_approvals(&self, created_before: Timestamp, at: Timestamp) -> WdResult<u64>;
}

// vim: ts=4
