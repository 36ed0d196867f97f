//! Permission resolver
//!
//! Computes an administrator's effective grant set from role bindings and
//! direct overrides:
//!
//! ```text
//! effective = (role_granted ∪ direct_granted) \ direct_denied
//! ```
//!
//! - inactive or unknown admins get nothing
//! - expired bindings and inactive roles contribute nothing
//! - a direct deny removes the code whatever else grants it
//! - role grants are unconstrained, direct grants may carry constraints; the
//!   constraints of every contributing source are merged most-restrictive-wins
//!
//! Resolution is a pure function over a `GrantSnapshot`, so concurrent
//! resolutions share no mutable state.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use warden_types::permission::{DirectPermissionOverride, GrantSnapshot, GrantType, permission_code};
use warden_types::policy_adapter::PolicyAdapter;

use crate::constraint::{ConstraintViolation, Constraints, GeographicScope};
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
	Allow,
	Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
	UnknownAdmin,
	InactiveAdmin,
	UnknownPermission,
	NotGranted,
	DirectlyDenied,
	/// Stored grant data could not be interpreted
	Misconfigured,
	Constraint(ConstraintViolation),
}

impl DenyReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			DenyReason::UnknownAdmin => "unknown_admin",
			DenyReason::InactiveAdmin => "inactive_admin",
			DenyReason::UnknownPermission => "unknown_permission",
			DenyReason::NotGranted => "not_granted",
			DenyReason::DirectlyDenied => "directly_denied",
			DenyReason::Misconfigured => "misconfigured",
			DenyReason::Constraint(violation) => violation.as_str(),
		}
	}
}

/// Result of an authorization check. A denial is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Authorization {
	pub access: Access,
	pub permission_code: Option<Box<str>>,
	/// Merged constraints narrowing an allowed permission (empty when denied)
	pub constraints: Constraints,
	pub deny_reason: Option<DenyReason>,
}

impl Authorization {
	pub fn allow(permission_code: &str, constraints: Constraints) -> Self {
		Self {
			access: Access::Allow,
			permission_code: Some(permission_code.into()),
			constraints,
			deny_reason: None,
		}
	}

	pub fn deny(permission_code: Option<&str>, reason: DenyReason) -> Self {
		Self {
			access: Access::Deny,
			permission_code: permission_code.map(Into::into),
			constraints: Constraints::default(),
			deny_reason: Some(reason),
		}
	}

	pub fn is_allowed(&self) -> bool {
		self.access == Access::Allow
	}
}

/// Grant sources of one admin, indexed by permission code
struct Grants<'a> {
	role_granted: HashSet<&'a str>,
	direct_granted: HashMap<&'a str, &'a DirectPermissionOverride>,
	direct_denied: HashSet<&'a str>,
}

impl<'a> Grants<'a> {
	fn collect(snapshot: &'a GrantSnapshot, at: Timestamp) -> Self {
		let active_roles: HashMap<&str, _> = snapshot
			.roles
			.iter()
			.filter(|role| role.is_active)
			.map(|role| (role.code.as_ref(), role))
			.collect();

		let role_granted = snapshot
			.bindings
			.iter()
			.filter(|binding| !binding.is_expired(at))
			.filter_map(|binding| active_roles.get(binding.role_code.as_ref()).copied())
			.flat_map(|role| role.permission_codes.iter().map(AsRef::as_ref))
			.collect();

		let mut direct_granted = HashMap::new();
		let mut direct_denied = HashSet::new();
		for ovr in &snapshot.overrides {
			match ovr.grant_type {
				GrantType::Grant => {
					direct_granted.insert(ovr.permission_code.as_ref(), ovr);
				}
				GrantType::Deny => {
					direct_denied.insert(ovr.permission_code.as_ref());
				}
			}
		}

		Self { role_granted, direct_granted, direct_denied }
	}

	fn effective_codes(&self) -> BTreeSet<&'a str> {
		self.role_granted
			.iter()
			.chain(self.direct_granted.keys())
			.filter(|code| !self.direct_denied.contains(*code))
			.copied()
			.collect()
	}

	/// Merged constraints of every source granting `code`
	fn constraints(&self, code: &str) -> WdResult<Constraints> {
		// Role grants are unconstrained and merge as the identity
		let mut merged = Constraints::default();
		if let Some(ovr) = self.direct_granted.get(code) {
			merged = merged.merge(&Constraints::parse(&ovr.constraints)?)?;
		}
		Ok(merged)
	}
}

/// Resolves one permission code against a snapshot
pub fn resolve_snapshot(snapshot: &GrantSnapshot, code: &str, at: Timestamp) -> Authorization {
	match &snapshot.admin {
		None => return Authorization::deny(Some(code), DenyReason::UnknownAdmin),
		Some(admin) if !admin.is_active => {
			return Authorization::deny(Some(code), DenyReason::InactiveAdmin);
		}
		Some(_) => {}
	}

	let grants = Grants::collect(snapshot, at);
	if grants.direct_denied.contains(code) {
		return Authorization::deny(Some(code), DenyReason::DirectlyDenied);
	}
	if !grants.role_granted.contains(code) && !grants.direct_granted.contains_key(code) {
		return Authorization::deny(Some(code), DenyReason::NotGranted);
	}

	match grants.constraints(code) {
		Ok(constraints) => Authorization::allow(code, constraints),
		Err(err) => {
			error!(permission = code, "Grant constraints cannot be interpreted, denying: {}", err);
			Authorization::deny(Some(code), DenyReason::Misconfigured)
		}
	}
}

/// The precedence-resolved permission set of an admin
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectivePermissions {
	pub admin_id: Box<str>,
	/// Effective permission codes with their merged constraints
	pub grants: BTreeMap<Box<str>, Constraints>,
	/// Codes that are granted but whose constraints cannot be interpreted; not usable
	pub misconfigured: Vec<Box<str>>,
	/// Roles currently contributing (bound, unexpired, active)
	pub roles: Vec<Box<str>>,
	pub primary_role: Option<Box<str>>,
}

impl EffectivePermissions {
	pub fn contains(&self, code: &str) -> bool {
		self.grants.contains_key(code)
	}

	pub fn codes(&self) -> impl Iterator<Item = &str> {
		self.grants.keys().map(AsRef::as_ref)
	}

	/// Resources the admin can at least view
	pub fn accessible_resources(&self) -> Vec<&str> {
		self.codes().filter_map(|code| code.strip_suffix(".view")).collect()
	}

	/// Actions granted on one resource
	pub fn resource_actions(&self, resource: &str) -> Vec<&str> {
		let prefix = format!("{}.", resource);
		self.codes().filter_map(|code| code.strip_prefix(prefix.as_str())).collect()
	}

	/// Union of the geographic scopes of all effective grants
	pub fn geographic_scope(&self) -> GeographicScope {
		fn extend(target: &mut Option<Vec<Box<str>>>, values: Option<&Vec<Box<str>>>) {
			if let Some(values) = values {
				let target = target.get_or_insert_with(Vec::new);
				target.extend(values.iter().cloned());
				target.sort();
				target.dedup();
			}
		}

		let mut scope = GeographicScope::default();
		for geo in self.grants.values().filter_map(|c| c.geographic.as_ref()) {
			extend(&mut scope.governorates, geo.governorates.as_ref());
			extend(&mut scope.cities, geo.cities.as_ref());
			extend(&mut scope.districts, geo.districts.as_ref());
		}
		scope
	}
}

/// Computes the full effective permission set from a snapshot
pub fn effective_from_snapshot(
	admin_id: &str,
	snapshot: &GrantSnapshot,
	at: Timestamp,
) -> EffectivePermissions {
	let mut effective = EffectivePermissions { admin_id: admin_id.into(), ..Default::default() };
	if !snapshot.admin.as_ref().is_some_and(|admin| admin.is_active) {
		return effective;
	}

	let grants = Grants::collect(snapshot, at);
	for code in grants.effective_codes() {
		match grants.constraints(code) {
			Ok(constraints) => {
				effective.grants.insert(code.into(), constraints);
			}
			Err(err) => {
				error!(admin_id = %admin_id, permission = code, "Grant constraints cannot be interpreted: {}", err);
				effective.misconfigured.push(code.into());
			}
		}
	}

	let live: Vec<_> = snapshot
		.bindings
		.iter()
		.filter(|binding| !binding.is_expired(at))
		.filter(|binding| {
			snapshot.roles.iter().any(|role| role.code == binding.role_code && role.is_active)
		})
		.collect();
	effective.roles = live.iter().map(|binding| binding.role_code.clone()).collect();
	effective.primary_role = live
		.iter()
		.find(|binding| binding.is_primary)
		.or_else(|| live.first())
		.map(|binding| binding.role_code.clone());

	effective
}

/// Storage-backed resolver
#[derive(Debug, Clone)]
pub struct Resolver {
	adapter: Arc<dyn PolicyAdapter>,
}

impl Resolver {
	pub fn new(adapter: Arc<dyn PolicyAdapter>) -> Self {
		Self { adapter }
	}

	/// Resolves a permission code at time `at`
	///
	/// Configuration problems (unknown code, malformed constraints) deny.
	/// Storage errors are returned and must be treated as a denial by callers.
	pub async fn resolve_at(
		&self,
		admin_id: &str,
		code: &str,
		at: Timestamp,
	) -> WdResult<Authorization> {
		let snapshot = self.adapter.load_grant_snapshot(admin_id).await?;
		if snapshot.admin.as_ref().is_some_and(|admin| admin.is_active) {
			match self.adapter.read_permission(code).await {
				Ok(_) => {}
				Err(Error::NotFound) => {
					error!(admin_id = %admin_id, permission = code, "Unknown permission code requested, denying");
					return Ok(Authorization::deny(Some(code), DenyReason::UnknownPermission));
				}
				Err(err) => return Err(err),
			}
		}

		let authorization = resolve_snapshot(&snapshot, code, at);
		if let Some(reason) = authorization.deny_reason {
			debug!(admin_id = %admin_id, permission = code, reason = reason.as_str(), "Permission denied");
		}
		Ok(authorization)
	}

	/// Resolves the permission registered for (resource, action)
	pub async fn authorize_at(
		&self,
		admin_id: &str,
		resource: &str,
		action: &str,
		at: Timestamp,
	) -> WdResult<Authorization> {
		match self.adapter.find_permission(resource, action).await? {
			Some(permission) => self.resolve_at(admin_id, &permission.code, at).await,
			None => {
				let code = permission_code(resource, action);
				error!(admin_id = %admin_id, resource = resource, action = action, "No catalog permission for resource/action, denying");
				Ok(Authorization::deny(Some(&code), DenyReason::UnknownPermission))
			}
		}
	}

	pub async fn effective_permissions_at(
		&self,
		admin_id: &str,
		at: Timestamp,
	) -> WdResult<EffectivePermissions> {
		let snapshot = self.adapter.load_grant_snapshot(admin_id).await?;
		Ok(effective_from_snapshot(admin_id, &snapshot, at))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use warden_types::permission::{Admin, AdminRoleBinding, Role};

	fn admin(active: bool) -> Option<Admin> {
		Some(Admin { admin_id: "a1".into(), name: None, is_active: active, created_at: Timestamp(0) })
	}

	fn role(code: &str, perms: &[&str], active: bool) -> Role {
		Role {
			code: code.into(),
			name: code.into(),
			description: None,
			permission_codes: perms.iter().map(|p| (*p).into()).collect(),
			is_system: false,
			is_active: active,
		}
	}

	fn binding(role: &str, primary: bool, expires_at: Option<i64>) -> AdminRoleBinding {
		AdminRoleBinding {
			admin_id: "a1".into(),
			role_code: role.into(),
			is_primary: primary,
			assigned_at: Timestamp(0),
			expires_at: expires_at.map(Timestamp),
		}
	}

	fn ovr(code: &str, grant_type: GrantType, constraints: serde_json::Value) -> DirectPermissionOverride {
		DirectPermissionOverride {
			admin_id: "a1".into(),
			permission_code: code.into(),
			grant_type,
			constraints: constraints.as_object().cloned().unwrap_or_default(),
			reason: None,
			granted_by: "root".into(),
			created_at: Timestamp(0),
		}
	}

	fn support_agent() -> GrantSnapshot {
		GrantSnapshot {
			admin: admin(true),
			bindings: vec![binding("support_agent", true, None)],
			roles: vec![role("support_agent", &["orders.view", "orders.refund"], true)],
			overrides: vec![],
		}
	}

	const NOW: Timestamp = Timestamp(1_000);

	#[test]
	fn test_role_grant_allows_unconstrained() {
		let auth = resolve_snapshot(&support_agent(), "orders.refund", NOW);
		assert!(auth.is_allowed());
		assert!(auth.constraints.is_empty());
	}

	#[test]
	fn test_direct_deny_beats_role_grant() {
		let mut snapshot = support_agent();
		snapshot.overrides.push(ovr("orders.refund", GrantType::Deny, json!({})));
		let auth = resolve_snapshot(&snapshot, "orders.refund", NOW);
		assert_eq!(auth.access, Access::Deny);
		assert_eq!(auth.deny_reason, Some(DenyReason::DirectlyDenied));
		assert!(resolve_snapshot(&snapshot, "orders.view", NOW).is_allowed());
	}

	#[test]
	fn test_deny_wins_over_direct_grant() {
		let mut snapshot = support_agent();
		snapshot.overrides.push(ovr("finance.settle", GrantType::Grant, json!({})));
		snapshot.overrides.push(ovr("finance.settle", GrantType::Deny, json!({})));
		assert!(!resolve_snapshot(&snapshot, "finance.settle", NOW).is_allowed());
	}

	#[test]
	fn test_ungranted_code_denied() {
		let auth = resolve_snapshot(&support_agent(), "finance.settle", NOW);
		assert_eq!(auth.deny_reason, Some(DenyReason::NotGranted));
	}

	#[test]
	fn test_inactive_and_unknown_admin() {
		let mut snapshot = support_agent();
		snapshot.admin = admin(false);
		assert_eq!(
			resolve_snapshot(&snapshot, "orders.view", NOW).deny_reason,
			Some(DenyReason::InactiveAdmin)
		);
		snapshot.admin = None;
		assert_eq!(
			resolve_snapshot(&snapshot, "orders.view", NOW).deny_reason,
			Some(DenyReason::UnknownAdmin)
		);
	}

	#[test]
	fn test_expired_binding_and_inactive_role_contribute_nothing() {
		let mut snapshot = support_agent();
		snapshot.bindings = vec![binding("support_agent", true, Some(NOW.0))];
		assert!(!resolve_snapshot(&snapshot, "orders.view", NOW).is_allowed());
		assert!(resolve_snapshot(&snapshot, "orders.view", Timestamp(NOW.0 - 1)).is_allowed());

		let mut snapshot = support_agent();
		snapshot.roles = vec![role("support_agent", &["orders.view"], false)];
		assert!(!resolve_snapshot(&snapshot, "orders.view", NOW).is_allowed());
	}

	#[test]
	fn test_direct_grant_carries_constraints() {
		let mut snapshot = support_agent();
		snapshot.overrides.push(ovr(
			"orders.refund",
			GrantType::Grant,
			json!({ "amount_limit": 300, "own_only": true }),
		));
		let auth = resolve_snapshot(&snapshot, "orders.refund", NOW);
		assert!(auth.is_allowed());
		assert_eq!(auth.constraints.amount_limit, Some(300.0));
		assert_eq!(auth.constraints.own_only, Some(true));
	}

	#[test]
	fn test_malformed_constraints_fail_closed() {
		let mut snapshot = support_agent();
		snapshot.overrides.push(ovr("finance.view", GrantType::Grant, json!({ "amount_limit": "x" })));
		let auth = resolve_snapshot(&snapshot, "finance.view", NOW);
		assert_eq!(auth.deny_reason, Some(DenyReason::Misconfigured));

		let effective = effective_from_snapshot("a1", &snapshot, NOW);
		assert!(!effective.contains("finance.view"));
		assert_eq!(effective.misconfigured, vec![Box::<str>::from("finance.view")]);
	}

	#[test]
	fn test_effective_views() {
		let mut snapshot = support_agent();
		snapshot.roles.push(role("viewer", &["finance.view", "customers.view"], true));
		snapshot.bindings.push(binding("viewer", false, None));
		snapshot.overrides.push(ovr(
			"orders.assign",
			GrantType::Grant,
			json!({ "geographic": { "cities": ["cairo", "giza"] } }),
		));
		snapshot.overrides.push(ovr(
			"customers.ban",
			GrantType::Grant,
			json!({ "geographic": { "cities": ["giza", "luxor"] } }),
		));
		snapshot.overrides.push(ovr("customers.view", GrantType::Deny, json!({})));

		let effective = effective_from_snapshot("a1", &snapshot, NOW);
		assert_eq!(effective.accessible_resources(), vec!["finance", "orders"]);
		assert_eq!(effective.resource_actions("orders"), vec!["assign", "refund", "view"]);
		assert_eq!(effective.primary_role.as_deref(), Some("support_agent"));
		assert_eq!(effective.roles.len(), 2);
		assert_eq!(
			effective.geographic_scope().cities,
			Some(vec!["cairo".into(), "giza".into(), "luxor".into()])
		);
	}

	#[test]
	fn test_grant_then_revoke_restores_role_set() {
		let base = effective_from_snapshot("a1", &support_agent(), NOW);

		let mut granted = support_agent();
		granted.overrides.push(ovr("finance.refund", GrantType::Grant, json!({})));
		assert!(effective_from_snapshot("a1", &granted, NOW).contains("finance.refund"));

		granted.overrides.clear();
		assert_eq!(effective_from_snapshot("a1", &granted, NOW), base);
	}
}

// vim: ts=4
