//! Permission catalog, roles, administrators and their grants.
//!
//! Entities reference each other only through stable string codes
//! (`Permission::code`, `Role::code`, `Admin::admin_id`), never through
//! structural pointers, so catalog rows can be reordered or reloaded freely.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::str::FromStr;

use crate::prelude::*;
use crate::types::{serialize_timestamp_iso, serialize_timestamp_iso_opt};

/// Builds the canonical permission code for a resource/action pair
pub fn permission_code(resource: &str, action: &str) -> String {
	format!("{}.{}", resource, action)
}

// Severity //
//**********//
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Low,
	Medium,
	High,
	Critical,
}

impl Severity {
	pub fn as_str(&self) -> &'static str {
		match self {
			Severity::Low => "low",
			Severity::Medium => "medium",
			Severity::High => "high",
			Severity::Critical => "critical",
		}
	}
}

impl FromStr for Severity {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"low" => Ok(Severity::Low),
			"medium" => Ok(Severity::Medium),
			"high" => Ok(Severity::High),
			"critical" => Ok(Severity::Critical),
			_ => Err(Error::ValidationError(format!("unknown severity: {}", s))),
		}
	}
}

/// A (resource, action) capability identified by a stable code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
	pub code: Box<str>,
	pub resource: Box<str>,
	pub action: Box<str>,
	pub severity: Severity,
	/// Actions under this permission must be accompanied by a free-text reason
	#[serde(default)]
	pub requires_reason: bool,
}

#[derive(Debug, Default)]
pub struct UpdatePermissionData {
	pub severity: Patch<Severity>,
	pub requires_reason: Patch<bool>,
}

// Role //
//******//
/// A named bundle of permission codes
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
	pub code: Box<str>,
	pub name: Box<str>,
	pub description: Option<Box<str>>,
	pub permission_codes: Vec<Box<str>>,
	/// Built-in roles cannot be deleted through the administration API
	#[serde(default)]
	pub is_system: bool,
	pub is_active: bool,
}

#[derive(Debug)]
pub struct CreateRoleData<'a> {
	pub code: &'a str,
	pub name: &'a str,
	pub description: Option<&'a str>,
	pub permission_codes: &'a [&'a str],
	pub is_system: bool,
}

#[derive(Debug, Default)]
pub struct UpdateRoleData {
	pub name: Patch<Box<str>>,
	pub description: Patch<Box<str>>,
	pub is_active: Patch<bool>,
}

// Admin //
//*******//
/// Administrator identity record
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
	pub admin_id: Box<str>,
	pub name: Option<Box<str>>,
	pub is_active: bool,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
}

// AdminRoleBinding //
//******************//
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRoleBinding {
	pub admin_id: Box<str>,
	pub role_code: Box<str>,
	pub is_primary: bool,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub assigned_at: Timestamp,
	#[serde(serialize_with = "serialize_timestamp_iso_opt")]
	pub expires_at: Option<Timestamp>,
}

impl AdminRoleBinding {
	/// A binding whose expiry is at or before `at` contributes nothing
	pub fn is_expired(&self, at: Timestamp) -> bool {
		self.expires_at.is_some_and(|exp| exp <= at)
	}
}

#[derive(Debug)]
pub struct CreateBindingData<'a> {
	pub admin_id: &'a str,
	pub role_code: &'a str,
	pub is_primary: bool,
	pub expires_at: Option<Timestamp>,
}

// DirectPermissionOverride //
//**************************//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantType {
	Grant,
	Deny,
}

impl GrantType {
	pub fn as_str(&self) -> &'static str {
		match self {
			GrantType::Grant => "grant",
			GrantType::Deny => "deny",
		}
	}
}

impl FromStr for GrantType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"grant" => Ok(GrantType::Grant),
			"deny" => Ok(GrantType::Deny),
			_ => Err(Error::ValidationError(format!("unknown grant type: {}", s))),
		}
	}
}

/// Admin-specific grant or deny of a single permission
///
/// `constraints` is kept as the raw stored map: it is interpreted at
/// resolution time so that a malformed value fails closed instead of
/// failing the whole read.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectPermissionOverride {
	pub admin_id: Box<str>,
	pub permission_code: Box<str>,
	pub grant_type: GrantType,
	#[serde(default)]
	pub constraints: serde_json::Map<String, serde_json::Value>,
	pub reason: Option<Box<str>>,
	pub granted_by: Box<str>,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
}

// Grant snapshot //
//****************//
/// Everything the resolver needs for one admin, read in a single consistent snapshot
#[derive(Debug, Clone, Default)]
pub struct GrantSnapshot {
	/// `None` if the admin is unknown to the directory
	pub admin: Option<Admin>,
	pub bindings: Vec<AdminRoleBinding>,
	/// Roles referenced by `bindings` (active or not)
	pub roles: Vec<Role>,
	pub overrides: Vec<DirectPermissionOverride>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_permission_code() {
		assert_eq!(permission_code("orders", "refund"), "orders.refund");
	}

	#[test]
	fn test_binding_expiry() {
		let binding = AdminRoleBinding {
			admin_id: "a1".into(),
			role_code: "support_agent".into(),
			is_primary: true,
			assigned_at: Timestamp(100),
			expires_at: Some(Timestamp(200)),
		};
		assert!(!binding.is_expired(Timestamp(199)));
		assert!(binding.is_expired(Timestamp(200)));

		let permanent = AdminRoleBinding { expires_at: None, ..binding };
		assert!(!permanent.is_expired(Timestamp(i64::MAX)));
	}

	#[test]
	fn test_enum_codes() {
		assert_eq!("critical".parse::<Severity>().ok(), Some(Severity::Critical));
		assert!("urgent".parse::<Severity>().is_err());
		assert_eq!("deny".parse::<GrantType>().ok(), Some(GrantType::Deny));
		assert_eq!(GrantType::Grant.as_str(), "grant");
	}
}

// vim: ts=4
