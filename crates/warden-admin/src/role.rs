//! Role management

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use warden_types::permission::{AdminRoleBinding, CreateRoleData, Role, UpdateRoleData};

use crate::prelude::*;
use crate::validate;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleRequest {
	pub code: String,
	pub name: String,
	pub description: Option<String>,
	#[serde(default)]
	pub permission_codes: Vec<String>,
	#[serde(default)]
	pub is_system: bool,
}

impl AdminApi {
	pub async fn create_role(&self, req: CreateRoleRequest) -> WdResult<Role> {
		validate::identifier("role code", &req.code)?;
		validate::non_empty("role name", &req.name)?;
		let permission_codes = self.known_permission_codes(&req.permission_codes).await?;

		let role = self
			.adapter
			.create_role(&CreateRoleData {
				code: &req.code,
				name: &req.name,
				description: req.description.as_deref(),
				permission_codes: &permission_codes,
				is_system: req.is_system,
			})
			.await?;

		info!(role = %role.code, permissions = role.permission_codes.len(), "Role created");
		Ok(role)
	}

	pub async fn read_role(&self, code: &str) -> WdResult<Role> {
		self.adapter.read_role(code).await
	}

	pub async fn list_roles(&self) -> WdResult<Vec<Role>> {
		self.adapter.list_roles().await
	}

	/// Deactivating a role removes its grants from every holder without touching bindings
	pub async fn update_role(&self, code: &str, data: &UpdateRoleData) -> WdResult<Role> {
		if let Patch::Value(name) = &data.name {
			validate::non_empty("role name", name)?;
		}
		if matches!(data.name, Patch::Null) || matches!(data.is_active, Patch::Null) {
			return Err(Error::ValidationError("role name and status cannot be cleared".into()));
		}
		self.adapter.update_role(code, data).await?;
		if let Patch::Value(is_active) = data.is_active {
			info!(role = %code, is_active, "Role status changed");
		}
		self.adapter.read_role(code).await
	}

	/// Replaces the role's permission set; every code must exist in the catalog
	pub async fn set_role_permissions(&self, code: &str, permission_codes: &[String]) -> WdResult<Role> {
		let permission_codes = self.known_permission_codes(permission_codes).await?;
		self.adapter.set_role_permissions(code, &permission_codes).await?;
		info!(role = %code, permissions = permission_codes.len(), "Role permissions replaced");
		self.adapter.read_role(code).await
	}

	/// System roles cannot be deleted. Roles still bound to admins or used as
	/// escalation targets fail with `Conflict`.
	pub async fn delete_role(&self, code: &str) -> WdResult<()> {
		let role = self.adapter.read_role(code).await?;
		if role.is_system {
			return Err(Error::ValidationError(format!("system role {} cannot be deleted", code)));
		}
		let refs = self.adapter.count_role_references(code).await?;
		if refs.total() > 0 {
			return Err(Error::Conflict(format!(
				"role {} is referenced by {} binding(s), {} rule(s)",
				code, refs.bindings, refs.rules
			)));
		}
		self.adapter.delete_role(code).await?;
		info!(role = %code, "Role deleted");
		Ok(())
	}

	pub async fn list_role_members(&self, code: &str) -> WdResult<Vec<AdminRoleBinding>> {
		self.adapter.read_role(code).await?;
		self.adapter.list_role_members(code).await
	}

	/// Checks every code against the catalog, returns them sorted and deduplicated
	async fn known_permission_codes<'a>(&self, codes: &'a [String]) -> WdResult<Vec<&'a str>> {
		let mut known: Vec<&str> = codes.iter().map(String::as_str).collect();
		known.sort_unstable();
		known.dedup();
		for code in &known {
			validate::referenced(self.adapter.read_permission(code).await, "permission", code)?;
		}
		Ok(known)
	}
}

// vim: ts=4
