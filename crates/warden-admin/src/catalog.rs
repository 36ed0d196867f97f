//! Permission catalog management

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use warden_types::permission::{Permission, Severity, UpdatePermissionData, permission_code};

use crate::prelude::*;
use crate::validate;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermissionRequest {
	pub resource: String,
	pub action: String,
	/// Defaults to `<resource>.<action>`
	pub code: Option<String>,
	pub severity: Severity,
	#[serde(default)]
	pub requires_reason: bool,
}

impl AdminApi {
	pub async fn create_permission(&self, req: CreatePermissionRequest) -> WdResult<Permission> {
		validate::identifier("resource", &req.resource)?;
		validate::identifier("action", &req.action)?;
		let code = req.code.unwrap_or_else(|| permission_code(&req.resource, &req.action));
		validate::permission_code(&code)?;

		let permission = Permission {
			code: code.into(),
			resource: req.resource.into(),
			action: req.action.into(),
			severity: req.severity,
			requires_reason: req.requires_reason,
		};
		self.adapter.create_permission(&permission).await?;

		info!(permission = %permission.code, severity = permission.severity.as_str(), "Permission created");
		Ok(permission)
	}

	pub async fn read_permission(&self, code: &str) -> WdResult<Permission> {
		self.adapter.read_permission(code).await
	}

	pub async fn list_permissions(&self, resource: Option<&str>) -> WdResult<Vec<Permission>> {
		self.adapter.list_permissions(resource).await
	}

	/// Code, resource and action are immutable; only metadata can change
	pub async fn update_permission(&self, code: &str, data: &UpdatePermissionData) -> WdResult<Permission> {
		if matches!(data.severity, Patch::Null) || matches!(data.requires_reason, Patch::Null) {
			return Err(Error::ValidationError("permission fields cannot be cleared".into()));
		}
		self.adapter.update_permission(code, data).await?;
		self.adapter.read_permission(code).await
	}

	/// Fails with `Conflict` while any role, override or rule still references the code
	pub async fn delete_permission(&self, code: &str) -> WdResult<()> {
		let refs = self.adapter.count_permission_references(code).await?;
		if refs.total() > 0 {
			return Err(Error::Conflict(format!(
				"permission {} is referenced by {} role(s), {} override(s), {} rule(s)",
				code, refs.roles, refs.overrides, refs.rules
			)));
		}
		self.adapter.delete_permission(code).await?;
		info!(permission = %code, "Permission deleted");
		Ok(())
	}
}

// vim: ts=4
