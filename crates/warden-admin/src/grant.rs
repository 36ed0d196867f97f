//! Direct permission overrides

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use warden_core::constraint::Constraints;
use warden_types::permission::{DirectPermissionOverride, GrantType};

use crate::prelude::*;
use crate::validate;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRequest {
	pub admin_id: String,
	pub permission_code: String,
	pub grant_type: GrantType,
	/// Only meaningful for grants
	#[serde(default)]
	pub constraints: serde_json::Map<String, serde_json::Value>,
	pub reason: Option<String>,
	/// Admin performing the change
	pub granted_by: String,
}

impl AdminApi {
	/// Grants or denies a single permission to an admin, replacing any
	/// earlier override for the same permission.
	pub async fn set_override(&self, req: OverrideRequest) -> WdResult<DirectPermissionOverride> {
		validate::referenced(self.adapter.read_admin(&req.admin_id).await, "admin", &req.admin_id)?;
		validate::referenced(
			self.adapter.read_permission(&req.permission_code).await,
			"permission",
			&req.permission_code,
		)?;
		validate::non_empty("granted_by", &req.granted_by)?;

		match req.grant_type {
			GrantType::Grant => {
				Constraints::parse(&req.constraints).map_err(|err| match err {
					Error::ConfigError(msg) => Error::ValidationError(msg),
					err => err,
				})?;
			}
			GrantType::Deny if !req.constraints.is_empty() => {
				return Err(Error::ValidationError("a deny override cannot carry constraints".into()));
			}
			GrantType::Deny => {}
		}

		let data = DirectPermissionOverride {
			admin_id: req.admin_id.into(),
			permission_code: req.permission_code.into(),
			grant_type: req.grant_type,
			constraints: req.constraints,
			reason: req.reason.map(Into::into),
			granted_by: req.granted_by.into(),
			created_at: Timestamp::now(),
		};
		self.adapter.upsert_override(&data).await?;

		info!(
			admin_id = %data.admin_id,
			permission = %data.permission_code,
			grant_type = data.grant_type.as_str(),
			granted_by = %data.granted_by,
			"Permission override set"
		);
		Ok(data)
	}

	pub async fn grant_permission(
		&self,
		admin_id: &str,
		permission_code: &str,
		constraints: serde_json::Map<String, serde_json::Value>,
		granted_by: &str,
	) -> WdResult<DirectPermissionOverride> {
		self.set_override(OverrideRequest {
			admin_id: admin_id.into(),
			permission_code: permission_code.into(),
			grant_type: GrantType::Grant,
			constraints,
			reason: None,
			granted_by: granted_by.into(),
		})
		.await
	}

	pub async fn deny_permission(
		&self,
		admin_id: &str,
		permission_code: &str,
		granted_by: &str,
	) -> WdResult<DirectPermissionOverride> {
		self.set_override(OverrideRequest {
			admin_id: admin_id.into(),
			permission_code: permission_code.into(),
			grant_type: GrantType::Deny,
			constraints: serde_json::Map::new(),
			reason: None,
			granted_by: granted_by.into(),
		})
		.await
	}

	/// Removes the override; the admin falls back to role-derived grants
	pub async fn revoke_override(&self, admin_id: &str, permission_code: &str) -> WdResult<()> {
		self.adapter.delete_override(admin_id, permission_code).await?;
		info!(admin_id = %admin_id, permission = %permission_code, "Permission override revoked");
		Ok(())
	}

	pub async fn list_overrides(&self, admin_id: &str) -> WdResult<Vec<DirectPermissionOverride>> {
		self.adapter.list_overrides(admin_id).await
	}
}

// vim: ts=4
