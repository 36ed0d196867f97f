//! Admin directory and role bindings

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use warden_types::permission::{Admin, AdminRoleBinding, CreateBindingData};

use crate::prelude::*;
use crate::validate;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoleRequest {
	pub admin_id: String,
	pub role_code: String,
	/// Makes this the admin's primary role, clearing the previous one
	#[serde(default)]
	pub is_primary: bool,
	pub expires_at: Option<Timestamp>,
}

impl AdminApi {
	// Admins
	//********
	pub async fn create_admin(&self, admin_id: &str, name: Option<&str>) -> WdResult<Admin> {
		validate::identifier("admin id", admin_id)?;
		let admin = self.adapter.create_admin(admin_id, name).await?;
		info!(admin_id = %admin_id, "Admin created");
		Ok(admin)
	}

	pub async fn read_admin(&self, admin_id: &str) -> WdResult<Admin> {
		self.adapter.read_admin(admin_id).await
	}

	pub async fn list_admins(&self) -> WdResult<Vec<Admin>> {
		self.adapter.list_admins().await
	}

	/// An inactive admin is denied everything regardless of bindings and overrides
	pub async fn set_admin_active(&self, admin_id: &str, is_active: bool) -> WdResult<()> {
		self.adapter.update_admin_status(admin_id, is_active).await?;
		info!(admin_id = %admin_id, is_active, "Admin status changed");
		Ok(())
	}

	// Bindings
	//**********
	/// Binds a role to an admin. The admin's first binding always becomes primary.
	pub async fn assign_role(&self, req: AssignRoleRequest) -> WdResult<AdminRoleBinding> {
		validate::referenced(self.adapter.read_admin(&req.admin_id).await, "admin", &req.admin_id)?;
		validate::referenced(self.adapter.read_role(&req.role_code).await, "role", &req.role_code)?;
		if let Some(expires_at) = req.expires_at
			&& expires_at <= Timestamp::now()
		{
			return Err(Error::ValidationError("binding expiry must be in the future".into()));
		}

		let binding = self
			.adapter
			.create_binding(&CreateBindingData {
				admin_id: &req.admin_id,
				role_code: &req.role_code,
				is_primary: req.is_primary,
				expires_at: req.expires_at,
			})
			.await?;

		info!(
			admin_id = %binding.admin_id,
			role = %binding.role_code,
			is_primary = binding.is_primary,
			"Role assigned"
		);
		Ok(binding)
	}

	/// Removing the primary binding promotes the earliest remaining one
	pub async fn revoke_role(&self, admin_id: &str, role_code: &str) -> WdResult<()> {
		self.adapter.delete_binding(admin_id, role_code).await?;
		info!(admin_id = %admin_id, role = %role_code, "Role revoked");
		Ok(())
	}

	pub async fn set_primary_role(&self, admin_id: &str, role_code: &str) -> WdResult<()> {
		self.adapter.set_primary_binding(admin_id, role_code).await?;
		info!(admin_id = %admin_id, role = %role_code, "Primary role changed");
		Ok(())
	}

	pub async fn list_bindings(&self, admin_id: &str) -> WdResult<Vec<AdminRoleBinding>> {
		self.adapter.list_bindings(admin_id).await
	}
}

// vim: ts=4
