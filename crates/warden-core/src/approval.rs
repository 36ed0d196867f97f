//! Approval inbox
//!
//! Pending requests are resolved by the admin they are routed to, or by any
//! active holder of the role they are routed to. The requester can never
//! resolve their own request. Every transition starts from `pending` and is
//! applied as a compare-and-set in storage, so a request is resolved at most once.

use std::sync::Arc;

use warden_types::escalation::{
	ApprovalRequest, ApprovalStatus, EscalationTarget, ListApprovalOptions, ResolveApprovalData,
};
use warden_types::policy_adapter::PolicyAdapter;

use crate::opts::EngineOpts;
use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct ApprovalInbox {
	adapter: Arc<dyn PolicyAdapter>,
	opts: EngineOpts,
}

impl ApprovalInbox {
	pub fn new(adapter: Arc<dyn PolicyAdapter>, opts: EngineOpts) -> Self {
		Self { adapter, opts }
	}

	pub async fn read(&self, approval_id: i64) -> WdResult<ApprovalRequest> {
		self.adapter.read_approval(approval_id).await
	}

	pub async fn list(&self, opts: &ListApprovalOptions<'_>) -> WdResult<Vec<ApprovalRequest>> {
		self.adapter.list_approvals(opts).await
	}

	/// Pending requests the admin is allowed to resolve
	pub async fn pending_for(&self, admin_id: &str, at: Timestamp) -> WdResult<Vec<ApprovalRequest>> {
		let pending = self
			.adapter
			.list_approvals(&ListApprovalOptions {
				status: Some(ApprovalStatus::Pending),
				..Default::default()
			})
			.await?;

		let mut res = Vec::new();
		for request in pending {
			if self.may_resolve(&request, admin_id, at).await? {
				res.push(request);
			}
		}
		Ok(res)
	}

	pub async fn approve(
		&self,
		approval_id: i64,
		resolver_id: &str,
		note: Option<&str>,
		at: Timestamp,
	) -> WdResult<ApprovalRequest> {
		self.resolve(approval_id, resolver_id, ApprovalStatus::Approved, note, at).await
	}

	pub async fn reject(
		&self,
		approval_id: i64,
		resolver_id: &str,
		note: Option<&str>,
		at: Timestamp,
	) -> WdResult<ApprovalRequest> {
		self.resolve(approval_id, resolver_id, ApprovalStatus::Rejected, note, at).await
	}

	async fn resolve(
		&self,
		approval_id: i64,
		resolver_id: &str,
		status: ApprovalStatus,
		note: Option<&str>,
		at: Timestamp,
	) -> WdResult<ApprovalRequest> {
		let request = self.adapter.read_approval(approval_id).await?;
		if request.status.is_terminal() {
			return Err(Error::Conflict(format!(
				"approval request {} is already {:?}",
				approval_id, request.status
			)));
		}
		if !self.may_resolve(&request, resolver_id, at).await? {
			warn!(
				approval_id = approval_id,
				resolver = %resolver_id,
				target = %request.escalate_to,
				"Approval resolution refused"
			);
			return Err(Error::PermissionDenied);
		}

		let resolved = self
			.adapter
			.resolve_approval(
				approval_id,
				&ResolveApprovalData { status, resolved_by: resolver_id, note, resolved_at: at },
			)
			.await?;
		info!(
			approval_id = approval_id,
			resolver = %resolver_id,
			status = ?resolved.status,
			"Approval request resolved"
		);
		Ok(resolved)
	}

	async fn may_resolve(
		&self,
		request: &ApprovalRequest,
		resolver_id: &str,
		at: Timestamp,
	) -> WdResult<bool> {
		if request.admin_id.as_ref() == resolver_id {
			return Ok(false);
		}
		match self.adapter.read_admin(resolver_id).await {
			Ok(admin) if admin.is_active => {}
			Ok(_) | Err(Error::NotFound) => return Ok(false),
			Err(err) => return Err(err),
		}

		match &request.escalate_to {
			EscalationTarget::Admin(target) => Ok(target.as_ref() == resolver_id),
			EscalationTarget::Role(role_code) => {
				let holds_role = self
					.adapter
					.list_bindings(resolver_id)
					.await?
					.iter()
					.any(|binding| binding.role_code == *role_code && !binding.is_expired(at));
				Ok(holds_role)
			}
		}
	}

	/// Expires every pending request created before `older_than`
	pub async fn expire_pending(&self, older_than: Timestamp, at: Timestamp) -> WdResult<u64> {
		let expired = self.adapter.expire_approvals(older_than, at).await?;
		if expired > 0 {
			info!(count = expired, "Expired pending approval requests");
		}
		Ok(expired)
	}

	/// Expires requests older than the configured maximum age, if one is set
	pub async fn expire_stale(&self, at: Timestamp) -> WdResult<u64> {
		match self.opts.approval_max_age_secs {
			Some(max_age) => self.expire_pending(at.add_seconds(-max_age), at).await,
			None => Ok(0),
		}
	}
}

// vim: ts=4
