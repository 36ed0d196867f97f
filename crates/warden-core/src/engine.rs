//! Engine facade
//!
//! `Warden` ties the resolver, constraint checks, the escalation engine, the
//! approval inbox, the event bus and the audit trail together. Every
//! authorization, constraint and escalation decision is audited.
//!
//! Storage errors are returned as `Err`; callers must treat them as a denial.

use serde::Serialize;
use std::sync::Arc;

use flume::Receiver;
use warden_types::audit::{AuditKind, AuditSink};
use warden_types::escalation::{ActionContext, ApprovalRequest, ListApprovalOptions};
use warden_types::policy_adapter::PolicyAdapter;

use crate::approval::ApprovalInbox;
use crate::audit::{AuditSubject, Auditor};
use crate::constraint::{ConstraintVerdict, Constraints};
use crate::escalation::{EscalationEngine, EscalationOutcome};
use crate::event::{EscalationEvent, EventBus};
use crate::opts::EngineOpts;
use crate::prelude::*;
use crate::resolver::{Authorization, DenyReason, EffectivePermissions, Resolver};

/// Combined outcome of authorization, constraint checks and escalation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
	Deny {
		reason: DenyReason,
	},
	Allow {
		constraints: Constraints,
		/// Constraints demand approval for this action (amount above limit or threshold)
		requires_approval: bool,
		escalation: EscalationOutcome,
	},
}

impl Decision {
	/// True if the action may be carried out right away
	pub fn may_proceed(&self) -> bool {
		match self {
			Decision::Deny { .. } => false,
			Decision::Allow { requires_approval, escalation, .. } => {
				!requires_approval && escalation.may_proceed()
			}
		}
	}
}

#[derive(Debug)]
pub struct Warden {
	adapter: Arc<dyn PolicyAdapter>,
	resolver: Resolver,
	escalation: EscalationEngine,
	approvals: ApprovalInbox,
	events: EventBus,
	auditor: Auditor,
	opts: EngineOpts,
}

impl Warden {
	pub fn new(
		adapter: Arc<dyn PolicyAdapter>,
		audit_sink: Arc<dyn AuditSink>,
		opts: EngineOpts,
	) -> WdResult<Self> {
		opts.validate()?;
		let events = EventBus::new(opts.event_capacity);
		Ok(Self {
			resolver: Resolver::new(adapter.clone()),
			escalation: EscalationEngine::new(adapter.clone(), events.clone(), opts.clone()),
			approvals: ApprovalInbox::new(adapter.clone(), opts.clone()),
			auditor: Auditor::new(audit_sink),
			adapter,
			events,
			opts,
		})
	}

	pub fn adapter(&self) -> &Arc<dyn PolicyAdapter> {
		&self.adapter
	}

	pub fn opts(&self) -> &EngineOpts {
		&self.opts
	}

	/// Receiver of notification, approval and misconfiguration events
	pub fn subscribe(&self) -> Receiver<EscalationEvent> {
		self.events.subscribe()
	}

	/// Number of audit entries that could not be written
	pub fn audit_failures(&self) -> u64 {
		self.auditor.failures()
	}

	/// Unknown admins are inactive
	pub async fn is_active(&self, admin_id: &str) -> WdResult<bool> {
		match self.adapter.read_admin(admin_id).await {
			Ok(admin) => Ok(admin.is_active),
			Err(Error::NotFound) => Ok(false),
			Err(err) => Err(err),
		}
	}

	// Authorization
	//***************
	pub async fn authorize(
		&self,
		admin_id: &str,
		resource_code: &str,
		action_code: &str,
	) -> WdResult<Authorization> {
		self.authorize_at(admin_id, resource_code, action_code, Timestamp::now()).await
	}

	pub async fn authorize_at(
		&self,
		admin_id: &str,
		resource_code: &str,
		action_code: &str,
		at: Timestamp,
	) -> WdResult<Authorization> {
		let authorization = self.resolver.authorize_at(admin_id, resource_code, action_code, at).await?;
		let subject = AuditSubject { admin_id, resource_code, action_code };
		self.audit_authorization(&subject, &authorization, at).await;
		Ok(authorization)
	}

	/// Resolves a permission by code
	pub async fn resolve(&self, admin_id: &str, permission_code: &str) -> WdResult<Authorization> {
		let at = Timestamp::now();
		let authorization = self.resolver.resolve_at(admin_id, permission_code, at).await?;
		let (resource_code, action_code) =
			permission_code.split_once('.').unwrap_or((permission_code, ""));
		let subject = AuditSubject { admin_id, resource_code, action_code };
		self.audit_authorization(&subject, &authorization, at).await;
		Ok(authorization)
	}

	/// True if every (resource, action) pair is allowed
	pub async fn authorize_all(&self, admin_id: &str, checks: &[(&str, &str)]) -> WdResult<bool> {
		for (resource_code, action_code) in checks {
			if !self.authorize(admin_id, resource_code, action_code).await?.is_allowed() {
				return Ok(false);
			}
		}
		Ok(true)
	}

	/// True if at least one (resource, action) pair is allowed
	pub async fn authorize_any(&self, admin_id: &str, checks: &[(&str, &str)]) -> WdResult<bool> {
		for (resource_code, action_code) in checks {
			if self.authorize(admin_id, resource_code, action_code).await?.is_allowed() {
				return Ok(true);
			}
		}
		Ok(false)
	}

	pub async fn effective_permissions(&self, admin_id: &str) -> WdResult<EffectivePermissions> {
		self.resolver.effective_permissions_at(admin_id, Timestamp::now()).await
	}

	/// Checks the constraints of an allowed authorization against an action context
	pub fn check_constraints(
		&self,
		admin_id: &str,
		authorization: &Authorization,
		ctx: &ActionContext,
		at: Timestamp,
	) -> WdResult<ConstraintVerdict> {
		authorization.constraints.check(admin_id, ctx, at, self.opts.utc_offset_minutes)
	}

	// Escalation
	//************
	pub async fn evaluate_escalation(
		&self,
		admin_id: &str,
		resource_code: &str,
		action_code: &str,
		ctx: &ActionContext,
	) -> WdResult<EscalationOutcome> {
		let now = Timestamp::now();
		let outcome =
			self.escalation.evaluate(admin_id, resource_code, action_code, ctx, now).await?;
		let subject = AuditSubject { admin_id, resource_code, action_code };
		self.audit_escalation(&subject, &outcome, ctx.timestamp.unwrap_or(now)).await;
		Ok(outcome)
	}

	/// Authorizes, checks constraints and evaluates escalation rules in one call
	///
	/// Escalation rules are only evaluated for allowed actions that satisfy
	/// their constraints.
	pub async fn decide(
		&self,
		admin_id: &str,
		resource_code: &str,
		action_code: &str,
		ctx: &ActionContext,
	) -> WdResult<Decision> {
		let at = ctx.timestamp.unwrap_or_else(Timestamp::now);
		let subject = AuditSubject { admin_id, resource_code, action_code };

		let authorization = self.resolver.authorize_at(admin_id, resource_code, action_code, at).await?;
		self.audit_authorization(&subject, &authorization, at).await;
		if let Some(reason) = authorization.deny_reason {
			return Ok(Decision::Deny { reason });
		}

		let verdict = match self.check_constraints(admin_id, &authorization, ctx, at) {
			Ok(verdict) => verdict,
			Err(err) => {
				error!(admin_id = %admin_id, resource = resource_code, action = action_code, "Constraint check failed, denying: {}", err);
				self.audit_constraint(&subject, &authorization, "deny", Some("misconfigured"), at).await;
				return Ok(Decision::Deny { reason: DenyReason::Misconfigured });
			}
		};
		let requires_approval = match verdict {
			ConstraintVerdict::Violated(violation) => {
				debug!(admin_id = %admin_id, violation = violation.as_str(), "Constraint violated");
				self.audit_constraint(&subject, &authorization, "deny", Some(violation.as_str()), at)
					.await;
				return Ok(Decision::Deny { reason: DenyReason::Constraint(violation) });
			}
			ConstraintVerdict::RequiresApproval => true,
			ConstraintVerdict::Satisfied => false,
		};
		if !authorization.constraints.is_empty() {
			let outcome = if requires_approval { "requires_approval" } else { "satisfied" };
			self.audit_constraint(&subject, &authorization, outcome, None, at).await;
		}

		let escalation = self.escalation.evaluate(admin_id, resource_code, action_code, ctx, at).await?;
		self.audit_escalation(&subject, &escalation, at).await;

		Ok(Decision::Allow { constraints: authorization.constraints, requires_approval, escalation })
	}

	// Approval inbox
	//****************
	pub fn approvals(&self) -> &ApprovalInbox {
		&self.approvals
	}

	pub async fn read_approval(&self, approval_id: i64) -> WdResult<ApprovalRequest> {
		self.approvals.read(approval_id).await
	}

	pub async fn list_approvals(&self, opts: &ListApprovalOptions<'_>) -> WdResult<Vec<ApprovalRequest>> {
		self.approvals.list(opts).await
	}

	pub async fn approve(
		&self,
		approval_id: i64,
		resolver_id: &str,
		note: Option<&str>,
	) -> WdResult<ApprovalRequest> {
		self.approvals.approve(approval_id, resolver_id, note, Timestamp::now()).await
	}

	pub async fn reject(
		&self,
		approval_id: i64,
		resolver_id: &str,
		note: Option<&str>,
	) -> WdResult<ApprovalRequest> {
		self.approvals.reject(approval_id, resolver_id, note, Timestamp::now()).await
	}

	/// Expires pending requests created before `older_than`
	pub async fn expire_pending(&self, older_than: Timestamp) -> WdResult<u64> {
		self.approvals.expire_pending(older_than, Timestamp::now()).await
	}

	/// Expires pending requests older than `approval_max_age_secs`
	pub async fn expire_stale_approvals(&self) -> WdResult<u64> {
		self.approvals.expire_stale(Timestamp::now()).await
	}

	// Audit helpers
	//***************
	async fn audit_authorization(
		&self,
		subject: &AuditSubject<'_>,
		authorization: &Authorization,
		at: Timestamp,
	) {
		let (outcome, reason) = match authorization.deny_reason {
			Some(reason) => ("deny", Some(reason.as_str())),
			None => ("allow", None),
		};
		let detail = (!authorization.constraints.is_empty())
			.then(|| serde_json::Value::Object(authorization.constraints.to_map()));
		let entry = subject.entry(
			AuditKind::Authorization,
			authorization.permission_code.as_deref(),
			outcome,
			reason,
			detail,
			at,
		);
		self.auditor.record(entry).await;
	}

	async fn audit_constraint(
		&self,
		subject: &AuditSubject<'_>,
		authorization: &Authorization,
		outcome: &str,
		reason: Option<&str>,
		at: Timestamp,
	) {
		let entry = subject.entry(
			AuditKind::Constraint,
			authorization.permission_code.as_deref(),
			outcome,
			reason,
			Some(serde_json::Value::Object(authorization.constraints.to_map())),
			at,
		);
		self.auditor.record(entry).await;
	}

	async fn audit_escalation(
		&self,
		subject: &AuditSubject<'_>,
		outcome: &EscalationOutcome,
		at: Timestamp,
	) {
		let reason = match outcome {
			EscalationOutcome::Block { reason, .. } => Some(reason.as_ref()),
			_ => None,
		};
		let detail = serde_json::to_value(outcome).ok();
		let entry =
			subject.entry(AuditKind::Escalation, None, outcome.as_str(), reason, detail, at);
		self.auditor.record(entry).await;
	}
}

// vim: ts=4
