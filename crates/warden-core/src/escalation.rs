//! Escalation rule engine
//!
//! Evaluated only after the resolver allowed an action. The active rules of
//! the (resource, action) pair are ordered by priority, ties by rule id, and
//! the first satisfied rule decides the outcome. Later rules are not evaluated.
//!
//! The daily action counter is bumped once per evaluation whenever a `count`
//! rule applies to the pair, before any rule is evaluated. The increment is a
//! single atomic storage operation returning the new value, so concurrent
//! actions observe distinct counts. Only actions that go ahead stay counted:
//! when the outcome is a block or an approval requirement the increment is
//! taken back.

use serde::Serialize;
use std::sync::Arc;

use warden_types::escalation::{
	ActionContext, CreateApprovalData, EscalationAction, EscalationRule, EscalationTarget,
	ListRuleOptions, TriggerType,
};
use warden_types::policy_adapter::{CounterKey, PolicyAdapter};

use crate::clock;
use crate::event::{EscalationEvent, EventBus};
use crate::opts::EngineOpts;
use crate::prelude::*;
use crate::trigger::TriggerCondition;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EscalationOutcome {
	Proceed,
	/// The action proceeds, the target is notified
	Notify { rule_id: i64, target: EscalationTarget },
	/// The action is suspended until the approval request is resolved
	RequireApproval { rule_id: i64, approval_id: i64, target: EscalationTarget },
	Block { rule_id: Option<i64>, reason: Box<str> },
}

impl EscalationOutcome {
	pub fn may_proceed(&self) -> bool {
		matches!(self, EscalationOutcome::Proceed | EscalationOutcome::Notify { .. })
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			EscalationOutcome::Proceed => "proceed",
			EscalationOutcome::Notify { .. } => "notify",
			EscalationOutcome::RequireApproval { .. } => "require_approval",
			EscalationOutcome::Block { .. } => "block",
		}
	}

	pub fn rule_id(&self) -> Option<i64> {
		match self {
			EscalationOutcome::Proceed => None,
			EscalationOutcome::Notify { rule_id, .. }
			| EscalationOutcome::RequireApproval { rule_id, .. } => Some(*rule_id),
			EscalationOutcome::Block { rule_id, .. } => *rule_id,
		}
	}
}

#[derive(Debug, Clone)]
pub struct EscalationEngine {
	adapter: Arc<dyn PolicyAdapter>,
	events: EventBus,
	opts: EngineOpts,
}

impl EscalationEngine {
	pub fn new(adapter: Arc<dyn PolicyAdapter>, events: EventBus, opts: EngineOpts) -> Self {
		Self { adapter, events, opts }
	}

	/// Evaluates the escalation rules of (resource, action) for an allowed action
	///
	/// `now` is used when the context carries no timestamp.
	pub async fn evaluate(
		&self,
		admin_id: &str,
		resource_code: &str,
		action_code: &str,
		ctx: &ActionContext,
		now: Timestamp,
	) -> WdResult<EscalationOutcome> {
		let at = ctx.timestamp.unwrap_or(now);
		let mut rules = self
			.adapter
			.list_rules(&ListRuleOptions {
				resource_code: Some(resource_code),
				action_code: Some(action_code),
				active_only: true,
			})
			.await?;
		rules.retain(|rule| rule.is_active);
		rules.sort_by_key(|rule| (rule.priority, rule.rule_id));

		let day = if rules.iter().any(|rule| rule.trigger_type == TriggerType::Count) {
			Some(clock::day_key(at, self.opts.utc_offset_minutes)?)
		} else {
			None
		};
		let today_count = match &day {
			Some(day) => {
				let key = CounterKey { admin_id, resource_code, action_code, day };
				Some(self.adapter.increment_action_counter(&key).await?)
			}
			None => None,
		};

		let outcome = self.first_match(&rules, admin_id, ctx, at, today_count).await;

		if let Some(day) = &day
			&& !outcome.as_ref().is_ok_and(|outcome| outcome.may_proceed())
		{
			let key = CounterKey { admin_id, resource_code, action_code, day };
			if let Err(err) = self.adapter.decrement_action_counter(&key).await {
				error!(admin_id = %admin_id, resource = resource_code, action = action_code, "Failed to take back action count: {}", err);
			}
		}

		outcome
	}

	async fn first_match(
		&self,
		rules: &[EscalationRule],
		admin_id: &str,
		ctx: &ActionContext,
		at: Timestamp,
		today_count: Option<u64>,
	) -> WdResult<EscalationOutcome> {
		for rule in rules {
			let condition = match TriggerCondition::from_rule(rule, self.opts.max_predicate_depth) {
				Ok(condition) => condition,
				Err(err) => {
					warn!(rule_id = rule.rule_id, rule = %rule.name, "Skipping rule with unusable trigger: {}", err);
					continue;
				}
			};
			if condition.is_satisfied(ctx, at, today_count) {
				debug!(
					admin_id = %admin_id,
					rule_id = rule.rule_id,
					action = rule.action_type.as_str(),
					"Escalation rule triggered"
				);
				return self.apply(rule, admin_id, ctx, at).await;
			}
		}

		Ok(EscalationOutcome::Proceed)
	}

	async fn apply(
		&self,
		rule: &EscalationRule,
		admin_id: &str,
		ctx: &ActionContext,
		at: Timestamp,
	) -> WdResult<EscalationOutcome> {
		if rule.action_type == EscalationAction::Block {
			return Ok(EscalationOutcome::Block {
				rule_id: Some(rule.rule_id),
				reason: rule.name.clone(),
			});
		}

		if !self.target_available(&rule.escalate_to).await? {
			let message = format!("escalation target {} is missing or inactive", rule.escalate_to);
			error!(rule_id = rule.rule_id, rule = %rule.name, "Blocking action: {}", message);
			self.events.publish(EscalationEvent::Misconfiguration {
				rule_id: rule.rule_id,
				message: message.as_str().into(),
			});
			return Ok(EscalationOutcome::Block { rule_id: Some(rule.rule_id), reason: message.into() });
		}

		match rule.action_type {
			EscalationAction::Notify => {
				self.events.publish(EscalationEvent::Notify {
					rule_id: rule.rule_id,
					admin_id: admin_id.into(),
					resource_code: rule.resource_code.clone(),
					action_code: rule.action_code.clone(),
					target: rule.escalate_to.clone(),
				});
				Ok(EscalationOutcome::Notify { rule_id: rule.rule_id, target: rule.escalate_to.clone() })
			}
			EscalationAction::RequireApproval => {
				let snapshot = ActionContext { timestamp: Some(at), ..ctx.clone() };
				let request = self
					.adapter
					.create_approval(&CreateApprovalData {
						rule_id: rule.rule_id,
						admin_id,
						resource_code: &rule.resource_code,
						action_code: &rule.action_code,
						context_snapshot: &snapshot,
						escalate_to: &rule.escalate_to,
						created_at: at,
					})
					.await?;
				info!(
					admin_id = %admin_id,
					rule_id = rule.rule_id,
					approval_id = request.approval_id,
					target = %rule.escalate_to,
					"Approval request created"
				);
				self.events.publish(EscalationEvent::ApprovalCreated {
					approval_id: request.approval_id,
					rule_id: rule.rule_id,
					admin_id: admin_id.into(),
					target: rule.escalate_to.clone(),
				});
				Ok(EscalationOutcome::RequireApproval {
					rule_id: rule.rule_id,
					approval_id: request.approval_id,
					target: rule.escalate_to.clone(),
				})
			}
			EscalationAction::Block => Ok(EscalationOutcome::Block {
				rule_id: Some(rule.rule_id),
				reason: rule.name.clone(),
			}),
		}
	}

	async fn target_available(&self, target: &EscalationTarget) -> WdResult<bool> {
		let res = match target {
			EscalationTarget::Role(code) => self.adapter.read_role(code).await.map(|role| role.is_active),
			EscalationTarget::Admin(id) => self.adapter.read_admin(id).await.map(|admin| admin.is_active),
		};
		match res {
			Ok(active) => Ok(active),
			Err(Error::NotFound) => Ok(false),
			Err(err) => Err(err),
		}
	}
}

// vim: ts=4
