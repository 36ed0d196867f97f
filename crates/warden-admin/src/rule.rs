//! Escalation rule management

use serde::{Deserialize, Serialize};

use warden_core::trigger::TriggerCondition;
use warden_types::escalation::{
	CreateRuleData, EscalationAction, EscalationRule, EscalationTarget, ListRuleOptions, TriggerType,
	UpdateRuleData,
};

use crate::prelude::*;
use crate::validate;

fn default_active() -> bool {
	true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleRequest {
	pub name: String,
	pub trigger_type: TriggerType,
	pub resource_code: String,
	pub action_code: String,
	#[serde(default)]
	pub trigger_conditions: serde_json::Map<String, serde_json::Value>,
	pub escalate_to: EscalationTarget,
	pub action_type: EscalationAction,
	#[serde(default)]
	pub priority: i32,
	#[serde(default = "default_active")]
	pub is_active: bool,
}

impl AdminApi {
	pub async fn create_rule(&self, req: CreateRuleRequest) -> WdResult<EscalationRule> {
		validate::non_empty("rule name", &req.name)?;
		// 1. The rule must guard an action that exists in the catalog
		let permission = self.adapter.find_permission(&req.resource_code, &req.action_code).await?;
		if permission.is_none() {
			return Err(Error::ValidationError(format!(
				"no permission for {}.{}",
				req.resource_code, req.action_code
			)));
		}
		// 2. Trigger conditions and target
		self.check_trigger(req.trigger_type, &req.trigger_conditions)?;
		self.check_target(&req.escalate_to).await?;

		let rule = self
			.adapter
			.create_rule(&CreateRuleData {
				name: &req.name,
				trigger_type: req.trigger_type,
				resource_code: &req.resource_code,
				action_code: &req.action_code,
				trigger_conditions: &req.trigger_conditions,
				escalate_to: &req.escalate_to,
				action_type: req.action_type,
				priority: req.priority,
				is_active: req.is_active,
			})
			.await?;

		info!(
			rule_id = rule.rule_id,
			resource = %rule.resource_code,
			action = %rule.action_code,
			trigger = rule.trigger_type.as_str(),
			escalation = rule.action_type.as_str(),
			target = %rule.escalate_to,
			"Escalation rule created"
		);
		Ok(rule)
	}

	pub async fn read_rule(&self, rule_id: i64) -> WdResult<EscalationRule> {
		self.adapter.read_rule(rule_id).await
	}

	pub async fn list_rules(&self, opts: &ListRuleOptions<'_>) -> WdResult<Vec<EscalationRule>> {
		self.adapter.list_rules(opts).await
	}

	/// Validates the rule as it will look after the update, then applies it
	pub async fn update_rule(&self, rule_id: i64, data: &UpdateRuleData) -> WdResult<EscalationRule> {
		let current = self.adapter.read_rule(rule_id).await?;

		let cleared = matches!(data.name, Patch::Null)
			|| matches!(data.trigger_type, Patch::Null)
			|| matches!(data.trigger_conditions, Patch::Null)
			|| matches!(data.escalate_to, Patch::Null)
			|| matches!(data.action_type, Patch::Null)
			|| matches!(data.priority, Patch::Null)
			|| matches!(data.is_active, Patch::Null);
		if cleared {
			return Err(Error::ValidationError("escalation rule fields cannot be cleared".into()));
		}

		if let Patch::Value(name) = &data.name {
			validate::non_empty("rule name", name)?;
		}
		let trigger_type = match data.trigger_type {
			Patch::Value(trigger_type) => trigger_type,
			_ => current.trigger_type,
		};
		let conditions = match &data.trigger_conditions {
			Patch::Value(conditions) => conditions,
			_ => &current.trigger_conditions,
		};
		self.check_trigger(trigger_type, conditions)?;
		if let Patch::Value(target) = &data.escalate_to {
			self.check_target(target).await?;
		}

		self.adapter.update_rule(rule_id, data).await?;
		info!(rule_id, "Escalation rule updated");
		self.adapter.read_rule(rule_id).await
	}

	pub async fn delete_rule(&self, rule_id: i64) -> WdResult<()> {
		self.adapter.delete_rule(rule_id).await?;
		info!(rule_id, "Escalation rule deleted");
		Ok(())
	}

	fn check_trigger(
		&self,
		trigger_type: TriggerType,
		conditions: &serde_json::Map<String, serde_json::Value>,
	) -> WdResult<()> {
		TriggerCondition::parse(trigger_type, conditions, self.opts.max_predicate_depth)
			.map(|_| ())
			.map_err(|err| match err {
				Error::ConfigError(msg) => Error::ValidationError(msg),
				err => err,
			})
	}

	async fn check_target(&self, target: &EscalationTarget) -> WdResult<()> {
		match target {
			EscalationTarget::Role(code) => {
				validate::referenced(self.adapter.read_role(code).await, "role", code).map(|_| ())
			}
			EscalationTarget::Admin(admin_id) => {
				validate::referenced(self.adapter.read_admin(admin_id).await, "admin", admin_id)
					.map(|_| ())
			}
		}
	}
}

// vim: ts=4
