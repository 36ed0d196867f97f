//! Escalation rules, action contexts and approval requests.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::abac::AttrSet;
use crate::prelude::*;
use crate::types::{serialize_timestamp_iso, serialize_timestamp_iso_opt};

// TriggerType //
//*************//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
	/// `context.amount > amount`
	Threshold,
	/// More than `count_per_day` actions by the same admin today
	Count,
	/// More than `time_limit_minutes` elapsed since the action window opened
	Time,
	/// Typed predicate over the action context
	Pattern,
}

impl TriggerType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TriggerType::Threshold => "threshold",
			TriggerType::Count => "count",
			TriggerType::Time => "time",
			TriggerType::Pattern => "pattern",
		}
	}
}

impl FromStr for TriggerType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"threshold" => Ok(TriggerType::Threshold),
			"count" => Ok(TriggerType::Count),
			"time" => Ok(TriggerType::Time),
			"pattern" => Ok(TriggerType::Pattern),
			_ => Err(Error::ValidationError(format!("unknown trigger type: {}", s))),
		}
	}
}

// EscalationAction //
//******************//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
	RequireApproval,
	Notify,
	Block,
}

impl EscalationAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			EscalationAction::RequireApproval => "require_approval",
			EscalationAction::Notify => "notify",
			EscalationAction::Block => "block",
		}
	}
}

impl FromStr for EscalationAction {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"require_approval" => Ok(EscalationAction::RequireApproval),
			"notify" => Ok(EscalationAction::Notify),
			"block" => Ok(EscalationAction::Block),
			_ => Err(Error::ValidationError(format!("unknown escalation action: {}", s))),
		}
	}
}

// EscalationTarget //
//******************//
/// Who receives an escalation: everyone holding a role, or one admin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationTarget {
	Role(Box<str>),
	Admin(Box<str>),
}

impl EscalationTarget {
	/// Splits into (role_code, admin_id) storage columns
	pub fn as_columns(&self) -> (Option<&str>, Option<&str>) {
		match self {
			EscalationTarget::Role(code) => (Some(code), None),
			EscalationTarget::Admin(id) => (None, Some(id)),
		}
	}

	/// Rebuilds a target from storage columns, role takes precedence
	pub fn from_columns(role: Option<Box<str>>, admin: Option<Box<str>>) -> Option<Self> {
		match (role, admin) {
			(Some(role), _) => Some(EscalationTarget::Role(role)),
			(None, Some(admin)) => Some(EscalationTarget::Admin(admin)),
			(None, None) => None,
		}
	}
}

impl std::fmt::Display for EscalationTarget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EscalationTarget::Role(code) => write!(f, "role:{}", code),
			EscalationTarget::Admin(id) => write!(f, "admin:{}", id),
		}
	}
}

// EscalationRule //
//****************//
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
	pub rule_id: i64,
	pub name: Box<str>,
	pub trigger_type: TriggerType,
	pub resource_code: Box<str>,
	pub action_code: Box<str>,
	/// Interpreted strictly per `trigger_type`; unknown keys are ignored
	pub trigger_conditions: serde_json::Map<String, serde_json::Value>,
	pub escalate_to: EscalationTarget,
	pub action_type: EscalationAction,
	/// Lower is evaluated earlier
	pub priority: i32,
	pub is_active: bool,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateRuleData<'a> {
	pub name: &'a str,
	pub trigger_type: TriggerType,
	pub resource_code: &'a str,
	pub action_code: &'a str,
	pub trigger_conditions: &'a serde_json::Map<String, serde_json::Value>,
	pub escalate_to: &'a EscalationTarget,
	pub action_type: EscalationAction,
	pub priority: i32,
	pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRuleData {
	pub name: Patch<Box<str>>,
	pub trigger_type: Patch<TriggerType>,
	pub trigger_conditions: Patch<serde_json::Map<String, serde_json::Value>>,
	pub escalate_to: Patch<EscalationTarget>,
	pub action_type: Patch<EscalationAction>,
	pub priority: Patch<i32>,
	pub is_active: Patch<bool>,
}

#[derive(Debug, Default)]
pub struct ListRuleOptions<'a> {
	pub resource_code: Option<&'a str>,
	pub action_code: Option<&'a str>,
	pub active_only: bool,
}

// ActionContext //
//***************//
/// Facts about an in-flight administrative action, supplied by the caller
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
	pub amount: Option<f64>,
	/// When the action is attempted; defaults to the evaluation time
	pub timestamp: Option<Timestamp>,
	/// Start of the action window, reference point for time triggers
	pub started_at: Option<Timestamp>,
	pub entity_type: Option<Box<str>>,
	pub entity_id: Option<Box<str>>,
	pub governorate_id: Option<Box<str>>,
	pub city_id: Option<Box<str>>,
	pub district_id: Option<Box<str>>,
	pub provider_category: Option<Box<str>>,
	pub owner_id: Option<Box<str>>,
	pub assigned_to: Option<Box<str>>,
	/// Free-form attributes addressable from pattern predicates
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub attrs: BTreeMap<Box<str>, serde_json::Value>,
}

impl ActionContext {
	pub fn with_amount(amount: f64) -> Self {
		Self { amount: Some(amount), ..Default::default() }
	}

	pub fn attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.attrs.insert(key.into(), value.into());
		self
	}
}

impl AttrSet for ActionContext {
	fn get(&self, key: &str) -> Option<&str> {
		let field = match key {
			"entity_type" => &self.entity_type,
			"entity_id" => &self.entity_id,
			"governorate_id" => &self.governorate_id,
			"city_id" => &self.city_id,
			"district_id" => &self.district_id,
			"provider_category" => &self.provider_category,
			"owner_id" => &self.owner_id,
			"assigned_to" => &self.assigned_to,
			_ => {
				return match self.attrs.get(key)? {
					serde_json::Value::String(s) => Some(s.as_str()),
					serde_json::Value::Bool(true) => Some("true"),
					serde_json::Value::Bool(false) => Some("false"),
					_ => None,
				};
			}
		};
		field.as_deref()
	}

	fn get_number(&self, key: &str) -> Option<f64> {
		match key {
			"amount" => self.amount,
			"timestamp" => self.timestamp.map(|ts| ts.0 as f64),
			"started_at" => self.started_at.map(|ts| ts.0 as f64),
			_ => self.attrs.get(key)?.as_f64(),
		}
	}

	fn get_list(&self, key: &str) -> Option<Vec<&str>> {
		match self.attrs.get(key)? {
			serde_json::Value::Array(items) => Some(items.iter().filter_map(|v| v.as_str()).collect()),
			_ => None,
		}
	}
}

// ApprovalRequest //
//*****************//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
	Pending,
	Approved,
	Rejected,
	Expired,
}

impl ApprovalStatus {
	/// Single character storage code
	pub fn code(&self) -> &'static str {
		match self {
			ApprovalStatus::Pending => "P",
			ApprovalStatus::Approved => "A",
			ApprovalStatus::Rejected => "R",
			ApprovalStatus::Expired => "E",
		}
	}

	pub fn from_code(code: &str) -> Option<Self> {
		match code {
			"P" => Some(ApprovalStatus::Pending),
			"A" => Some(ApprovalStatus::Approved),
			"R" => Some(ApprovalStatus::Rejected),
			"E" => Some(ApprovalStatus::Expired),
			_ => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		!matches!(self, ApprovalStatus::Pending)
	}
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
	pub approval_id: i64,
	pub rule_id: i64,
	pub admin_id: Box<str>,
	pub resource_code: Box<str>,
	pub action_code: Box<str>,
	pub context_snapshot: ActionContext,
	pub escalate_to: EscalationTarget,
	pub status: ApprovalStatus,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
	#[serde(serialize_with = "serialize_timestamp_iso_opt")]
	pub resolved_at: Option<Timestamp>,
	pub resolved_by: Option<Box<str>>,
	pub resolution_note: Option<Box<str>>,
}

#[derive(Debug)]
pub struct CreateApprovalData<'a> {
	pub rule_id: i64,
	pub admin_id: &'a str,
	pub resource_code: &'a str,
	pub action_code: &'a str,
	pub context_snapshot: &'a ActionContext,
	pub escalate_to: &'a EscalationTarget,
	pub created_at: Timestamp,
}

/// Terminal transition applied to a pending request
#[derive(Debug)]
pub struct ResolveApprovalData<'a> {
	pub status: ApprovalStatus,
	pub resolved_by: &'a str,
	pub note: Option<&'a str>,
	pub resolved_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct ListApprovalOptions<'a> {
	pub status: Option<ApprovalStatus>,
	/// Requesting admin
	pub admin_id: Option<&'a str>,
	pub escalate_to: Option<&'a EscalationTarget>,
	pub limit: Option<u32>,
}


// vim: ts=4
