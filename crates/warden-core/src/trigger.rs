//! Interpretation of escalation rule trigger conditions.
//!
//! `trigger_conditions` is read strictly according to the rule's trigger
//! type. Unknown keys are ignored. A missing or malformed required key is a
//! configuration error; the engine then treats the rule as never triggering.

use serde_json::Value;

use warden_types::escalation::{ActionContext, EscalationRule, TriggerType};

use crate::predicate::Predicate;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerCondition {
	/// Satisfied iff `context.amount > amount`
	Threshold { amount: f64 },
	/// Satisfied iff today's action count, including the current one, exceeds `count_per_day`
	Count { count_per_day: u64 },
	/// Satisfied iff more than `time_limit_minutes` elapsed since `context.started_at`
	Time { time_limit_minutes: f64 },
	Pattern(Predicate),
}

impl TriggerCondition {
	pub fn from_rule(rule: &EscalationRule, max_predicate_depth: usize) -> WdResult<Self> {
		Self::parse(rule.trigger_type, &rule.trigger_conditions, max_predicate_depth)
	}

	pub fn parse(
		trigger_type: TriggerType,
		conditions: &serde_json::Map<String, Value>,
		max_predicate_depth: usize,
	) -> WdResult<Self> {
		match trigger_type {
			TriggerType::Threshold => {
				Ok(TriggerCondition::Threshold { amount: non_negative(conditions, "amount")? })
			}
			TriggerType::Count => {
				let count_per_day = required(conditions, "count_per_day")?.as_u64().ok_or_else(|| {
					Error::ConfigError("count_per_day must be a non-negative integer".into())
				})?;
				Ok(TriggerCondition::Count { count_per_day })
			}
			TriggerType::Time => Ok(TriggerCondition::Time {
				time_limit_minutes: non_negative(conditions, "time_limit_minutes")?,
			}),
			TriggerType::Pattern => Ok(TriggerCondition::Pattern(Predicate::parse(
				required(conditions, "predicate")?,
				max_predicate_depth,
			)?)),
		}
	}

	pub fn needs_counter(&self) -> bool {
		matches!(self, TriggerCondition::Count { .. })
	}

	/// Evaluates the condition. `today_count` is the post-increment daily
	/// counter and is only consulted by count triggers.
	pub fn is_satisfied(&self, ctx: &ActionContext, now: Timestamp, today_count: Option<u64>) -> bool {
		match self {
			TriggerCondition::Threshold { amount } => ctx.amount.is_some_and(|a| a > *amount),
			TriggerCondition::Count { count_per_day } => {
				today_count.is_some_and(|count| count > *count_per_day)
			}
			TriggerCondition::Time { time_limit_minutes } => ctx.started_at.is_some_and(|started| {
				now.seconds_since(started) as f64 > time_limit_minutes * 60.0
			}),
			TriggerCondition::Pattern(predicate) => predicate.matches(ctx),
		}
	}
}

fn required<'a>(conditions: &'a serde_json::Map<String, Value>, key: &str) -> WdResult<&'a Value> {
	conditions
		.get(key)
		.filter(|v| !v.is_null())
		.ok_or_else(|| Error::ConfigError(format!("missing trigger condition: {}", key)))
}

fn non_negative(conditions: &serde_json::Map<String, Value>, key: &str) -> WdResult<f64> {
	required(conditions, key)?
		.as_f64()
		.filter(|v| v.is_finite() && *v >= 0.0)
		.ok_or_else(|| Error::ConfigError(format!("{} must be a non-negative number", key)))
}


// vim: ts=4
