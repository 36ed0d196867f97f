//! Typed predicates for `pattern` escalation rules.
//!
//! A predicate is a closed tree of `all` / `any` / `not` combinators over
//! field comparisons, stored as JSON:
//!
//! ```json
//! { "all": [
//!     { "field": { "field": "amount", "op": "gt", "value": 200 } },
//!     { "any": [
//!         { "field": { "field": "channel", "op": "eq", "value": "phone" } },
//!         { "not": { "field": { "field": "owner_id", "op": "exists" } } }
//!     ] }
//! ] }
//! ```
//!
//! Nothing stored in a rule is ever executed as code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_types::abac::AttrSet;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	/// Substring of a string attribute, or member of a list attribute
	Contains,
	/// Attribute value is one of the listed values
	In,
	Exists,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
	pub field: Box<str>,
	pub op: Operator,
	#[serde(default)]
	pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
	All(Vec<Predicate>),
	Any(Vec<Predicate>),
	Not(Box<Predicate>),
	Field(FieldCondition),
}

impl Predicate {
	pub fn parse(value: &Value, max_depth: usize) -> WdResult<Self> {
		let predicate: Predicate = serde_json::from_value(value.clone())
			.map_err(|err| Error::ConfigError(format!("malformed predicate: {}", err)))?;
		predicate.validate(max_depth)?;
		Ok(predicate)
	}

	/// Rejects empty combinators, operand/operator mismatches and excessive nesting
	pub fn validate(&self, max_depth: usize) -> WdResult<()> {
		self.validate_at(1, max_depth)
	}

	fn validate_at(&self, depth: usize, max_depth: usize) -> WdResult<()> {
		if depth > max_depth {
			return Err(Error::ConfigError(format!("predicate nested deeper than {}", max_depth)));
		}
		match self {
			Predicate::All(items) | Predicate::Any(items) => {
				if items.is_empty() {
					return Err(Error::ConfigError("empty all/any predicate".into()));
				}
				items.iter().try_for_each(|p| p.validate_at(depth + 1, max_depth))
			}
			Predicate::Not(inner) => inner.validate_at(depth + 1, max_depth),
			Predicate::Field(cond) => cond.validate(),
		}
	}

	pub fn matches(&self, attrs: &dyn AttrSet) -> bool {
		match self {
			Predicate::All(items) => items.iter().all(|p| p.matches(attrs)),
			Predicate::Any(items) => items.iter().any(|p| p.matches(attrs)),
			Predicate::Not(inner) => !inner.matches(attrs),
			Predicate::Field(cond) => cond.matches(attrs),
		}
	}
}

impl FieldCondition {
	fn validate(&self) -> WdResult<()> {
		let ok = match self.op {
			Operator::Eq | Operator::Ne => {
				matches!(self.value, Value::String(_) | Value::Number(_) | Value::Bool(_))
			}
			Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => self.value.is_number(),
			Operator::Contains => self.value.is_string(),
			Operator::In => self.value.as_array().is_some_and(|items| {
				!items.is_empty() && items.iter().all(|v| v.is_string() || v.is_number())
			}),
			Operator::Exists => true,
		};
		if self.field.is_empty() {
			return Err(Error::ConfigError("predicate field name is empty".into()));
		}
		if !ok {
			return Err(Error::ConfigError(format!(
				"operand {} does not fit operator {:?} on field {}",
				self.value, self.op, self.field
			)));
		}
		Ok(())
	}

	fn matches(&self, attrs: &dyn AttrSet) -> bool {
		let field = self.field.as_ref();
		match self.op {
			Operator::Eq => self.equals(attrs),
			Operator::Ne => attrs.exists(field) && !self.equals(attrs),
			Operator::Gt => self.compare(attrs, |a, b| a > b),
			Operator::Gte => self.compare(attrs, |a, b| a >= b),
			Operator::Lt => self.compare(attrs, |a, b| a < b),
			Operator::Lte => self.compare(attrs, |a, b| a <= b),
			Operator::Contains => {
				let Some(needle) = self.value.as_str() else {
					return false;
				};
				attrs.get(field).is_some_and(|s| s.contains(needle)) || attrs.contains(field, needle)
			}
			Operator::In => {
				let Some(items) = self.value.as_array() else {
					return false;
				};
				items.iter().any(|item| match item {
					Value::String(s) => attrs.has(field, s),
					Value::Number(n) => n.as_f64().is_some_and(|n| attrs.get_number(field) == Some(n)),
					_ => false,
				})
			}
			Operator::Exists => attrs.exists(field),
		}
	}

	fn equals(&self, attrs: &dyn AttrSet) -> bool {
		let field = self.field.as_ref();
		match &self.value {
			Value::String(s) => attrs.has(field, s),
			Value::Number(n) => n.as_f64().is_some_and(|n| attrs.get_number(field) == Some(n)),
			Value::Bool(b) => attrs.has(field, if *b { "true" } else { "false" }),
			_ => false,
		}
	}

	fn compare(&self, attrs: &dyn AttrSet, cmp: impl Fn(f64, f64) -> bool) -> bool {
		match (attrs.get_number(&self.field), self.value.as_f64()) {
			(Some(actual), Some(expected)) => cmp(actual, expected),
			_ => false,
		}
	}
}


// vim: ts=4
