//! Typed permission constraints: parsing, merging and enforcement.
//!
//! Constraints narrow an allowed permission. They are stored as free-form
//! JSON maps on direct overrides and interpreted here. When several grant
//! sources constrain the same key, the most restrictive value wins:
//!
//! | kind                       | merge              |
//! |----------------------------|--------------------|
//! | numeric ceiling            | minimum            |
//! | boolean restriction        | `true` wins        |
//! | allow-list                 | intersection       |
//! | time window                | intersection       |
//!
//! Unknown keys are carried through under `extra` and merged by value type.
//!
//! An absent allow-list means no restriction. A present one is enforced as
//! is, so an empty intersection allows nothing. Stored constraint maps must
//! not carry empty allow-lists.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

use warden_types::abac::AttrSet;
use warden_types::escalation::ActionContext;

use crate::clock;
use crate::prelude::*;

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicScope {
	pub governorates: Option<Vec<Box<str>>>,
	pub cities: Option<Vec<Box<str>>>,
	pub districts: Option<Vec<Box<str>>>,
}

/// Wall-clock window, `HH:MM` bounds inclusive
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRestriction {
	pub start: Box<str>,
	pub end: Box<str>,
	/// Allowed weekdays, 0 = Sunday
	pub days: Option<Vec<u8>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
	pub amount_limit: Option<f64>,
	pub approval_threshold: Option<f64>,
	pub requires_approval: Option<bool>,
	pub own_only: Option<bool>,
	pub assigned_only: Option<bool>,
	pub aggregated_only: Option<bool>,
	pub geographic: Option<GeographicScope>,
	pub provider_categories: Option<Vec<Box<str>>>,
	pub fields: Option<Vec<Box<str>>>,
	pub time_restriction: Option<TimeRestriction>,
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintViolation {
	GeographicRestriction,
	AmountExceeded,
	OwnOnly,
	NotAssigned,
	ProviderCategory,
	TimeRestriction,
}

impl ConstraintViolation {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConstraintViolation::GeographicRestriction => "geographic_restriction",
			ConstraintViolation::AmountExceeded => "amount_exceeded",
			ConstraintViolation::OwnOnly => "own_only",
			ConstraintViolation::NotAssigned => "not_assigned",
			ConstraintViolation::ProviderCategory => "provider_category",
			ConstraintViolation::TimeRestriction => "time_restriction",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintVerdict {
	Satisfied,
	/// Allowed, but only with approval (amount above a limit marked `requires_approval`)
	RequiresApproval,
	Violated(ConstraintViolation),
}

impl Constraints {
	/// Interprets a stored constraint map. Malformed values are configuration errors.
	pub fn parse(map: &serde_json::Map<String, Value>) -> WdResult<Self> {
		let constraints: Constraints = serde_json::from_value(Value::Object(map.clone()))
			.map_err(|err| Error::ConfigError(format!("malformed constraints: {}", err)))?;
		constraints.validate()?;
		Ok(constraints)
	}

	pub fn to_map(&self) -> serde_json::Map<String, Value> {
		match serde_json::to_value(self) {
			Ok(Value::Object(map)) => map,
			_ => serde_json::Map::new(),
		}
	}

	pub fn is_empty(&self) -> bool {
		*self == Constraints::default()
	}

	fn validate(&self) -> WdResult<()> {
		let geo = self.geographic.as_ref();
		for (key, list) in [
			("geographic.governorates", geo.and_then(|g| g.governorates.as_ref())),
			("geographic.cities", geo.and_then(|g| g.cities.as_ref())),
			("geographic.districts", geo.and_then(|g| g.districts.as_ref())),
			("provider_categories", self.provider_categories.as_ref()),
		] {
			if list.is_some_and(Vec::is_empty) {
				return Err(Error::ConfigError(format!("{} must not be empty", key)));
			}
		}
		for (key, value) in [("amount_limit", self.amount_limit), ("approval_threshold", self.approval_threshold)]
		{
			if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
				return Err(Error::ConfigError(format!("{} must be a non-negative number", key)));
			}
		}
		if let Some(window) = &self.time_restriction {
			if !is_clock_time(&window.start) || !is_clock_time(&window.end) {
				return Err(Error::ConfigError(format!(
					"time_restriction bounds must be HH:MM, got {}-{}",
					window.start, window.end
				)));
			}
			if window.days.as_ref().is_some_and(|days| days.iter().any(|d| *d > 6)) {
				return Err(Error::ConfigError("time_restriction days must be 0-6".into()));
			}
		}
		Ok(())
	}

	/// Combines two constraint sets keeping the most restrictive value per key
	pub fn merge(&self, other: &Constraints) -> WdResult<Constraints> {
		let mut extra = self.extra.clone();
		for (key, value) in &other.extra {
			let merged = match extra.get(key) {
				Some(existing) => merge_extra(key, existing, value)?,
				None => value.clone(),
			};
			extra.insert(key.clone(), merged);
		}

		Ok(Constraints {
			amount_limit: min_opt(self.amount_limit, other.amount_limit),
			approval_threshold: min_opt(self.approval_threshold, other.approval_threshold),
			requires_approval: or_opt(self.requires_approval, other.requires_approval),
			own_only: or_opt(self.own_only, other.own_only),
			assigned_only: or_opt(self.assigned_only, other.assigned_only),
			aggregated_only: or_opt(self.aggregated_only, other.aggregated_only),
			geographic: match (&self.geographic, &other.geographic) {
				(Some(a), Some(b)) => Some(GeographicScope {
					governorates: intersect_opt(a.governorates.as_ref(), b.governorates.as_ref()),
					cities: intersect_opt(a.cities.as_ref(), b.cities.as_ref()),
					districts: intersect_opt(a.districts.as_ref(), b.districts.as_ref()),
				}),
				(a, b) => a.clone().or_else(|| b.clone()),
			},
			provider_categories: intersect_opt(
				self.provider_categories.as_ref(),
				other.provider_categories.as_ref(),
			),
			fields: intersect_opt(self.fields.as_ref(), other.fields.as_ref()),
			time_restriction: match (&self.time_restriction, &other.time_restriction) {
				(Some(a), Some(b)) => Some(TimeRestriction {
					start: a.start.clone().max(b.start.clone()),
					end: a.end.clone().min(b.end.clone()),
					days: intersect_opt(a.days.as_ref(), b.days.as_ref()),
				}),
				(a, b) => a.clone().or_else(|| b.clone()),
			},
			extra,
		})
	}

	/// Checks an action context against the constraints
	///
	/// Attributes missing from the context are not checked, the caller decides
	/// which facts it supplies.
	pub fn check(
		&self,
		admin_id: &str,
		ctx: &ActionContext,
		at: Timestamp,
		utc_offset_minutes: i32,
	) -> WdResult<ConstraintVerdict> {
		use ConstraintViolation as V;

		if let Some(geo) = &self.geographic {
			for (allowed, key) in [
				(&geo.governorates, "governorate_id"),
				(&geo.cities, "city_id"),
				(&geo.districts, "district_id"),
			] {
				if let (Some(allowed), Some(value)) = (allowed, ctx.get(key)) {
					if !allowed.iter().any(|a| a.as_ref() == value) {
						return Ok(ConstraintVerdict::Violated(V::GeographicRestriction));
					}
				}
			}
		}

		let mut needs_approval = false;
		if let Some(amount) = ctx.amount {
			if self.amount_limit.is_some_and(|limit| amount > limit) {
				if self.requires_approval != Some(true) {
					return Ok(ConstraintVerdict::Violated(V::AmountExceeded));
				}
				needs_approval = true;
			}
			if self.approval_threshold.is_some_and(|threshold| amount > threshold) {
				needs_approval = true;
			}
		}

		if self.own_only == Some(true) {
			if let Some(owner) = ctx.owner_id.as_deref() {
				if owner != admin_id {
					return Ok(ConstraintVerdict::Violated(V::OwnOnly));
				}
			}
		}

		if self.assigned_only == Some(true) {
			if let Some(assignee) = ctx.assigned_to.as_deref() {
				if assignee != admin_id {
					return Ok(ConstraintVerdict::Violated(V::NotAssigned));
				}
			}
		}

		if let (Some(allowed), Some(category)) =
			(&self.provider_categories, ctx.provider_category.as_deref())
		{
			if !allowed.iter().any(|a| a.as_ref() == category) {
				return Ok(ConstraintVerdict::Violated(V::ProviderCategory));
			}
		}

		if let Some(window) = &self.time_restriction {
			let (weekday, time) = clock::weekday_and_time(at, utc_offset_minutes)?;
			let day_ok = window.days.as_ref().is_none_or(|days| days.contains(&weekday));
			let time_ok = time.as_str() >= window.start.as_ref() && time.as_str() <= window.end.as_ref();
			if !day_ok || !time_ok {
				return Ok(ConstraintVerdict::Violated(V::TimeRestriction));
			}
		}

		Ok(if needs_approval {
			ConstraintVerdict::RequiresApproval
		} else {
			ConstraintVerdict::Satisfied
		})
	}
}

fn is_clock_time(s: &str) -> bool {
	let bytes = s.as_bytes();
	if bytes.len() != 5 || bytes[2] != b':' {
		return false;
	}
	let (Ok(h), Ok(m)) = (s[0..2].parse::<u8>(), s[3..5].parse::<u8>()) else {
		return false;
	};
	h < 24 && m < 60
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a.min(b)),
		(a, b) => a.or(b),
	}
}

fn or_opt(a: Option<bool>, b: Option<bool>) -> Option<bool> {
	match (a, b) {
		(None, None) => None,
		(a, b) => Some(a == Some(true) || b == Some(true)),
	}
}

fn intersect_opt<T: Clone + PartialEq>(a: Option<&Vec<T>>, b: Option<&Vec<T>>) -> Option<Vec<T>> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a.iter().filter(|v| b.contains(v)).cloned().collect()),
		(a, b) => a.or(b).cloned(),
	}
}

fn merge_extra(key: &str, a: &Value, b: &Value) -> WdResult<Value> {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => {
			let (Some(fx), Some(fy)) = (x.as_f64(), y.as_f64()) else {
				return Err(Error::ConfigError(format!("non-finite constraint value for {}", key)));
			};
			Ok(if fx <= fy { a.clone() } else { b.clone() })
		}
		(Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(*x || *y)),
		(Value::Array(x), Value::Array(y)) => {
			Ok(Value::Array(x.iter().filter(|v| y.contains(v)).cloned().collect()))
		}
		(x, y) if x == y => Ok(x.clone()),
		_ => Err(Error::ConfigError(format!("conflicting values for constraint {}", key))),
	}
}


// vim: ts=4
