//! Engine configuration

use serde::{Deserialize, Serialize};
use std::env;

use crate::prelude::*;

/// Default bound on pattern predicate nesting
pub const DEFAULT_MAX_PREDICATE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOpts {
	/// Offset from UTC used for day boundaries (count triggers) and time-of-day
	/// constraint windows, in minutes
	pub utc_offset_minutes: i32,
	/// Capacity of the escalation event channel; events are dropped when full
	pub event_capacity: usize,
	/// Maximum nesting depth of `all`/`any`/`not` in pattern predicates
	pub max_predicate_depth: usize,
	/// Age after which `expire_stale_approvals` moves pending requests to expired.
	/// `None` disables the sweep.
	pub approval_max_age_secs: Option<i64>,
}

impl Default for EngineOpts {
	fn default() -> Self {
		Self {
			utc_offset_minutes: 0,
			event_capacity: 1024,
			max_predicate_depth: DEFAULT_MAX_PREDICATE_DEPTH,
			approval_max_age_secs: None,
		}
	}
}

impl EngineOpts {
	/// Reads `WARDEN_UTC_OFFSET_MINUTES`, `WARDEN_EVENT_CAPACITY`,
	/// `WARDEN_MAX_PREDICATE_DEPTH` and `WARDEN_APPROVAL_MAX_AGE_SECS`,
	/// falling back to defaults for unset variables.
	pub fn from_env() -> WdResult<Self> {
		let mut opts = Self::default();
		if let Some(v) = read_env("WARDEN_UTC_OFFSET_MINUTES")? {
			opts.utc_offset_minutes = v;
		}
		if let Some(v) = read_env("WARDEN_EVENT_CAPACITY")? {
			opts.event_capacity = v;
		}
		if let Some(v) = read_env("WARDEN_MAX_PREDICATE_DEPTH")? {
			opts.max_predicate_depth = v;
		}
		if let Some(v) = read_env("WARDEN_APPROVAL_MAX_AGE_SECS")? {
			opts.approval_max_age_secs = Some(v);
		}
		opts.validate()?;
		Ok(opts)
	}

	pub fn validate(&self) -> WdResult<()> {
		// Real-world offsets stay within ±14h
		if self.utc_offset_minutes.unsigned_abs() > 14 * 60 {
			return Err(Error::ConfigError(format!(
				"utc_offset_minutes out of range: {}",
				self.utc_offset_minutes
			)));
		}
		if self.event_capacity == 0 {
			return Err(Error::ConfigError("event_capacity must be positive".into()));
		}
		if self.max_predicate_depth == 0 {
			return Err(Error::ConfigError("max_predicate_depth must be positive".into()));
		}
		if self.approval_max_age_secs.is_some_and(|age| age <= 0) {
			return Err(Error::ConfigError("approval_max_age_secs must be positive".into()));
		}
		Ok(())
	}
}

fn read_env<T: std::str::FromStr>(name: &str) -> WdResult<Option<T>> {
	match env::var(name) {
		Ok(value) => value
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| Error::ConfigError(format!("invalid value for {}: {}", name, value))),
		Err(env::VarError::NotPresent) => Ok(None),
		Err(env::VarError::NotUnicode(_)) => {
			Err(Error::ConfigError(format!("{} is not valid unicode", name)))
		}
	}
}


// vim: ts=4
