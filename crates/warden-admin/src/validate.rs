//! Input validation helpers

use crate::prelude::*;

const MAX_CODE_LEN: usize = 64;

/// Identifiers (resources, actions, roles, admins): lowercase ASCII, digits, `_` and `-`
pub(crate) fn identifier(kind: &str, value: &str) -> WdResult<()> {
	check(kind, value, |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Permission codes additionally allow `.` as a separator
pub(crate) fn permission_code(value: &str) -> WdResult<()> {
	check("permission code", value, |c| {
		c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' || c == '.'
	})?;
	if value.starts_with('.') || value.ends_with('.') || value.contains("..") {
		return Err(Error::ValidationError(format!("malformed permission code: {}", value)));
	}
	Ok(())
}

pub(crate) fn non_empty(kind: &str, value: &str) -> WdResult<()> {
	if value.trim().is_empty() {
		return Err(Error::ValidationError(format!("{} must not be empty", kind)));
	}
	Ok(())
}

fn check(kind: &str, value: &str, allowed: impl Fn(char) -> bool) -> WdResult<()> {
	if value.is_empty() || value.len() > MAX_CODE_LEN {
		return Err(Error::ValidationError(format!(
			"{} must be 1-{} characters: {:?}",
			kind, MAX_CODE_LEN, value
		)));
	}
	if !value.chars().all(allowed) {
		return Err(Error::ValidationError(format!("invalid {}: {:?}", kind, value)));
	}
	Ok(())
}

/// Maps a missing referenced entity to a validation error naming it
pub(crate) fn referenced<T>(res: WdResult<T>, kind: &str, code: &str) -> WdResult<T> {
	match res {
		Err(Error::NotFound) => Err(Error::ValidationError(format!("unknown {}: {}", kind, code))),
		res => res,
	}
}


// vim: ts=4
