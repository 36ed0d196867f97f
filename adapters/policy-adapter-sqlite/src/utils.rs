//! Shared utilities for the SQLite policy adapter
//!
//! Error mapping helpers and the `push_patch!` macro used by the update functions.

use sqlx::sqlite::SqliteRow;

use warden_types::prelude::*;

/// Applies a `Patch` field to an UPDATE query builder
/// Returns true if the field was added
macro_rules! push_patch {
	($query:expr, $has_updates:expr, $field:literal, $patch:expr) => {{
		match $patch {
			Patch::Undefined => $has_updates,
			Patch::Null => {
				if $has_updates {
					$query.push(", ");
				}
				$query.push(concat!($field, "=NULL"));
				true
			}
			Patch::Value(v) => {
				if $has_updates {
					$query.push(", ");
				}
				$query.push(concat!($field, "=")).push_bind(v);
				true
			}
		}
	}};
	// For fields that need conversion before binding
	($query:expr, $has_updates:expr, $field:literal, $patch:expr, |$v:ident| $convert:expr) => {{
		match $patch {
			Patch::Undefined => $has_updates,
			Patch::Null => {
				if $has_updates {
					$query.push(", ");
				}
				$query.push(concat!($field, "=NULL"));
				true
			}
			Patch::Value($v) => {
				if $has_updates {
					$query.push(", ");
				}
				$query.push(concat!($field, "=")).push_bind($convert);
				true
			}
		}
	}};
}

pub(crate) use push_patch;

/// Build an IN clause with parameterized values
pub(crate) fn push_in<'a>(
	mut query: sqlx::QueryBuilder<'a, sqlx::Sqlite>,
	values: &'a [impl AsRef<str>],
) -> sqlx::QueryBuilder<'a, sqlx::Sqlite> {
	query.push("(");
	for (i, value) in values.iter().enumerate() {
		if i > 0 {
			query.push(", ");
		}
		query.push_bind(value.as_ref());
	}
	query.push(")");
	query
}

/// Log database error
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Map a single-row query result, translating SQL errors
pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> WdResult<T>
where
	F: FnOnce(&SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(ref row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

/// Collect an iterator of row conversions, translating errors
pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>> + Unpin,
) -> WdResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Map a write error; uniqueness violations become `Conflict`
pub(crate) fn map_write_err(err: sqlx::Error, what: &str) -> Error {
	match &err {
		sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
			debug!("DB: unique violation on {}: {}", what, db_err);
			Error::Conflict(format!("{} already exists", what))
		}
		_ => {
			inspect(&err);
			Error::DbError
		}
	}
}

/// Map a generic query error
pub(crate) fn db_err(err: sqlx::Error) -> Error {
	inspect(&err);
	Error::DbError
}

/// Status column codes for activatable rows
pub(crate) fn status_code(is_active: bool) -> &'static str {
	if is_active { "A" } else { "I" }
}

pub(crate) fn is_active_status(status: &str) -> bool {
	status == "A"
}

/// Parse a JSON object column, NULL yields an empty map
pub(crate) fn parse_json_map(
	raw: Option<&str>,
) -> Result<serde_json::Map<String, serde_json::Value>, sqlx::Error> {
	match raw {
		None => Ok(serde_json::Map::new()),
		Some(raw) => serde_json::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err))),
	}
}

/// Decode a text column through `FromStr`
pub(crate) fn parse_column<T>(raw: &str) -> Result<T, sqlx::Error>
where
	T: std::str::FromStr,
	T::Err: std::error::Error + Send + Sync + 'static,
{
	raw.parse().map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

// vim: ts=4
