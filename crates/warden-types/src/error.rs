//! Error type shared by the engine, the administration API and the adapters.
//!
//! A denied authorization is not an error: it is a normal `Authorization`
//! value. Errors are reserved for storage failures, invalid writes and
//! configuration problems that callers must treat as "deny".

use tracing::warn;

pub type WdResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// The referenced entity does not exist
	NotFound,
	/// The caller is not allowed to perform the operation (e.g. resolving an approval)
	PermissionDenied,
	/// Storage layer failure
	DbError,
	/// A write would break a uniqueness or state invariant
	Conflict(String),
	/// A write was rejected by input validation
	ValidationError(String),
	/// Stored policy data cannot be interpreted (unknown code, malformed value, missing target)
	ConfigError(String),
	/// Unparseable input
	Parse,
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("JSON error: {}", err);
		Self::Parse
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::DbError => write!(f, "database error"),
			Error::Conflict(msg) => write!(f, "conflict: {}", msg),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Parse => write!(f, "parse error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

// vim: ts=4
