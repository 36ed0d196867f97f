//! Audit trail entries and the sink trait that persists them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;
use crate::types::serialize_timestamp_iso;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
	Authorization,
	Constraint,
	Escalation,
}

impl AuditKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditKind::Authorization => "authorization",
			AuditKind::Constraint => "constraint",
			AuditKind::Escalation => "escalation",
		}
	}
}

/// One decision taken by the engine
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
	pub admin_id: Box<str>,
	pub resource_code: Box<str>,
	pub action_code: Box<str>,
	pub permission_code: Option<Box<str>>,
	pub kind: AuditKind,
	/// Short outcome label, e.g. "allow", "deny", "block", "require_approval"
	pub outcome: Box<str>,
	pub reason: Option<Box<str>>,
	pub detail: Option<serde_json::Value>,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct ListAuditOptions<'a> {
	pub admin_id: Option<&'a str>,
	pub kind: Option<AuditKind>,
	pub limit: Option<u32>,
}

/// Destination of the audit trail
///
/// A failing sink never blocks a decision; the engine logs and counts failures.
#[async_trait]
pub trait AuditSink: Debug + Send + Sync {
	async fn append_audit(&self, entry: &AuditEntry) -> WdResult<()>;

	async fn list_audit(&self, opts: &ListAuditOptions<'_>) -> WdResult<Vec<AuditEntry>>;
}

// vim: ts=4
