//! Audit trail writer
//!
//! Appends decisions to an `AuditSink`. A failed append is logged and counted
//! but never changes or delays the decision being recorded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use warden_types::audit::{AuditEntry, AuditKind, AuditSink};

use crate::prelude::*;

#[derive(Debug)]
pub struct Auditor {
	sink: Arc<dyn AuditSink>,
	failures: AtomicU64,
}

impl Auditor {
	pub fn new(sink: Arc<dyn AuditSink>) -> Self {
		Self { sink, failures: AtomicU64::new(0) }
	}

	pub async fn record(&self, entry: AuditEntry) {
		if let Err(err) = self.sink.append_audit(&entry).await {
			let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
			error!(
				admin_id = %entry.admin_id,
				kind = entry.kind.as_str(),
				outcome = %entry.outcome,
				failures = failures,
				"Audit write failed: {}", err
			);
		}
	}

	/// Number of audit writes that failed since startup
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub fn sink(&self) -> &Arc<dyn AuditSink> {
		&self.sink
	}
}

/// Builder for entries about one (admin, resource, action) triple
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuditSubject<'a> {
	pub admin_id: &'a str,
	pub resource_code: &'a str,
	pub action_code: &'a str,
}

impl AuditSubject<'_> {
	pub fn entry(
		&self,
		kind: AuditKind,
		permission_code: Option<&str>,
		outcome: &str,
		reason: Option<&str>,
		detail: Option<serde_json::Value>,
		at: Timestamp,
	) -> AuditEntry {
		AuditEntry {
			admin_id: self.admin_id.into(),
			resource_code: self.resource_code.into(),
			action_code: self.action_code.into(),
			permission_code: permission_code.map(Into::into),
			kind,
			outcome: outcome.into(),
			reason: reason.map(Into::into),
			detail,
			created_at: at,
		}
	}
}

// vim: ts=4
