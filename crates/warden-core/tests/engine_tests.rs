//! End-to-end engine tests against the SQLite policy adapter

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use warden_core::clock::day_key;
use warden_core::constraint::ConstraintViolation;
use warden_core::event::EscalationEvent;
use warden_core::{Decision, DenyReason, EngineOpts, EscalationOutcome, Warden};
use warden_policy_adapter_sqlite::PolicyAdapterSqlite;
use warden_types::audit::{AuditKind, AuditSink, ListAuditOptions};
use warden_types::escalation::{
	ActionContext, ApprovalStatus, CreateRuleData, EscalationAction, EscalationRule,
	EscalationTarget, ListApprovalOptions, TriggerType,
};
use warden_types::permission::{
	CreateBindingData, CreateRoleData, DirectPermissionOverride, GrantType, Permission, Severity,
};
use warden_types::policy_adapter::{CounterKey, PolicyAdapter};
use warden_types::prelude::*;

// 2024-03-11 10:00:00 UTC, a Monday
const MONDAY_10AM: Timestamp = Timestamp(1_710_151_200);

async fn create_test_engine(opts: EngineOpts) -> (Warden, Arc<PolicyAdapterSqlite>, TempDir) {
	// Already installed by an earlier test in this binary
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter =
		Arc::new(PolicyAdapterSqlite::new(temp_dir.path()).await.expect("Failed to create adapter"));
	let warden = Warden::new(adapter.clone(), adapter.clone(), opts).expect("Failed to create engine");
	(warden, adapter, temp_dir)
}

fn conditions(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
	match value {
		serde_json::Value::Object(map) => map,
		_ => serde_json::Map::new(),
	}
}

/// Catalog with orders and finance actions, a support agent `a1` and a finance manager `m1`
async fn seed(adapter: &PolicyAdapterSqlite) {
	for (resource, action) in
		[("orders", "view"), ("orders", "refund"), ("finance", "view"), ("finance", "refund")]
	{
		adapter
			.create_permission(&Permission {
				code: format!("{}.{}", resource, action).into(),
				resource: resource.into(),
				action: action.into(),
				severity: Severity::High,
				requires_reason: false,
			})
			.await
			.unwrap();
	}
	for (code, permission_codes) in [
		("support_agent", &["orders.view", "orders.refund"][..]),
		("finance_manager", &["finance.view", "finance.refund"][..]),
	] {
		adapter
			.create_role(&CreateRoleData { code, name: code, description: None, permission_codes, is_system: false })
			.await
			.unwrap();
	}
	for (admin_id, role_code) in [("a1", "support_agent"), ("m1", "finance_manager"), ("m2", "finance_manager")] {
		adapter.create_admin(admin_id, None).await.unwrap();
		adapter
			.create_binding(&CreateBindingData { admin_id, role_code, is_primary: true, expires_at: None })
			.await
			.unwrap();
	}
}

async fn set_override(
	adapter: &PolicyAdapterSqlite,
	admin_id: &str,
	code: &str,
	grant_type: GrantType,
	constraints: serde_json::Value,
) {
	adapter
		.upsert_override(&DirectPermissionOverride {
			admin_id: admin_id.into(),
			permission_code: code.into(),
			grant_type,
			constraints: conditions(constraints),
			reason: None,
			granted_by: "root".into(),
			created_at: Timestamp::now(),
		})
		.await
		.unwrap();
}

struct Rule<'a> {
	trigger_type: TriggerType,
	conditions: serde_json::Value,
	escalate_to: EscalationTarget,
	action_type: EscalationAction,
	priority: i32,
	name: &'a str,
}

async fn create_rule(adapter: &PolicyAdapterSqlite, rule: Rule<'_>) -> EscalationRule {
	adapter
		.create_rule(&CreateRuleData {
			name: rule.name,
			trigger_type: rule.trigger_type,
			resource_code: "finance",
			action_code: "refund",
			trigger_conditions: &conditions(rule.conditions),
			escalate_to: &rule.escalate_to,
			action_type: rule.action_type,
			priority: rule.priority,
			is_active: true,
		})
		.await
		.unwrap()
}

fn finance_manager() -> EscalationTarget {
	EscalationTarget::Role("finance_manager".into())
}

fn refund_of(amount: f64) -> ActionContext {
	ActionContext { timestamp: Some(MONDAY_10AM), ..ActionContext::with_amount(amount) }
}

// Resolution //
//************//
#[tokio::test]
async fn test_direct_deny_beats_role_grant() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	assert!(warden.authorize("a1", "orders", "refund").await.unwrap().is_allowed());

	set_override(&adapter, "a1", "orders.refund", GrantType::Deny, json!({})).await;

	let auth = warden.authorize("a1", "orders", "refund").await.unwrap();
	assert!(!auth.is_allowed());
	assert_eq!(auth.deny_reason, Some(DenyReason::DirectlyDenied));
	assert!(warden.authorize("a1", "orders", "view").await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_ungranted_and_unknown_codes_are_denied() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;

	let auth = warden.authorize("a1", "finance", "refund").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::NotGranted));

	let auth = warden.authorize("a1", "orders", "delete").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::UnknownPermission));

	let auth = warden.resolve("a1", "orders.delete").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::UnknownPermission));

	let auth = warden.authorize("ghost", "orders", "view").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::UnknownAdmin));
	assert!(!warden.is_active("ghost").await.unwrap());
}

#[tokio::test]
async fn test_inactive_admin_and_expired_binding() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;

	adapter.create_admin("temp", None).await.unwrap();
	adapter
		.create_binding(&CreateBindingData {
			admin_id: "temp",
			role_code: "support_agent",
			is_primary: true,
			expires_at: Some(Timestamp::now().add_seconds(-60)),
		})
		.await
		.unwrap();
	let auth = warden.authorize("temp", "orders", "view").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::NotGranted));

	adapter.update_admin_status("a1", false).await.unwrap();
	let auth = warden.authorize("a1", "orders", "view").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::InactiveAdmin));
	assert!(!warden.is_active("a1").await.unwrap());
}

#[tokio::test]
async fn test_revoked_override_restores_role_set() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;

	let before = warden.effective_permissions("a1").await.unwrap();
	set_override(&adapter, "a1", "finance.view", GrantType::Grant, json!({ "amount_limit": 100 })).await;
	let granted = warden.effective_permissions("a1").await.unwrap();
	assert!(granted.contains("finance.view"));
	assert_eq!(granted.accessible_resources(), vec!["finance", "orders"]);

	adapter.delete_override("a1", "finance.view").await.unwrap();
	let after = warden.effective_permissions("a1").await.unwrap();
	assert_eq!(after.codes().collect::<Vec<_>>(), before.codes().collect::<Vec<_>>());
	assert_eq!(after.codes().collect::<Vec<_>>(), vec!["orders.refund", "orders.view"]);
	assert_eq!(after.primary_role.as_deref(), Some("support_agent"));
}

#[tokio::test]
async fn test_batch_checks() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;

	assert!(warden.authorize_all("a1", &[("orders", "view"), ("orders", "refund")]).await.unwrap());
	assert!(!warden.authorize_all("a1", &[("orders", "view"), ("finance", "view")]).await.unwrap());
	assert!(warden.authorize_any("a1", &[("finance", "view"), ("orders", "view")]).await.unwrap());
	assert!(!warden.authorize_any("a1", &[("finance", "view"), ("finance", "refund")]).await.unwrap());
}

// Escalation //
//************//
#[tokio::test]
async fn test_threshold_requires_approval() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	let events = warden.subscribe();
	let rule = create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 500 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::RequireApproval,
			priority: 0,
			name: "large refunds",
		},
	)
	.await;

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(500.0)).await.unwrap();
	assert_eq!(outcome, EscalationOutcome::Proceed);

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(750.0)).await.unwrap();
	let EscalationOutcome::RequireApproval { rule_id, approval_id, target } = outcome else {
		panic!("expected approval requirement, got {:?}", outcome);
	};
	assert_eq!(rule_id, rule.rule_id);
	assert_eq!(target, finance_manager());

	let request = warden.read_approval(approval_id).await.unwrap();
	assert_eq!(request.status, ApprovalStatus::Pending);
	assert_eq!(request.escalate_to, finance_manager());
	assert_eq!(request.context_snapshot.amount, Some(750.0));
	assert_eq!(request.created_at, MONDAY_10AM);

	match events.try_recv() {
		Ok(EscalationEvent::ApprovalCreated { approval_id: id, .. }) => assert_eq!(id, approval_id),
		other => panic!("expected approval event, got {:?}", other),
	}
}

#[tokio::test]
async fn test_first_rule_by_priority_wins() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	// Evaluating this rule would report its missing target
	let orphan = create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 100 }),
			escalate_to: EscalationTarget::Admin("ghost".into()),
			action_type: EscalationAction::RequireApproval,
			priority: 2,
			name: "orphan",
		},
	)
	.await;
	let notify = create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 100 }),
			escalate_to: EscalationTarget::Admin("m2".into()),
			action_type: EscalationAction::Notify,
			priority: 1,
			name: "notify",
		},
	)
	.await;

	let events = warden.subscribe();
	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(200.0)).await.unwrap();
	assert_eq!(outcome.rule_id(), Some(notify.rule_id));
	assert!(outcome.may_proceed());
	assert!(matches!(events.try_recv(), Ok(EscalationEvent::Notify { .. })));
	// The lower priority rule was never evaluated
	assert!(events.try_recv().is_err());

	adapter
		.update_rule(
			notify.rule_id,
			&warden_types::escalation::UpdateRuleData {
				is_active: Patch::Value(false),
				..Default::default()
			},
		)
		.await
		.unwrap();
	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(200.0)).await.unwrap();
	assert_eq!(outcome.rule_id(), Some(orphan.rule_id));
	assert!(!outcome.may_proceed());
	assert!(matches!(events.try_recv(), Ok(EscalationEvent::Misconfiguration { rule_id, .. }) if rule_id == orphan.rule_id));
}

#[tokio::test]
async fn test_missing_target_blocks() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	let events = warden.subscribe();
	let rule = create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 100 }),
			escalate_to: EscalationTarget::Admin("ghost".into()),
			action_type: EscalationAction::RequireApproval,
			priority: 0,
			name: "orphan",
		},
	)
	.await;

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(200.0)).await.unwrap();
	assert!(matches!(outcome, EscalationOutcome::Block { rule_id: Some(id), .. } if id == rule.rule_id));
	assert!(matches!(events.try_recv(), Ok(EscalationEvent::Misconfiguration { .. })));

	let pending = warden
		.list_approvals(&ListApprovalOptions { status: Some(ApprovalStatus::Pending), ..Default::default() })
		.await
		.unwrap();
	assert!(pending.is_empty());
}

#[tokio::test]
async fn test_unusable_trigger_is_skipped() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "limit": 100 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::Block,
			priority: 0,
			name: "broken",
		},
	)
	.await;

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(10_000.0)).await.unwrap();
	assert_eq!(outcome, EscalationOutcome::Proceed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_count_triggers_exactly_once() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Count,
			conditions: json!({ "count_per_day": 5 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::Block,
			priority: 0,
			name: "daily refunds",
		},
	)
	.await;

	let day = day_key(MONDAY_10AM, 0).unwrap();
	let key = CounterKey { admin_id: "m1", resource_code: "finance", action_code: "refund", day: &day };
	for _ in 0..4 {
		adapter.increment_action_counter(&key).await.unwrap();
	}

	let warden = Arc::new(warden);
	let mut handles = Vec::new();
	for _ in 0..2 {
		let warden = warden.clone();
		handles.push(tokio::spawn(async move {
			warden.evaluate_escalation("m1", "finance", "refund", &refund_of(10.0)).await.unwrap()
		}));
	}
	let mut blocked = 0;
	for handle in handles {
		if !handle.await.unwrap().may_proceed() {
			blocked += 1;
		}
	}
	assert_eq!(blocked, 1);
	// The blocked attempt is not counted
	assert_eq!(adapter.read_action_counter(&key).await.unwrap(), 5);
}

#[tokio::test]
async fn test_blocked_attempts_do_not_count() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 1000 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::Block,
			priority: 0,
			name: "large",
		},
	)
	.await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Count,
			conditions: json!({ "count_per_day": 2 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::Block,
			priority: 1,
			name: "daily",
		},
	)
	.await;
	let day = day_key(MONDAY_10AM, 0).unwrap();
	let key = CounterKey { admin_id: "m1", resource_code: "finance", action_code: "refund", day: &day };

	for _ in 0..3 {
		let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(5000.0)).await.unwrap();
		assert!(matches!(outcome, EscalationOutcome::Block { .. }));
	}
	assert_eq!(adapter.read_action_counter(&key).await.unwrap(), 0);

	for expected in 1..=2 {
		let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(10.0)).await.unwrap();
		assert_eq!(outcome, EscalationOutcome::Proceed);
		assert_eq!(adapter.read_action_counter(&key).await.unwrap(), expected);
	}

	// Blocked by the count rule itself
	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(10.0)).await.unwrap();
	assert!(outcome.rule_id().is_some());
	assert!(!outcome.may_proceed());
	assert_eq!(adapter.read_action_counter(&key).await.unwrap(), 2);
}

#[tokio::test]
async fn test_suspended_attempts_do_not_count() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Count,
			conditions: json!({ "count_per_day": 1 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::Block,
			priority: 0,
			name: "daily",
		},
	)
	.await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 500 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::RequireApproval,
			priority: 1,
			name: "approval",
		},
	)
	.await;
	let day = day_key(MONDAY_10AM, 0).unwrap();
	let key = CounterKey { admin_id: "m1", resource_code: "finance", action_code: "refund", day: &day };

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(750.0)).await.unwrap();
	assert!(matches!(outcome, EscalationOutcome::RequireApproval { .. }));
	assert_eq!(adapter.read_action_counter(&key).await.unwrap(), 0);

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(10.0)).await.unwrap();
	assert_eq!(outcome, EscalationOutcome::Proceed);
	assert_eq!(adapter.read_action_counter(&key).await.unwrap(), 1);
}

#[tokio::test]
async fn test_pattern_and_time_triggers() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Pattern,
			conditions: json!({ "predicate": { "all": [
				{ "field": { "field": "channel", "op": "eq", "value": "phone" } },
				{ "field": { "field": "amount", "op": "gte", "value": 50 } }
			] } }),
			escalate_to: EscalationTarget::Admin("m2".into()),
			action_type: EscalationAction::Notify,
			priority: 0,
			name: "phone refunds",
		},
	)
	.await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Time,
			conditions: json!({ "time_limit_minutes": 30 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::Block,
			priority: 1,
			name: "stale session",
		},
	)
	.await;

	let ctx = refund_of(60.0).attr("channel", "phone");
	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &ctx).await.unwrap();
	assert!(matches!(outcome, EscalationOutcome::Notify { .. }));

	let ctx = ActionContext { started_at: Some(MONDAY_10AM.add_seconds(-31 * 60)), ..refund_of(60.0) };
	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &ctx).await.unwrap();
	assert!(matches!(outcome, EscalationOutcome::Block { .. }));

	let ctx = ActionContext { started_at: Some(MONDAY_10AM.add_seconds(-29 * 60)), ..refund_of(60.0) };
	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &ctx).await.unwrap();
	assert_eq!(outcome, EscalationOutcome::Proceed);
}

// Decisions //
//***********//
#[tokio::test]
async fn test_decide_applies_constraints() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	set_override(
		&adapter,
		"a1",
		"finance.refund",
		GrantType::Grant,
		json!({ "amount_limit": 250, "requires_approval": true, "own_only": true }),
	)
	.await;

	let decision = warden.decide("a1", "finance", "refund", &refund_of(100.0)).await.unwrap();
	assert!(decision.may_proceed());

	let decision = warden.decide("a1", "finance", "refund", &refund_of(300.0)).await.unwrap();
	assert!(matches!(decision, Decision::Allow { requires_approval: true, .. }));
	assert!(!decision.may_proceed());

	let ctx = ActionContext { owner_id: Some("someone".into()), ..refund_of(10.0) };
	let decision = warden.decide("a1", "finance", "refund", &ctx).await.unwrap();
	assert_eq!(decision, Decision::Deny { reason: DenyReason::Constraint(ConstraintViolation::OwnOnly) });

	let decision = warden.decide("a1", "finance", "view", &refund_of(10.0)).await.unwrap();
	assert_eq!(decision, Decision::Deny { reason: DenyReason::NotGranted });
}

#[tokio::test]
async fn test_malformed_constraints_fail_closed() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	set_override(&adapter, "a1", "finance.view", GrantType::Grant, json!({ "amount_limit": "lots" })).await;

	let auth = warden.authorize("a1", "finance", "view").await.unwrap();
	assert_eq!(auth.deny_reason, Some(DenyReason::Misconfigured));
}

#[tokio::test]
async fn test_decisions_are_audited() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 500 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::RequireApproval,
			priority: 0,
			name: "large refunds",
		},
	)
	.await;

	warden.decide("m1", "finance", "refund", &refund_of(750.0)).await.unwrap();
	warden.decide("a1", "finance", "refund", &refund_of(750.0)).await.unwrap();

	let entries =
		adapter.list_audit(&ListAuditOptions { admin_id: Some("m1"), ..Default::default() }).await.unwrap();
	let kinds: Vec<_> = entries.iter().map(|e| (e.kind, &*e.outcome)).collect();
	assert_eq!(
		kinds,
		vec![(AuditKind::Escalation, "require_approval"), (AuditKind::Authorization, "allow")]
	);

	let entries =
		adapter.list_audit(&ListAuditOptions { admin_id: Some("a1"), ..Default::default() }).await.unwrap();
	assert_eq!(entries.len(), 1);
	assert_eq!(&*entries[0].outcome, "deny");
	assert_eq!(warden.audit_failures(), 0);
}

// Approvals //
//***********//
#[tokio::test]
async fn test_approval_resolution() {
	let (warden, adapter, _temp) = create_test_engine(EngineOpts::default()).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 500 }),
			escalate_to: finance_manager(),
			action_type: EscalationAction::RequireApproval,
			priority: 0,
			name: "large refunds",
		},
	)
	.await;

	let outcome = warden.evaluate_escalation("m1", "finance", "refund", &refund_of(900.0)).await.unwrap();
	let EscalationOutcome::RequireApproval { approval_id, .. } = outcome else {
		panic!("expected approval requirement, got {:?}", outcome);
	};

	// Requester and non-holders cannot resolve
	assert!(matches!(warden.approve(approval_id, "m1", None).await, Err(Error::PermissionDenied)));
	assert!(matches!(warden.approve(approval_id, "a1", None).await, Err(Error::PermissionDenied)));

	let inbox = warden.approvals().pending_for("m2", Timestamp::now()).await.unwrap();
	assert_eq!(inbox.len(), 1);
	assert!(warden.approvals().pending_for("a1", Timestamp::now()).await.unwrap().is_empty());

	let approved = warden.approve(approval_id, "m2", Some("checked")).await.unwrap();
	assert_eq!(approved.status, ApprovalStatus::Approved);
	assert_eq!(approved.resolved_by.as_deref(), Some("m2"));
	assert_eq!(approved.resolution_note.as_deref(), Some("checked"));

	assert!(matches!(warden.reject(approval_id, "m2", None).await, Err(Error::Conflict(_))));
	assert!(matches!(warden.approve(9_999, "m2", None).await, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_stale_approvals_expire() {
	let opts = EngineOpts { approval_max_age_secs: Some(3600), ..Default::default() };
	let (warden, adapter, _temp) = create_test_engine(opts).await;
	seed(&adapter).await;
	create_rule(
		&adapter,
		Rule {
			trigger_type: TriggerType::Threshold,
			conditions: json!({ "amount": 500 }),
			escalate_to: EscalationTarget::Admin("m2".into()),
			action_type: EscalationAction::RequireApproval,
			priority: 0,
			name: "large refunds",
		},
	)
	.await;

	// One old request, one fresh one
	warden.evaluate_escalation("m1", "finance", "refund", &refund_of(900.0)).await.unwrap();
	let fresh = ActionContext { timestamp: Some(Timestamp::now()), ..ActionContext::with_amount(900.0) };
	warden.evaluate_escalation("m1", "finance", "refund", &fresh).await.unwrap();

	assert_eq!(warden.expire_stale_approvals().await.unwrap(), 1);
	let requests = warden.list_approvals(&ListApprovalOptions::default()).await.unwrap();
	let statuses: Vec<_> = requests.iter().map(|r| r.status).collect();
	assert_eq!(statuses, vec![ApprovalStatus::Expired, ApprovalStatus::Pending]);

	let expired = requests[0].approval_id;
	assert!(matches!(warden.approve(expired, "m2", None).await, Err(Error::Conflict(_))));
}

// vim: ts=4
