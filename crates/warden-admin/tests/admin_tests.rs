//! Administration API validation tests

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use warden_admin::{
	AdminApi, AssignRoleRequest, CreatePermissionRequest, CreateRoleRequest, CreateRuleRequest,
	OverrideRequest,
};
use warden_core::EngineOpts;
use warden_policy_adapter_sqlite::PolicyAdapterSqlite;
use warden_types::escalation::{EscalationAction, EscalationTarget, TriggerType, UpdateRuleData};
use warden_types::permission::{GrantType, Severity, UpdateRoleData};
use warden_types::prelude::*;

async fn create_test_api() -> (AdminApi, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter = PolicyAdapterSqlite::new(temp_dir.path()).await.expect("Failed to create adapter");
	(AdminApi::new(Arc::new(adapter), EngineOpts::default()), temp_dir)
}

fn map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
	match value {
		serde_json::Value::Object(map) => map,
		_ => serde_json::Map::new(),
	}
}

async fn seed(api: &AdminApi) {
	for (resource, action) in [("orders", "view"), ("orders", "refund"), ("finance", "refund")] {
		api.create_permission(CreatePermissionRequest {
			resource: resource.into(),
			action: action.into(),
			code: None,
			severity: Severity::Medium,
			requires_reason: false,
		})
		.await
		.unwrap();
	}
	api.create_role(CreateRoleRequest {
		code: "support_agent".into(),
		name: "Support agent".into(),
		description: None,
		permission_codes: vec!["orders.view".into(), "orders.refund".into()],
		is_system: false,
	})
	.await
	.unwrap();
	api.create_role(CreateRoleRequest {
		code: "finance_manager".into(),
		name: "Finance manager".into(),
		description: None,
		permission_codes: vec!["finance.refund".into()],
		is_system: true,
	})
	.await
	.unwrap();
	api.create_admin("a1", Some("Alice")).await.unwrap();
	api.create_admin("m1", Some("Mona")).await.unwrap();
}

fn threshold_rule(escalate_to: EscalationTarget) -> CreateRuleRequest {
	CreateRuleRequest {
		name: "large refunds".into(),
		trigger_type: TriggerType::Threshold,
		resource_code: "finance".into(),
		action_code: "refund".into(),
		trigger_conditions: map(json!({ "amount": 500 })),
		escalate_to,
		action_type: EscalationAction::RequireApproval,
		priority: 0,
		is_active: true,
	}
}

// Catalog //
//*********//
#[tokio::test]
async fn test_permission_code_defaults_and_validation() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	let perm = api.read_permission("orders.refund").await.unwrap();
	assert_eq!((&*perm.resource, &*perm.action), ("orders", "refund"));

	let res = api
		.create_permission(CreatePermissionRequest {
			resource: "Orders".into(),
			action: "view".into(),
			code: None,
			severity: Severity::Low,
			requires_reason: false,
		})
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	let res = api
		.create_permission(CreatePermissionRequest {
			resource: "orders".into(),
			action: "refund".into(),
			code: None,
			severity: Severity::Low,
			requires_reason: false,
		})
		.await;
	assert!(matches!(res, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_referenced_permission_cannot_be_deleted() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	assert!(matches!(api.delete_permission("orders.refund").await, Err(Error::Conflict(_))));

	api.set_role_permissions("support_agent", &["orders.view".into()]).await.unwrap();
	api.delete_permission("orders.refund").await.unwrap();
	assert!(matches!(api.read_permission("orders.refund").await, Err(Error::NotFound)));
}

// Roles //
//*******//
#[tokio::test]
async fn test_role_requires_known_permissions() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	let res = api
		.create_role(CreateRoleRequest {
			code: "auditor".into(),
			name: "Auditor".into(),
			description: None,
			permission_codes: vec!["reports.view".into()],
			is_system: false,
		})
		.await;
	assert!(matches!(res, Err(Error::ValidationError(msg)) if msg.contains("reports.view")));
	assert!(matches!(api.read_role("auditor").await, Err(Error::NotFound)));

	let role = api
		.set_role_permissions(
			"support_agent",
			&["orders.view".into(), "orders.view".into(), "orders.refund".into()],
		)
		.await
		.unwrap();
	assert_eq!(role.permission_codes.len(), 2);
}

#[tokio::test]
async fn test_role_deletion_rules() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;
	api.assign_role(AssignRoleRequest {
		admin_id: "a1".into(),
		role_code: "support_agent".into(),
		is_primary: false,
		expires_at: None,
	})
	.await
	.unwrap();

	assert!(matches!(api.delete_role("support_agent").await, Err(Error::Conflict(_))));
	assert!(matches!(api.delete_role("finance_manager").await, Err(Error::ValidationError(_))));

	api.revoke_role("a1", "support_agent").await.unwrap();
	api.delete_role("support_agent").await.unwrap();
	assert!(matches!(api.read_role("support_agent").await, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_role_deactivation() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	let role = api
		.update_role("support_agent", &UpdateRoleData { is_active: Patch::Value(false), ..Default::default() })
		.await
		.unwrap();
	assert!(!role.is_active);

	let res = api
		.update_role("support_agent", &UpdateRoleData { name: Patch::Null, ..Default::default() })
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));
}

// Bindings //
//**********//
#[tokio::test]
async fn test_binding_validation_and_primary() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	let res = api
		.assign_role(AssignRoleRequest {
			admin_id: "ghost".into(),
			role_code: "support_agent".into(),
			is_primary: false,
			expires_at: None,
		})
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	let res = api
		.assign_role(AssignRoleRequest {
			admin_id: "a1".into(),
			role_code: "support_agent".into(),
			is_primary: false,
			expires_at: Some(Timestamp(1)),
		})
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	let first = api
		.assign_role(AssignRoleRequest {
			admin_id: "a1".into(),
			role_code: "support_agent".into(),
			is_primary: false,
			expires_at: None,
		})
		.await
		.unwrap();
	assert!(first.is_primary);

	api.assign_role(AssignRoleRequest {
		admin_id: "a1".into(),
		role_code: "finance_manager".into(),
		is_primary: false,
		expires_at: None,
	})
	.await
	.unwrap();
	api.set_primary_role("a1", "finance_manager").await.unwrap();

	let bindings = api.list_bindings("a1").await.unwrap();
	let primaries: Vec<_> = bindings.iter().filter(|b| b.is_primary).map(|b| &*b.role_code).collect();
	assert_eq!(primaries, vec!["finance_manager"]);

	let res = api
		.assign_role(AssignRoleRequest {
			admin_id: "a1".into(),
			role_code: "support_agent".into(),
			is_primary: true,
			expires_at: None,
		})
		.await;
	assert!(matches!(res, Err(Error::Conflict(_))));
}

// Overrides //
//***********//
#[tokio::test]
async fn test_override_validation() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	let res = api.grant_permission("a1", "reports.view", serde_json::Map::new(), "root").await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	let res = api
		.grant_permission("a1", "finance.refund", map(json!({ "amount_limit": "lots" })), "root")
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	let res = api
		.set_override(OverrideRequest {
			admin_id: "a1".into(),
			permission_code: "orders.refund".into(),
			grant_type: GrantType::Deny,
			constraints: map(json!({ "amount_limit": 10 })),
			reason: None,
			granted_by: "root".into(),
		})
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	api.grant_permission(
		"a1",
		"finance.refund",
		map(json!({ "amount_limit": 250, "time_restriction": { "start": "09:00", "end": "17:00" } })),
		"root",
	)
	.await
	.unwrap();
	api.deny_permission("a1", "finance.refund", "root").await.unwrap();

	let overrides = api.list_overrides("a1").await.unwrap();
	assert_eq!(overrides.len(), 1);
	assert_eq!(overrides[0].grant_type, GrantType::Deny);

	api.revoke_override("a1", "finance.refund").await.unwrap();
	assert!(api.list_overrides("a1").await.unwrap().is_empty());
}

// Rules //
//*******//
#[tokio::test]
async fn test_rule_validation() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	let mut req = threshold_rule(EscalationTarget::Role("finance_manager".into()));
	req.action_code = "delete".into();
	assert!(matches!(api.create_rule(req).await, Err(Error::ValidationError(_))));

	let req = threshold_rule(EscalationTarget::Role("nobody".into()));
	assert!(matches!(api.create_rule(req).await, Err(Error::ValidationError(_))));

	let mut req = threshold_rule(EscalationTarget::Admin("m1".into()));
	req.trigger_conditions = map(json!({ "amount": -5 }));
	assert!(matches!(api.create_rule(req).await, Err(Error::ValidationError(_))));

	let mut req = threshold_rule(EscalationTarget::Admin("m1".into()));
	req.trigger_type = TriggerType::Pattern;
	req.trigger_conditions = map(json!({ "predicate": { "script": "return true" } }));
	assert!(matches!(api.create_rule(req).await, Err(Error::ValidationError(_))));

	let rule = api.create_rule(threshold_rule(EscalationTarget::Role("finance_manager".into()))).await.unwrap();
	assert_eq!(rule.trigger_conditions.get("amount"), Some(&json!(500)));

	// Switching the type without new conditions leaves an unparseable rule
	let res = api
		.update_rule(
			rule.rule_id,
			&UpdateRuleData { trigger_type: Patch::Value(TriggerType::Count), ..Default::default() },
		)
		.await;
	assert!(matches!(res, Err(Error::ValidationError(_))));

	let updated = api
		.update_rule(
			rule.rule_id,
			&UpdateRuleData {
				trigger_type: Patch::Value(TriggerType::Count),
				trigger_conditions: Patch::Value(map(json!({ "count_per_day": 3 }))),
				priority: Patch::Value(2),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(updated.trigger_type, TriggerType::Count);
	assert_eq!(updated.priority, 2);

	assert!(matches!(api.delete_role("finance_manager").await, Err(Error::ValidationError(_))));
	api.delete_rule(rule.rule_id).await.unwrap();
	assert!(matches!(api.read_rule(rule.rule_id).await, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_rule_target_keeps_role_referenced() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;
	api.create_role(CreateRoleRequest {
		code: "reviewers".into(),
		name: "Reviewers".into(),
		description: None,
		permission_codes: vec![],
		is_system: false,
	})
	.await
	.unwrap();
	api.create_rule(threshold_rule(EscalationTarget::Role("reviewers".into()))).await.unwrap();

	assert!(matches!(api.delete_role("reviewers").await, Err(Error::Conflict(_))));
	assert!(matches!(api.delete_permission("finance.refund").await, Err(Error::Conflict(_))));
}

// Directory //
//***********//
#[tokio::test]
async fn test_admin_directory() {
	let (api, _temp) = create_test_api().await;
	seed(&api).await;

	assert!(matches!(api.create_admin("Bad Id", None).await, Err(Error::ValidationError(_))));
	assert!(matches!(api.create_admin("a1", None).await, Err(Error::Conflict(_))));

	api.set_admin_active("a1", false).await.unwrap();
	assert!(!api.read_admin("a1").await.unwrap().is_active);
	assert_eq!(api.list_admins().await.unwrap().len(), 2);
}

// vim: ts=4
