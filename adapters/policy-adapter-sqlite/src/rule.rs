//! Escalation rules

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use warden_types::escalation::{
	CreateRuleData, EscalationRule, EscalationTarget, ListRuleOptions, UpdateRuleData,
};
use warden_types::prelude::*;

use crate::utils::*;

const RULE_COLUMNS: &str = "rule_id, name, trigger_type, resource_code, action_code, trigger_conditions,
	escalate_role, escalate_admin, action_type, priority, status, created_at";

fn row_to_rule(row: &SqliteRow) -> Result<EscalationRule, sqlx::Error> {
	let escalate_to = EscalationTarget::from_columns(
		row.try_get("escalate_role")?,
		row.try_get("escalate_admin")?,
	)
	.ok_or_else(|| sqlx::Error::Decode("escalation rule without target".into()))?;
	let status: &str = row.try_get("status")?;

	Ok(EscalationRule {
		rule_id: row.try_get("rule_id")?,
		name: row.try_get("name")?,
		trigger_type: parse_column(row.try_get("trigger_type")?)?,
		resource_code: row.try_get("resource_code")?,
		action_code: row.try_get("action_code")?,
		trigger_conditions: parse_json_map(row.try_get("trigger_conditions")?)?,
		escalate_to,
		action_type: parse_column(row.try_get("action_type")?)?,
		priority: row.try_get("priority")?,
		is_active: is_active_status(status),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

pub(crate) async fn create(db: &SqlitePool, data: &CreateRuleData<'_>) -> WdResult<EscalationRule> {
	let (escalate_role, escalate_admin) = data.escalate_to.as_columns();
	let res = sqlx::query(&format!(
		"INSERT INTO escalation_rules (name, trigger_type, resource_code, action_code,
			trigger_conditions, escalate_role, escalate_admin, action_type, priority, status)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
		RETURNING {}",
		RULE_COLUMNS
	))
	.bind(data.name)
	.bind(data.trigger_type.as_str())
	.bind(data.resource_code)
	.bind(data.action_code)
	.bind(serde_json::to_string(data.trigger_conditions)?)
	.bind(escalate_role)
	.bind(escalate_admin)
	.bind(data.action_type.as_str())
	.bind(data.priority)
	.bind(status_code(data.is_active))
	.fetch_one(db)
	.await;

	map_res(res, row_to_rule)
}

pub(crate) async fn read(db: &SqlitePool, rule_id: i64) -> WdResult<EscalationRule> {
	let res = sqlx::query(&format!("SELECT {} FROM escalation_rules WHERE rule_id=?", RULE_COLUMNS))
		.bind(rule_id)
		.fetch_one(db)
		.await;

	map_res(res, row_to_rule)
}

/// Lists rules ordered by evaluation order: priority, then id
pub(crate) async fn list(db: &SqlitePool, opts: &ListRuleOptions<'_>) -> WdResult<Vec<EscalationRule>> {
	let mut query = sqlx::QueryBuilder::new(format!("SELECT {} FROM escalation_rules WHERE 1=1", RULE_COLUMNS));
	if let Some(resource_code) = opts.resource_code {
		query.push(" AND resource_code=").push_bind(resource_code);
	}
	if let Some(action_code) = opts.action_code {
		query.push(" AND action_code=").push_bind(action_code);
	}
	if opts.active_only {
		query.push(" AND status='A'");
	}
	query.push(" ORDER BY priority, rule_id");

	let rows = query.build().fetch_all(db).await.map_err(db_err)?;
	collect_res(rows.iter().map(row_to_rule))
}

pub(crate) async fn update(db: &SqlitePool, rule_id: i64, data: &UpdateRuleData) -> WdResult<()> {
	let mut query = sqlx::QueryBuilder::new("UPDATE escalation_rules SET ");
	let mut has_updates = false;
	has_updates = push_patch!(query, has_updates, "name", &data.name, |v| v.to_string());
	has_updates = push_patch!(query, has_updates, "trigger_type", &data.trigger_type, |v| v.as_str());
	has_updates = push_patch!(query, has_updates, "trigger_conditions", &data.trigger_conditions, |v| {
		serde_json::to_string(v)?
	});
	if let Patch::Value(target) = &data.escalate_to {
		let (role, admin) = target.as_columns();
		if has_updates {
			query.push(", ");
		}
		query.push("escalate_role=").push_bind(role.map(str::to_string));
		query.push(", escalate_admin=").push_bind(admin.map(str::to_string));
		has_updates = true;
	}
	has_updates = push_patch!(query, has_updates, "action_type", &data.action_type, |v| v.as_str());
	has_updates = push_patch!(query, has_updates, "priority", &data.priority);
	has_updates = push_patch!(query, has_updates, "status", &data.is_active, |v| status_code(*v));
	if !has_updates {
		return read(db, rule_id).await.map(|_| ());
	}
	query.push(" WHERE rule_id=").push_bind(rule_id);

	let res = query.build().execute(db).await.map_err(db_err)?;
	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

pub(crate) async fn delete(db: &SqlitePool, rule_id: i64) -> WdResult<()> {
	let res = sqlx::query("DELETE FROM escalation_rules WHERE rule_id=?")
		.bind(rule_id)
		.execute(db)
		.await
		.map_err(db_err)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

// vim: ts=4
