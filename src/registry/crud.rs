use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::Row;
use std::collections::HashMap;

use super::entity::{insert_sql, update_sql, EntityDef, Filter, Guard};
use super::fields::{coerce, prepare, value_of, Field};
use crate::audit::{resolve_label, ActivityEntry};
use crate::auth::Identity;
use crate::database::{bind_params, Database, SelectQuery};
use crate::error::ApiError;
use crate::services::{notifications, reference};
use crate::state::AppState;
use crate::types::AuditAction;

#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Apply query-string filters: declared equality filters, `search`, and `date_from`/`date_to`.
pub fn apply_filters(
    query: &mut SelectQuery,
    filters: &[Filter],
    search: &[&str],
    date_column: Option<&str>,
    params: &HashMap<String, String>,
) -> Result<(), ApiError> {
    for filter in filters {
        let Some(raw) = params.get(filter.param).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let value = coerce(filter.kind, &Value::String(raw.clone()))
            .map_err(|reason| ApiError::invalid_field(filter.param, reason))?;
        query.eq_cast(filter.column, value, filter.kind.cast());
    }
    query.search(search, params.get("search").map(String::as_str));
    if let Some(column) = date_column {
        query.date_range(
            column,
            params.get("date_from").map(String::as_str),
            params.get("date_to").map(String::as_str),
        );
    }
    Ok(())
}

pub async fn list(db: &Database, def: &EntityDef, params: &HashMap<String, String>) -> Result<Vec<Value>, ApiError> {
    let mut query = SelectQuery::new(def.select, def.from);
    apply_filters(&mut query, def.filters, def.search, def.date_column, params)?;
    query.order_by(def.order_by.0, def.order_by.1).limit(def.list_limit);
    Ok(db.fetch_json(&query.to_json_sql()).await?)
}

pub async fn get(db: &Database, def: &EntityDef, id: i64) -> Result<Value, ApiError> {
    let mut query = SelectQuery::new(def.select, def.from);
    query.eq(def.qualified_id, id);
    Ok(db.fetch_json_404(&query.to_json_sql(), def.display).await?)
}

/// Reject the write when a referenced row is missing (or, for residents, inactive).
pub async fn check_guards(db: &Database, guards: &[Guard], fields: &[Field], values: &[Value]) -> Result<(), ApiError> {
    for guard in guards {
        match guard {
            Guard::ActiveResident { field } => {
                let Some(id) = value_of(fields, values, field).and_then(Value::as_i64) else {
                    continue;
                };
                ensure_active_resident(db, id).await?;
            }
            Guard::Exists { field, table, id_column, what } => {
                let Some(id) = value_of(fields, values, field).and_then(Value::as_i64) else {
                    continue;
                };
                let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1) AS found", table, id_column);
                let found: bool = sqlx::query(&sql)
                    .bind(id)
                    .fetch_one(db.pool())
                    .await?
                    .try_get("found")?;
                if !found {
                    return Err(ApiError::bad_request(format!("{} not found", what)));
                }
            }
        }
    }
    Ok(())
}

pub async fn ensure_active_resident(db: &Database, resident_id: i64) -> Result<(), ApiError> {
    let active: bool = sqlx::query("SELECT is_active FROM residents WHERE resident_id = $1")
        .bind(resident_id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| ApiError::bad_request("Resident not found"))?
        .try_get("is_active")?;
    if !active {
        return Err(ApiError::bad_request("Resident is inactive"));
    }
    Ok(())
}

pub async fn create(state: &AppState, def: &EntityDef, identity: &Identity, payload: &Value) -> Result<Created, ApiError> {
    let values = prepare(def.fields, def.required, payload)?;
    check_guards(&state.db, def.guards, def.fields, &values).await?;

    let mut tx = state.db.pool().begin().await?;
    let number = match &def.reference {
        Some(format) => Some(reference::allocate(&mut *tx, format).await?),
        None => None,
    };
    let leading = def
        .reference
        .as_ref()
        .zip(number.clone())
        .map(|(format, n)| (format.column, Value::String(n)));
    let sql = insert_sql(def.table, def.id_column, def.fields, &values, leading);
    let id: i64 = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_one(&mut *tx)
        .await?
        .try_get(0)?;
    tx.commit().await?;

    let label = match &number {
        Some(n) => n.clone(),
        None => resolve_label(&state.db, &def.label, def.entity_type, id).await,
    };
    state
        .audit
        .record(ActivityEntry::new(Some(identity.user_id), AuditAction::Created, def.entity_type, id, label))
        .await;
    if def.notifiable {
        notifications::record_creator_view(&state.db, identity.user_id, def.entity_type, id).await;
    }

    Ok(Created { id, reference: number })
}

pub async fn update(state: &AppState, def: &EntityDef, identity: &Identity, id: i64, payload: &Value) -> Result<(), ApiError> {
    let values = prepare(def.fields, def.required, payload)?;
    check_guards(&state.db, def.guards, def.fields, &values).await?;

    let sql = update_sql(def.table, def.id_column, def.fields, &values, id, def.touches_updated_at);
    state
        .db
        .execute_returning_id(&sql)
        .await?
        .ok_or_else(|| ApiError::not_found(def.not_found()))?;

    let label = resolve_label(&state.db, &def.label, def.entity_type, id).await;
    state
        .audit
        .record(ActivityEntry::new(Some(identity.user_id), AuditAction::Updated, def.entity_type, id, label))
        .await;
    Ok(())
}

pub async fn delete(state: &AppState, def: &EntityDef, identity: &Identity, id: i64) -> Result<(), ApiError> {
    // Resolved first: the row is gone afterwards.
    let label = resolve_label(&state.db, &def.label, def.entity_type, id).await;

    let sql = format!("DELETE FROM {} WHERE {} = $1 RETURNING {}", def.table, def.id_column, def.id_column);
    sqlx::query(&sql)
        .bind(id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| ApiError::not_found(def.not_found()))?;

    state
        .audit
        .record(ActivityEntry::new(Some(identity.user_id), AuditAction::Deleted, def.entity_type, id, label))
        .await;
    Ok(())
}

pub async fn set_status(
    state: &AppState,
    def: &EntityDef,
    identity: &Identity,
    id: i64,
    payload: &Value,
) -> Result<String, ApiError> {
    let allowed = def
        .statuses
        .ok_or_else(|| ApiError::not_found(format!("{} has no status workflow", def.display)))?;
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::missing_fields(&["status"]))?;
    if !allowed.contains(&status) {
        return Err(ApiError::invalid_field(
            "status",
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    let touch = if def.touches_updated_at { ", updated_at = NOW()" } else { "" };
    let sql = format!(
        "UPDATE {} SET status = $1{} WHERE {} = $2 RETURNING {}",
        def.table, touch, def.id_column, def.id_column
    );
    sqlx::query(&sql)
        .bind(status)
        .bind(id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| ApiError::not_found(def.not_found()))?;

    let label = resolve_label(&state.db, &def.label, def.entity_type, id).await;
    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Updated, def.entity_type, id, label)
                .with_remarks(format!("Status changed to {}", status)),
        )
        .await;
    Ok(status.to_string())
}

/// Response body for a create: `{ id, <id_column>, <reference column>? }`.
pub fn created_body(def: &EntityDef, created: &Created) -> Value {
    let mut body = Map::new();
    body.insert("id".to_string(), json!(created.id));
    body.insert(def.id_column.to_string(), json!(created.id));
    if let (Some(format), Some(number)) = (&def.reference, &created.reference) {
        body.insert(format.column.to_string(), json!(number));
    }
    Value::Object(body)
}
