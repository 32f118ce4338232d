// handlers/protected/officials.rs - /api/officials and /api/official-positions

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::Value;
use sqlx::Row;
use std::collections::HashMap;

use crate::audit::{resolve_label, ActivityEntry};
use crate::auth::Identity;
use crate::database::{bind_params, Database, SelectQuery, SortDirection};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::OFFICIALS;
use crate::registry::crud::{self, Created};
use crate::registry::fields::{prepare, value_of};
use crate::registry::{insert_sql, update_sql};
use crate::state::AppState;
use crate::types::AuditAction;

/// Officials whose term covers the current year.
pub const SERVING_NOW: &str = "EXTRACT(YEAR FROM CURRENT_DATE)::int BETWEEN o.term_start AND o.term_end";

/// Validated term of an official payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Term {
    position_id: i64,
    start: i64,
    end: i64,
}

fn term_of(values: &[Value]) -> Result<Term, ApiError> {
    let get = |name: &str| value_of(OFFICIALS.fields, values, name).and_then(Value::as_i64);
    let (Some(position_id), Some(start), Some(end)) = (get("position_id"), get("term_start"), get("term_end")) else {
        return Err(ApiError::missing_fields(&["position_id", "term_start", "term_end"]));
    };
    if end < start {
        return Err(ApiError::invalid_field("term_end", "must not be earlier than term_start"));
    }
    Ok(Term { position_id, start, end })
}

/// Insert or replace an official inside one transaction that holds the
/// position row lock, so concurrent appointments cannot overfill a position.
async fn save(state: &AppState, existing: Option<i64>, payload: &Value) -> Result<i64, ApiError> {
    let values = prepare(OFFICIALS.fields, OFFICIALS.required, payload)?;
    let term = term_of(&values)?;
    crud::check_guards(&state.db, OFFICIALS.guards, OFFICIALS.fields, &values).await?;

    let mut tx = state.db.pool().begin().await?;
    if let Some(id) = existing {
        sqlx::query("SELECT official_id FROM officials WHERE official_id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found(OFFICIALS.not_found()))?;
    }
    let position = sqlx::query("SELECT title, max_slots FROM official_positions WHERE position_id = $1 FOR UPDATE")
        .bind(term.position_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::bad_request("Position not found"))?;
    let title: String = position.try_get("title")?;
    let max_slots: i32 = position.try_get("max_slots")?;

    let taken: i64 = sqlx::query(
        "SELECT COUNT(*) AS count FROM officials \
         WHERE position_id = $1 AND term_start <= $2 AND term_end >= $3 AND official_id <> COALESCE($4, 0)",
    )
    .bind(term.position_id)
    .bind(term.end)
    .bind(term.start)
    .bind(existing)
    .fetch_one(&mut *tx)
    .await?
    .try_get("count")?;
    if taken >= i64::from(max_slots) {
        return Err(ApiError::conflict(format!(
            "{} already has {} official(s) for {}-{}",
            title, taken, term.start, term.end
        )));
    }

    let sql = match existing {
        None => insert_sql(OFFICIALS.table, OFFICIALS.id_column, OFFICIALS.fields, &values, None),
        Some(id) => update_sql(OFFICIALS.table, OFFICIALS.id_column, OFFICIALS.fields, &values, id, false),
    };
    let id: i64 = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found(OFFICIALS.not_found()))?
        .try_get(0)?;
    tx.commit().await?;
    Ok(id)
}

async fn audit(state: &AppState, identity: &Identity, action: AuditAction, id: i64) {
    let label = resolve_label(&state.db, &OFFICIALS.label, OFFICIALS.entity_type, id).await;
    state
        .audit
        .record(ActivityEntry::new(Some(identity.user_id), action, OFFICIALS.entity_type, id, label))
        .await;
}

/// GET /api/officials
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let rows = crud::list(&state.db, &OFFICIALS, &params).await?;
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_field("count", count))
}

/// GET /api/officials/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    Ok(ApiResponse::success(crud::get(&state.db, &OFFICIALS, id).await?))
}

/// POST /api/officials - rejected when the position is full for an overlapping term
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let id = save(&state, None, &payload).await?;
    audit(&state, &identity, AuditAction::Created, id).await;
    let created = Created { id, reference: None };
    Ok(ApiResponse::success(crud::created_body(&OFFICIALS, &created)).with_message("Official created successfully"))
}

/// PUT /api/officials/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    save(&state, Some(id), &payload).await?;
    audit(&state, &identity, AuditAction::Updated, id).await;
    Ok(ApiResponse::message("Official updated successfully"))
}

/// DELETE /api/officials/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    crud::delete(&state, &OFFICIALS, &identity, id).await?;
    Ok(ApiResponse::message("Official deleted successfully"))
}

/// Officials serving this year, by position rank.
pub async fn current_roster(db: &Database) -> Result<Vec<Value>, ApiError> {
    let mut query = SelectQuery::new(
        "o.official_id, o.full_name, o.committee, o.photo_url, o.term_start, o.term_end, \
         p.title AS position_title, p.sort_order",
        OFFICIALS.from,
    );
    query
        .condition(SERVING_NOW)
        .order_by("p.sort_order", SortDirection::Asc)
        .order_by("o.full_name", SortDirection::Asc);
    Ok(db.fetch_json(&query.to_json_sql()).await?)
}

/// GET /api/official-positions - with the number of officials serving now
pub async fn positions(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    let select = format!(
        "p.*, (SELECT COUNT(*) FROM officials o WHERE o.position_id = p.position_id AND {}) AS current_count",
        SERVING_NOW
    );
    let mut query = SelectQuery::new(select, "official_positions p");
    query.order_by("p.sort_order", SortDirection::Asc);
    Ok(ApiResponse::success(state.db.fetch_json(&query.to_json_sql()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(payload: Value) -> Vec<Value> {
        prepare(OFFICIALS.fields, OFFICIALS.required, &payload).unwrap()
    }

    #[test]
    fn term_must_not_end_before_it_starts() {
        let ok = values(json!({"full_name": "Ana", "position_id": 2, "term_start": 2023, "term_end": 2025}));
        assert_eq!(term_of(&ok).unwrap(), Term { position_id: 2, start: 2023, end: 2025 });

        let bad = values(json!({"full_name": "Ana", "position_id": 2, "term_start": "2025", "term_end": "2023"}));
        let err = term_of(&bad).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
