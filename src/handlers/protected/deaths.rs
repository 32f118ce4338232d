// handlers/protected/deaths.rs - /api/deaths handlers
//
// A death record and the resident's active flag change together: recording a
// death deactivates the resident, removing the record reactivates them.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::Value;
use sqlx::Row;
use std::collections::HashMap;

use crate::audit::{resolve_label, ActivityEntry};
use crate::auth::Identity;
use crate::database::bind_params;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::DEATHS;
use crate::registry::crud::{self, Created};
use crate::registry::fields::{date, prepare, text, value_of};
use crate::registry::{insert_sql, EntityDef};
use crate::state::AppState;
use crate::types::AuditAction;

/// Updates never move a death record to another resident.
const DEATHS_EDIT: EntityDef = EntityDef {
    fields: &[
        date("date_of_death"),
        text("cause_of_death"),
        text("place_of_death"),
        text("remarks"),
    ],
    required: &["date_of_death"],
    ..DEATHS
};

/// GET /api/deaths
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let rows = crud::list(&state.db, &DEATHS, &params).await?;
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_field("count", count))
}

/// GET /api/deaths/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    Ok(ApiResponse::success(crud::get(&state.db, &DEATHS, id).await?))
}

/// POST /api/deaths - records the death and deactivates the resident
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let values = prepare(DEATHS.fields, DEATHS.required, &payload)?;
    let resident_id = value_of(DEATHS.fields, &values, "resident_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::missing_fields(&["resident_id"]))?;

    let mut tx = state.db.pool().begin().await?;
    let row = sqlx::query(
        "SELECT r.is_active, \
         EXISTS (SELECT 1 FROM death_records d WHERE d.resident_id = r.resident_id) AS deceased \
         FROM residents r WHERE r.resident_id = $1 FOR UPDATE OF r",
    )
    .bind(resident_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::bad_request("Resident not found"))?;
    let active: bool = row.try_get("is_active")?;
    let deceased: bool = row.try_get("deceased")?;
    if deceased {
        return Err(ApiError::conflict("A death record already exists for this resident"));
    }
    if !active {
        return Err(ApiError::bad_request("Resident is inactive"));
    }

    let sql = insert_sql(DEATHS.table, DEATHS.id_column, DEATHS.fields, &values, None);
    let id: i64 = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_one(&mut *tx)
        .await?
        .try_get(0)?;
    sqlx::query("UPDATE residents SET is_active = FALSE, updated_at = NOW() WHERE resident_id = $1")
        .bind(resident_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let label = resolve_label(&state.db, &DEATHS.label, DEATHS.entity_type, id).await;
    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Created, DEATHS.entity_type, id, label)
                .with_remarks("Resident deactivated"),
        )
        .await;

    let created = Created { id, reference: None };
    Ok(ApiResponse::success(crud::created_body(&DEATHS, &created)).with_message("Death record created successfully"))
}

/// PUT /api/deaths/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    crud::update(&state, &DEATHS_EDIT, &identity, id, &payload).await?;
    Ok(ApiResponse::message("Death record updated successfully"))
}

/// DELETE /api/deaths/:id - removes the record and reactivates the resident
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let label = resolve_label(&state.db, &DEATHS.label, DEATHS.entity_type, id).await;

    let mut tx = state.db.pool().begin().await?;
    let resident_id: i64 = sqlx::query("DELETE FROM death_records WHERE death_id = $1 RETURNING resident_id")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found(DEATHS.not_found()))?
        .try_get("resident_id")?;
    sqlx::query("UPDATE residents SET is_active = TRUE, updated_at = NOW() WHERE resident_id = $1")
        .bind(resident_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Deleted, DEATHS.entity_type, id, label)
                .with_remarks(format!("Resident #{} reactivated", resident_id)),
        )
        .await;
    Ok(ApiResponse::message("Death record deleted successfully"))
}
