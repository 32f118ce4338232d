// handlers/protected/households.rs - /api/households handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{json, Value};
use sqlx::{PgConnection, Row};
use std::collections::HashMap;

use crate::audit::{resolve_label, ActivityEntry};
use crate::auth::Identity;
use crate::database::{bind_params, SelectQuery, SortDirection};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::HOUSEHOLDS;
use crate::registry::crud::{self, Created};
use crate::registry::fields::{as_object, coerce, prepare, text, FieldKind};
use crate::registry::{insert_sql, EntityDef};
use crate::services::{reference, HOUSEHOLD_NUMBER};
use crate::state::AppState;
use crate::types::AuditAction;

/// A new household may carry a free-text head name; a `head_resident_id`
/// replaces it with the resident's name.
const HOUSEHOLDS_NEW: EntityDef = EntityDef {
    fields: &[text("head_name"), text("address"), text("purok"), text("contact_number")],
    ..HOUSEHOLDS
};

fn resident_id_of(payload: &Value, key: &str) -> Result<Option<i64>, ApiError> {
    let raw = as_object(payload)?.get(key).unwrap_or(&Value::Null);
    let value = coerce(FieldKind::Integer, raw).map_err(|reason| ApiError::invalid_field(key, reason))?;
    Ok(value.as_i64())
}

/// Make `resident_id` head of `household_id` and move them into it.
async fn assign_head(conn: &mut PgConnection, household_id: i64, resident_id: i64) -> Result<(), ApiError> {
    let name: String = sqlx::query(concat!(
        "SELECT ",
        crate::resident_name_sql!(),
        " AS name FROM residents r WHERE r.resident_id = $1 AND r.is_active FOR UPDATE"
    ))
    .bind(resident_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::bad_request("Resident not found or inactive"))?
    .try_get("name")?;

    sqlx::query(
        "UPDATE households SET head_resident_id = $1, head_name = $2, updated_at = NOW() \
         WHERE household_id = $3 RETURNING household_id",
    )
    .bind(resident_id)
    .bind(&name)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found(HOUSEHOLDS.not_found()))?;

    sqlx::query("UPDATE residents SET household_id = $1, updated_at = NOW() WHERE resident_id = $2")
        .bind(household_id)
        .bind(resident_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// GET /api/households - with `member_count` of active residents
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let rows = crud::list(&state.db, &HOUSEHOLDS, &params).await?;
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_field("count", count))
}

/// GET /api/households/:id - the household plus its active `members`
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    let mut household = crud::get(&state.db, &HOUSEHOLDS, id).await?;

    let mut members = SelectQuery::new(
        concat!("r.*, ", crate::resident_name_sql!(), " AS full_name"),
        "residents r",
    );
    members
        .eq("r.household_id", id)
        .eq("r.is_active", true)
        .order_by("r.last_name", SortDirection::Asc)
        .order_by("r.first_name", SortDirection::Asc);
    let members = state.db.fetch_json(&members.to_json_sql()).await?;

    if let Value::Object(map) = &mut household {
        map.insert("members".to_string(), Value::Array(members));
    }
    Ok(ApiResponse::success(household))
}

/// POST /api/households - allocates the next `HHnnn` number; an optional
/// `head_resident_id` is assigned in the same transaction
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let values = prepare(HOUSEHOLDS_NEW.fields, HOUSEHOLDS_NEW.required, &payload)?;
    let head = resident_id_of(&payload, "head_resident_id")?;

    let mut tx = state.db.pool().begin().await?;
    let number = reference::allocate(&mut *tx, &HOUSEHOLD_NUMBER).await?;
    let sql = insert_sql(
        HOUSEHOLDS.table,
        HOUSEHOLDS.id_column,
        HOUSEHOLDS_NEW.fields,
        &values,
        Some((HOUSEHOLD_NUMBER.column, json!(number))),
    );
    let id: i64 = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_one(&mut *tx)
        .await?
        .try_get(0)?;
    if let Some(resident_id) = head {
        assign_head(&mut *tx, id, resident_id).await?;
    }
    tx.commit().await?;

    state
        .audit
        .record(ActivityEntry::new(
            Some(identity.user_id),
            AuditAction::Created,
            HOUSEHOLDS.entity_type,
            id,
            number.clone(),
        ))
        .await;

    let created = Created { id, reference: Some(number) };
    Ok(ApiResponse::success(crud::created_body(&HOUSEHOLDS, &created)).with_message("Household created successfully"))
}

/// PUT /api/households/:id - address fields only; the head changes through `set_head`
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    crud::update(&state, &HOUSEHOLDS, &identity, id, &payload).await?;
    Ok(ApiResponse::message("Household updated successfully"))
}

/// DELETE /api/households/:id - refused while active residents belong to it
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let members: i64 =
        sqlx::query("SELECT COUNT(*) AS count FROM residents WHERE household_id = $1 AND is_active")
            .bind(id)
            .fetch_one(state.db.pool())
            .await?
            .try_get("count")?;
    if members > 0 {
        return Err(ApiError::conflict("Cannot delete household with active members"));
    }

    crud::delete(&state, &HOUSEHOLDS, &identity, id).await?;
    Ok(ApiResponse::message("Household deleted successfully"))
}

/// PUT /api/households/:id/head
///
/// ```json
/// { "resident_id": 14 }
/// ```
pub async fn set_head(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let resident_id = resident_id_of(&payload, "resident_id")?.ok_or_else(|| ApiError::missing_fields(&["resident_id"]))?;

    let mut tx = state.db.pool().begin().await?;
    assign_head(&mut *tx, id, resident_id).await?;
    tx.commit().await?;

    let label = resolve_label(&state.db, &HOUSEHOLDS.label, HOUSEHOLDS.entity_type, id).await;
    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Updated, HOUSEHOLDS.entity_type, id, label)
                .with_remarks(format!("Head of household set to resident #{}", resident_id)),
        )
        .await;
    Ok(ApiResponse::success(json!({ "household_id": id, "head_resident_id": resident_id }))
        .with_message("Household head updated successfully"))
}
