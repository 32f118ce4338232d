// handlers/protected/residents.rs - /api/residents handlers
//
// Residents are never hard-deleted: DELETE deactivates, restore reactivates.
// A resident with a death record stays inactive.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{json, Value};
use sqlx::Row;
use std::collections::{BTreeSet, HashMap};

use crate::audit::{resolve_label, ActivityEntry};
use crate::auth::Identity;
use crate::database::{Database, Pagination, SelectQuery};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::RESIDENTS;
use crate::registry::crud::{self, apply_filters};
use crate::registry::fields::{as_object, coerce, int, prepare, Field, FieldKind};
use crate::state::AppState;
use crate::types::AuditAction;

const GENDERS: &[&str] = &["Male", "Female"];
const HOUSEHOLD_ONLY: &[Field] = &[int("household_id")];

fn query_i64(params: &HashMap<String, String>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

/// `status` query parameter: `active` (default), `inactive` or `all`.
fn active_filter(raw: Option<&str>) -> Result<Option<bool>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("active") {
        "active" => Ok(Some(true)),
        "inactive" => Ok(Some(false)),
        "all" => Ok(None),
        _ => Err(ApiError::invalid_field("status", "must be active, inactive or all")),
    }
}

fn check_gender(payload: &Value) -> Result<(), ApiError> {
    match payload.get("gender").and_then(Value::as_str).map(str::trim) {
        Some(gender) if !gender.is_empty() && !GENDERS.contains(&gender) => {
            Err(ApiError::invalid_field("gender", "must be Male or Female"))
        }
        _ => Ok(()),
    }
}

/// `{ household_id }` and nothing else: the one partial update residents support.
fn is_household_reassignment(payload: &Value) -> bool {
    payload
        .as_object()
        .map_or(false, |o| o.len() == 1 && o.contains_key("household_id"))
}

/// (is_active, has a death record); 404 when the resident does not exist.
async fn resident_state(db: &Database, resident_id: i64) -> Result<(bool, bool), ApiError> {
    let row = sqlx::query(
        "SELECT r.is_active, \
         EXISTS (SELECT 1 FROM death_records d WHERE d.resident_id = r.resident_id) AS deceased \
         FROM residents r WHERE r.resident_id = $1",
    )
    .bind(resident_id)
    .fetch_optional(db.pool())
    .await?
    .ok_or_else(|| ApiError::not_found(RESIDENTS.not_found()))?;
    Ok((row.try_get("is_active")?, row.try_get("deceased")?))
}

/// GET /api/residents - paginated, active residents by default
///
/// Query: `page`, `limit`, `status`, `search`, `purok`, `gender`, `civil_status`,
/// `household_id`, `is_4ps`, `is_registered_voter`, `is_pwd`, `is_senior_citizen`,
/// `date_from`, `date_to`.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let page = Pagination::new(query_i64(&params, "page"), query_i64(&params, "limit"), RESIDENTS.list_limit);

    let mut query = SelectQuery::new(RESIDENTS.select, RESIDENTS.from);
    if let Some(active) = active_filter(params.get("status").map(String::as_str))? {
        query.eq("r.is_active", active);
    }
    apply_filters(&mut query, RESIDENTS.filters, RESIDENTS.search, RESIDENTS.date_column, &params)?;

    let total = state.db.fetch_count(&query.to_count_sql()).await?;
    query.order_by(RESIDENTS.order_by.0, RESIDENTS.order_by.1).paginate(&page);
    let rows = state.db.fetch_json(&query.to_json_sql()).await?;

    Ok(ApiResponse::success(rows).with_field("pagination", page.info(total)))
}

/// GET /api/residents/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    Ok(ApiResponse::success(crud::get(&state.db, &RESIDENTS, id).await?))
}

/// POST /api/residents
///
/// Required: `first_name`, `last_name`, `date_of_birth`, `gender`, `civil_status`, `purok`.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    check_gender(&payload)?;
    let created = crud::create(&state, &RESIDENTS, &identity, &payload).await?;
    Ok(ApiResponse::success(crud::created_body(&RESIDENTS, &created)).with_message("Resident created successfully"))
}

/// PUT /api/residents/:id - full replace, or household reassignment when the
/// body is exactly `{ "household_id": ... }`
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    if is_household_reassignment(&payload) {
        reassign_household(&state, &identity, id, &payload).await?;
        return Ok(ApiResponse::message("Resident household updated successfully"));
    }

    check_gender(&payload)?;
    crud::update(&state, &RESIDENTS, &identity, id, &payload).await?;
    Ok(ApiResponse::message("Resident updated successfully"))
}

async fn reassign_household(state: &AppState, identity: &Identity, id: i64, payload: &Value) -> Result<(), ApiError> {
    let values = prepare(HOUSEHOLD_ONLY, &[], payload)?;
    crud::check_guards(&state.db, RESIDENTS.guards, HOUSEHOLD_ONLY, &values).await?;

    sqlx::query("UPDATE residents SET household_id = $1 WHERE resident_id = $2 RETURNING resident_id")
        .bind(values[0].as_i64())
        .bind(id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| ApiError::not_found(RESIDENTS.not_found()))?;

    let label = resolve_label(&state.db, &RESIDENTS.label, RESIDENTS.entity_type, id).await;
    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Updated, RESIDENTS.entity_type, id, label)
                .with_remarks("Household reassigned"),
        )
        .await;
    Ok(())
}

/// DELETE /api/residents/:id - deactivate
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let (active, _) = resident_state(&state.db, id).await?;
    if !active {
        return Err(ApiError::bad_request("Resident is already inactive"));
    }

    sqlx::query("UPDATE residents SET is_active = FALSE, updated_at = NOW() WHERE resident_id = $1 AND is_active RETURNING resident_id")
        .bind(id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| ApiError::bad_request("Resident is already inactive"))?;

    let label = resolve_label(&state.db, &RESIDENTS.label, RESIDENTS.entity_type, id).await;
    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Deleted, RESIDENTS.entity_type, id, label)
                .with_remarks("Resident deactivated"),
        )
        .await;
    Ok(ApiResponse::message("Resident deleted successfully"))
}

const RESTORE_SQL: &str = concat!(
    "UPDATE residents r SET is_active = TRUE, updated_at = NOW() \
     WHERE r.resident_id = ANY($1) AND NOT r.is_active \
     AND NOT EXISTS (SELECT 1 FROM death_records d WHERE d.resident_id = r.resident_id) \
     RETURNING r.resident_id, ",
    crate::resident_name_sql!(),
    " AS label"
);

/// Reactivate every eligible resident in `ids`; returns (id, label) per restored row.
async fn restore_many(state: &AppState, identity: &Identity, ids: &[i64]) -> Result<Vec<(i64, String)>, ApiError> {
    let rows = sqlx::query(RESTORE_SQL).bind(ids).fetch_all(state.db.pool()).await?;

    let mut restored = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.try_get("resident_id")?;
        let label: Option<String> = row.try_get("label")?;
        let label = label.unwrap_or_else(|| crate::audit::fallback_label(RESIDENTS.entity_type, id));
        state
            .audit
            .record(ActivityEntry::new(
                Some(identity.user_id),
                AuditAction::Restored,
                RESIDENTS.entity_type,
                id,
                label.clone(),
            ))
            .await;
        restored.push((id, label));
    }
    Ok(restored)
}

/// POST /api/residents/:id/restore
pub async fn restore(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let (active, deceased) = resident_state(&state.db, id).await?;
    if active {
        return Err(ApiError::bad_request("Resident is already active"));
    }
    if deceased {
        return Err(ApiError::bad_request("Cannot restore a resident with a death record"));
    }

    if restore_many(&state, &identity, &[id]).await?.is_empty() {
        return Err(ApiError::bad_request("Resident could not be restored"));
    }
    Ok(ApiResponse::message("Resident restored successfully"))
}

/// Distinct, valid ids from `{ "resident_ids": [...] }`, in request order.
fn bulk_ids(payload: &Value) -> Result<Vec<i64>, ApiError> {
    let raw = as_object(payload)?
        .get("resident_ids")
        .and_then(Value::as_array)
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::invalid_field("resident_ids", "must be a non-empty array"))?;

    let mut seen = BTreeSet::new();
    let mut ids = vec![];
    for value in raw {
        let id = coerce(FieldKind::Integer, value)
            .ok()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ApiError::invalid_field("resident_ids", "must contain resident ids"))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// POST /api/residents/restore
///
/// ```json
/// { "resident_ids": [3, 4, 9] }
/// ```
///
/// Active, deceased and unknown ids are reported under `skipped`.
pub async fn restore_bulk(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let ids = bulk_ids(&payload)?;
    let restored = restore_many(&state, &identity, &ids).await?;

    let restored_ids: Vec<i64> = restored.iter().map(|(id, _)| *id).collect();
    let skipped: Vec<i64> = ids.iter().copied().filter(|id| !restored_ids.contains(id)).collect();

    Ok(ApiResponse::success(json!({
        "restored": restored_ids,
        "restored_count": restored_ids.len(),
        "skipped": skipped,
    }))
    .with_message(format!("{} resident(s) restored", restored_ids.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_defaults_to_active() {
        assert_eq!(active_filter(None).unwrap(), Some(true));
        assert_eq!(active_filter(Some("inactive")).unwrap(), Some(false));
        assert_eq!(active_filter(Some("all")).unwrap(), None);
        assert!(active_filter(Some("deceased")).is_err());
    }

    #[test]
    fn only_a_lone_household_id_is_a_reassignment() {
        assert!(is_household_reassignment(&json!({"household_id": 5})));
        assert!(is_household_reassignment(&json!({"household_id": null})));
        assert!(!is_household_reassignment(&json!({"household_id": 5, "purok": "2"})));
        assert!(!is_household_reassignment(&json!({"first_name": "Ana"})));
    }

    #[test]
    fn gender_is_a_closed_set() {
        assert!(check_gender(&json!({"gender": "Female"})).is_ok());
        assert!(check_gender(&json!({})).is_ok());
        assert!(check_gender(&json!({"gender": "F"})).is_err());
    }

    #[test]
    fn bulk_ids_are_deduplicated_in_order() {
        assert_eq!(bulk_ids(&json!({"resident_ids": [4, "2", 4]})).unwrap(), vec![4, 2]);
        assert!(bulk_ids(&json!({"resident_ids": []})).is_err());
        assert!(bulk_ids(&json!({"resident_ids": ["x"]})).is_err());
        assert!(bulk_ids(&json!({})).is_err());
    }

    #[test]
    fn restore_skips_deceased_residents() {
        assert!(RESTORE_SQL.contains("NOT EXISTS (SELECT 1 FROM death_records d"));
        assert!(RESTORE_SQL.contains("ANY($1)"));
    }
}
