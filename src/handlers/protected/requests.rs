// handlers/protected/requests.rs - /api/requests and /api/certificate-types

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::Identity;
use crate::database::{SelectQuery, SortDirection};
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::REQUESTS;
use crate::registry::crud;
use crate::services::certificates;
use crate::state::AppState;

/// GET /api/requests - merged view of resident and walk-in requests
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let rows = crud::list(&state.db, &REQUESTS, &params).await?;
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_field("count", count))
}

/// GET /api/requests/:id
///
/// Walk-in requests read name, contact, email and address from their detail
/// row; resident requests read them from the resident.
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    Ok(ApiResponse::success(crud::get(&state.db, &REQUESTS, id).await?))
}

/// POST /api/requests
///
/// ```json
/// { "requester_type": "non-resident", "cert_type_id": 1, "purpose": "Employment",
///   "requester_name": "Juan Dela Cruz", "contact_number": "0917...",
///   "email": "juan@example.ph", "address": "Purok 3" }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let request_id = certificates::submit(&state, Some(&identity), &payload).await?;
    Ok(ApiResponse::success(json!({ "id": request_id, "request_id": request_id }))
        .with_message("Certificate request submitted successfully"))
}

/// PATCH /api/requests/:id/status
///
/// Body: `status`, optional `rejection_reason`, optional `pickup_date`.
/// `email_sent` reports whether the requester notification went out.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<certificates::StatusOutcome> {
    let outcome = certificates::change_status(&state, &identity, id, &payload).await?;
    Ok(ApiResponse::success(outcome).with_message("Request status updated successfully"))
}

/// DELETE /api/requests/:id - the walk-in detail row goes with it
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    crud::delete(&state, &REQUESTS, &identity, id).await?;
    Ok(ApiResponse::message("Certificate request deleted successfully"))
}

/// GET /api/certificate-types
pub async fn certificate_types(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    let mut query = SelectQuery::new("ct.*", "certificate_types ct");
    query.order_by("ct.name", SortDirection::Asc);
    Ok(ApiResponse::success(state.db.fetch_json(&query.to_json_sql()).await?))
}
