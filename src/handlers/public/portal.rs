// handlers/public/portal.rs - /api/public/*
//
// Read-only public records and the walk-in certificate intake. Nothing here
// sees a credential, so responses stay limited to what a notice board shows.

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use crate::database::{SelectQuery, SortDirection};
use crate::error::ApiError;
use crate::handlers::protected::officials;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::fields::{as_object, parse_date, require};
use crate::services::certificates;
use crate::state::AppState;

const VERIFY_FIELDS: &[&str] = &["first_name", "last_name", "date_of_birth"];

/// GET /api/public/officials - officials serving today, by position rank
pub async fn officials(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    Ok(ApiResponse::success(officials::current_roster(&state.db).await?))
}

/// GET /api/public/projects - projects flagged public
pub async fn projects(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    let mut query = SelectQuery::new(
        "p.project_id, p.title, p.description, p.budget, p.start_date, p.end_date, p.status",
        "projects p",
    );
    query
        .eq("p.is_public", true)
        .order_by("p.start_date", SortDirection::Desc);
    Ok(ApiResponse::success(state.db.fetch_json(&query.to_json_sql()).await?))
}

fn text<'a>(object: &'a Map<String, Value>, key: &str) -> &'a str {
    object.get(key).and_then(Value::as_str).map(str::trim).unwrap_or_default()
}

fn verify_query(payload: &Value) -> Result<SelectQuery, ApiError> {
    let object = as_object(payload)?;
    require(object, VERIFY_FIELDS)?;
    let birth = parse_date(text(object, "date_of_birth"))
        .ok_or_else(|| ApiError::invalid_field("date_of_birth", "expected YYYY-MM-DD"))?;

    let mut query = SelectQuery::new(
        "r.resident_id, CONCAT_WS(' ', r.first_name, r.last_name) AS full_name, r.purok",
        "residents r",
    );
    for column in ["first_name", "last_name"] {
        let p = query.param(text(object, column), None);
        query.condition(format!("LOWER(r.{}) = LOWER({})", column, p));
    }
    query
        .eq_cast("r.date_of_birth", birth.to_string(), "date")
        .eq("r.is_active", true)
        .limit(1);
    Ok(query)
}

/// POST /api/public/residents/verify
///
/// ```json
/// { "first_name": "Juan", "last_name": "Dela Cruz", "date_of_birth": "1990-04-01" }
/// ```
///
/// Confirms an active resident exists, returning only id, name and purok.
pub async fn verify_resident(State(state): State<AppState>, Json(payload): Json<Value>) -> ApiResult<Value> {
    let query = verify_query(&payload)?;
    let resident = state
        .db
        .fetch_json_optional(&query.to_json_sql())
        .await?
        .ok_or_else(|| ApiError::not_found("No matching resident found"))?;
    Ok(ApiResponse::success(json!({ "verified": true, "resident": resident })))
}

/// POST /api/public/requests - anonymous certificate intake
pub async fn submit_request(State(state): State<AppState>, Json(payload): Json<Value>) -> ApiResult<Value> {
    let id = certificates::submit(&state, None, &payload).await?;
    Ok(ApiResponse::success(json!({ "id": id, "request_id": id }))
        .with_message("Certificate request submitted successfully"))
}
