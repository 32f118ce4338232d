// handlers/protected/notifications.rs - /api/notifications/*

use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::fields::{as_object, coerce, require, FieldKind};
use crate::services::notifications::{self, NotificationCounts, NotificationSource, SOURCES};
use crate::state::AppState;

fn source_of(payload: &Value) -> Result<&'static NotificationSource, ApiError> {
    let object = as_object(payload)?;
    require(object, &["entity_type"])?;
    let entity_type = object.get("entity_type").and_then(Value::as_str).unwrap_or_default();
    notifications::source_for(entity_type.trim()).ok_or_else(|| {
        let known: Vec<&str> = SOURCES.iter().map(|s| s.entity_type).collect();
        ApiError::invalid_field("entity_type", format!("must be one of: {}", known.join(", ")))
    })
}

/// GET /api/notifications/counts - unseen items per badge, plus `total`
pub async fn counts(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<NotificationCounts> {
    Ok(ApiResponse::success(notifications::unseen_counts(&state.db, identity.user_id).await?))
}

/// POST /api/notifications/viewed
///
/// ```json
/// { "entity_type": "complaint", "entity_id": 12 }
/// ```
pub async fn viewed(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let source = source_of(&payload)?;
    require(as_object(&payload)?, &["entity_id"])?;
    let entity_id = coerce(FieldKind::Integer, &payload["entity_id"])
        .map_err(|reason| ApiError::invalid_field("entity_id", reason))?
        .as_i64()
        .ok_or_else(|| ApiError::missing_fields(&["entity_id"]))?;

    notifications::mark_viewed(&state.db, identity.user_id, source.entity_type, entity_id).await?;
    Ok(ApiResponse::message("Notification marked as viewed"))
}

/// POST /api/notifications/viewed-all - `{ "entity_type": ... }`
pub async fn viewed_all(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let source = source_of(&payload)?;
    let marked = notifications::mark_all_viewed(&state.db, identity.user_id, source).await?;
    Ok(ApiResponse::success(json!({ "entity_type": source.entity_type, "marked": marked }))
        .with_message("Notifications marked as viewed"))
}
