// handlers/protected/users.rs - /api/users account management
//
// Captain and admin manage every account. Everyone else may only edit their
// own profile and can never change a role or the active flag.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::audit::ActivityEntry;
use crate::auth::{hash_password, Identity};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::USERS;
use crate::registry::crud::{self, Created};
use crate::registry::fields::{as_object, coerce, require, FieldKind};
use crate::state::AppState;
use crate::types::{AuditAction, Role};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Adds the role-derived `position` and `dashboard_url` to a user row.
pub fn with_position(mut user: Value) -> Value {
    if let Value::Object(map) = &mut user {
        let role = Role::parse(map.get("role").and_then(Value::as_str).unwrap_or_default());
        map.insert("position".to_string(), Value::from(role.position_label()));
        map.insert("dashboard_url".to_string(), Value::from(role.dashboard_url()));
    }
    user
}

fn text_of(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn known_role(raw: &str) -> Result<Role, ApiError> {
    match Role::parse(raw) {
        Role::Other(_) => Err(ApiError::invalid_field("role", format!("unknown role '{}'", raw))),
        role => Ok(role),
    }
}

fn password_hash_of(object: &Map<String, Value>) -> Result<Option<String>, ApiError> {
    let Some(password) = object.get("password").and_then(Value::as_str).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_field(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(Some(hash_password(password)?))
}

async fn ensure_username_free(pool: &PgPool, username: &str, except: Option<i64>) -> Result<(), ApiError> {
    let taken: bool = sqlx::query(
        "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) AND user_id <> COALESCE($2, 0)) AS taken",
    )
    .bind(username)
    .bind(except)
    .fetch_one(pool)
    .await?
    .try_get("taken")?;
    if taken {
        return Err(ApiError::conflict("Username already exists"));
    }
    Ok(())
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let rows: Vec<Value> = crud::list(&state.db, &USERS, &params)
        .await?
        .into_iter()
        .map(with_position)
        .collect();
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_field("count", count))
}

/// GET /api/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    Ok(ApiResponse::success(with_position(crud::get(&state.db, &USERS, id).await?)))
}

/// POST /api/users - captain and admin only
///
/// Required: `username`, `password`, `full_name`, `role`.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    if !identity.role.is_administrative() {
        return Err(ApiError::forbidden("Only administrators can create accounts"));
    }
    let object = as_object(&payload)?;
    require(object, &["username", "password", "full_name", "role"])?;

    let username = text_of(object, "username").unwrap_or_default();
    let role = known_role(&text_of(object, "role").unwrap_or_default())?;
    let password_hash = password_hash_of(object)?.ok_or_else(|| ApiError::missing_fields(&["password"]))?;
    ensure_username_free(state.db.pool(), &username, None).await?;

    let id: i64 = sqlx::query(
        "INSERT INTO users (username, password_hash, full_name, email, role, photo_url) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING user_id",
    )
    .bind(&username)
    .bind(&password_hash)
    .bind(text_of(object, "full_name"))
    .bind(text_of(object, "email"))
    .bind(role.as_str())
    .bind(text_of(object, "photo_url"))
    .fetch_one(state.db.pool())
    .await?
    .try_get(0)?;

    state
        .audit
        .record(ActivityEntry::new(Some(identity.user_id), AuditAction::Created, USERS.entity_type, id, username))
        .await;

    let created = Created { id, reference: None };
    Ok(ApiResponse::success(crud::created_body(&USERS, &created)).with_message("User created successfully"))
}

/// PUT /api/users/:id
///
/// Profile fields are replaced; `password`, `role` and `is_active` change only
/// when present.
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let administrative = identity.role.is_administrative();
    if identity.user_id != id && !administrative {
        return Err(ApiError::forbidden("You can only edit your own profile"));
    }

    let object = as_object(&payload)?;
    require(object, USERS.required)?;

    let current = sqlx::query("SELECT role, is_active FROM users WHERE user_id = $1")
        .bind(id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| ApiError::not_found(USERS.not_found()))?;
    let current_role: String = current.try_get("role")?;
    let current_active: bool = current.try_get("is_active")?;

    let role = match text_of(object, "role") {
        Some(raw) => Some(known_role(&raw)?),
        None => None,
    };
    let is_active = match object.get("is_active") {
        Some(raw) => coerce(FieldKind::Boolean, raw)
            .map_err(|reason| ApiError::invalid_field("is_active", reason))?
            .as_bool(),
        None => None,
    };
    let role_changes = role.as_ref().map_or(false, |r| r.as_str() != current_role);
    let active_changes = is_active.map_or(false, |a| a != current_active);
    if (role_changes || active_changes) && !administrative {
        return Err(ApiError::forbidden("Only administrators can change roles or account status"));
    }

    let username = text_of(object, "username").unwrap_or_default();
    ensure_username_free(state.db.pool(), &username, Some(id)).await?;
    let password_hash = password_hash_of(object)?;

    sqlx::query(
        "UPDATE users SET username = $1, full_name = $2, email = $3, photo_url = $4, \
         role = COALESCE($5, role), is_active = COALESCE($6, is_active), \
         password_hash = COALESCE($7, password_hash), updated_at = NOW() \
         WHERE user_id = $8",
    )
    .bind(&username)
    .bind(text_of(object, "full_name"))
    .bind(text_of(object, "email"))
    .bind(text_of(object, "photo_url"))
    .bind(role.as_ref().map(|r| r.as_str().to_string()))
    .bind(is_active)
    .bind(password_hash)
    .bind(id)
    .execute(state.db.pool())
    .await?;

    let mut entry = ActivityEntry::new(Some(identity.user_id), AuditAction::Updated, USERS.entity_type, id, username);
    if role_changes {
        entry = entry.with_remarks(format!("Role changed from {} to {}", current_role, role.map(String::from).unwrap_or_default()));
    }
    state.audit.record(entry).await;

    Ok(ApiResponse::message("User updated successfully"))
}

/// DELETE /api/users/:id - captain and admin only, never one's own account
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    if identity.user_id == id {
        return Err(ApiError::forbidden("You cannot delete your own account"));
    }
    if !identity.role.is_administrative() {
        return Err(ApiError::forbidden("Only administrators can delete accounts"));
    }
    crud::delete(&state, &USERS, &identity, id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}
