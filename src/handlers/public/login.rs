// handlers/public/login.rs - POST /api/auth/login
//
// Token acquisition. An unknown username and a wrong password produce the
// same 401; the inactive check only runs after the password verified.

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};
use sqlx::Row;

use crate::audit::ActivityEntry;
use crate::auth::{issue_token, verify_password, Claims};
use crate::error::ApiError;
use crate::handlers::protected::users::with_position;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::fields::{as_object, require};
use crate::state::AppState;
use crate::types::{AuditAction, Role};

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const ACCOUNT_INACTIVE: &str = "Account is deactivated. Please contact the administrator.";

fn credentials(payload: &Value) -> Result<(&str, &str), ApiError> {
    let object: &Map<String, Value> = as_object(payload)?;
    require(object, &["username", "password"])?;
    let username = object.get("username").and_then(Value::as_str).map(str::trim).unwrap_or_default();
    let password = object.get("password").and_then(Value::as_str).unwrap_or_default();
    Ok((username, password))
}

/// POST /api/auth/login
///
/// ```json
/// { "username": "secretary", "password": "..." }
/// ```
///
/// Returns `{ token, user }` where `user` carries `position` and `dashboard_url`.
pub async fn login(State(state): State<AppState>, Json(payload): Json<Value>) -> ApiResult<Value> {
    let (username, password) = credentials(&payload)?;

    let row = sqlx::query(
        "SELECT user_id, username, password_hash, full_name, email, role, photo_url, is_active \
         FROM users WHERE LOWER(username) = LOWER($1)",
    )
    .bind(username)
    .fetch_optional(state.db.pool())
    .await?;

    let Some(row) = row else {
        tracing::debug!("Login rejected for unknown user '{}'", username);
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };
    let stored_hash: String = row.try_get("password_hash")?;
    if !verify_password(password, &stored_hash) {
        tracing::debug!("Login rejected for '{}': bad password", username);
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }
    if !row.try_get::<bool, _>("is_active")? {
        return Err(ApiError::forbidden(ACCOUNT_INACTIVE));
    }

    let user_id: i64 = row.try_get("user_id")?;
    let username: String = row.try_get("username")?;
    let role = Role::parse(&row.try_get::<String, _>("role")?);

    let claims = Claims::new(user_id, username.clone(), &role, state.config.security.jwt_expiry_hours);
    let token = issue_token(&state.config.security, &claims)?;

    state
        .audit
        .record(ActivityEntry::new(Some(user_id), AuditAction::Login, "user", user_id, username.clone()))
        .await;
    tracing::info!("User '{}' logged in as {}", username, role);

    let user = with_position(json!({
        "user_id": user_id,
        "username": username,
        "full_name": row.try_get::<String, _>("full_name")?,
        "email": row.try_get::<Option<String>, _>("email")?,
        "role": role.as_str(),
        "photo_url": row.try_get::<Option<String>, _>("photo_url")?,
    }));

    Ok(ApiResponse::success(json!({
        "token": token,
        "expires_in": state.config.security.jwt_expiry_hours * 3600,
        "user": user,
    }))
    .with_message("Login successful"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_credentials_are_required() {
        assert_eq!(credentials(&json!({"username": " sec ", "password": "pw"})).unwrap(), ("sec", "pw"));
        assert_eq!(
            credentials(&json!({"username": "sec"})).unwrap_err().message(),
            "Missing required fields: password"
        );
        assert!(credentials(&json!(["sec", "pw"])).is_err());
    }
}
