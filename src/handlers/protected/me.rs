// handlers/protected/me.rs - GET /api/auth/me

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::USERS;
use crate::registry::crud;
use crate::state::AppState;

use super::users::with_position;

/// GET /api/auth/me - the caller's account, re-read from storage
pub async fn me(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Value> {
    let user = crud::get(&state.db, &USERS, identity.user_id).await?;
    Ok(ApiResponse::success(with_position(user)))
}
