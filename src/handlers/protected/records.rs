// handlers/protected/records.rs - generic CRUD routes for one EntityDef

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::{crud, EntityDef};
use crate::state::AppState;

type St = State<AppState>;
type Caller = Extension<Identity>;
type Id = Path<i64>;
type Body = Json<Value>;
type Params = Query<HashMap<String, String>>;

/// `GET/POST /api/{path}`, `GET/PUT/DELETE /api/{path}/:id`, and
/// `PATCH /api/{path}/:id/status` when the entity has a status set.
pub fn routes(def: &'static EntityDef) -> Router<AppState> {
    let collection = format!("/api/{}", def.path);
    let member = format!("/api/{}/:id", def.path);

    let mut router = Router::new()
        .route(
            &collection,
            get(move |state: St, params: Params| list(def, state, params))
                .post(move |state: St, caller: Caller, body: Body| create(def, state, caller, body)),
        )
        .route(
            &member,
            get(move |state: St, id: Id| show(def, state, id))
                .put(move |state: St, caller: Caller, id: Id, body: Body| update(def, state, caller, id, body))
                .delete(move |state: St, caller: Caller, id: Id| delete(def, state, caller, id)),
        );

    if def.statuses.is_some() {
        router = router.route(
            &format!("{}/status", member),
            patch(move |state: St, caller: Caller, id: Id, body: Body| set_status(def, state, caller, id, body)),
        );
    }
    router
}

/// GET /api/{path} - filtered list, capped at the entity's list limit
pub async fn list(
    def: &'static EntityDef,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let rows = crud::list(&state.db, def, &params).await?;
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_field("count", count))
}

/// GET /api/{path}/:id
pub async fn show(def: &'static EntityDef, State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    Ok(ApiResponse::success(crud::get(&state.db, def, id).await?))
}

/// POST /api/{path}
///
/// ```json
/// { "success": true, "message": "Complaint created successfully",
///   "data": { "id": 12, "complaint_id": 12, "complaint_number": "CMP-2025-0012" } }
/// ```
pub async fn create(
    def: &'static EntityDef,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let created = crud::create(&state, def, &identity, &payload).await?;
    Ok(ApiResponse::success(crud::created_body(def, &created))
        .with_message(format!("{} created successfully", def.display)))
}

/// PUT /api/{path}/:id - full replace
pub async fn update(
    def: &'static EntityDef,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    crud::update(&state, def, &identity, id, &payload).await?;
    Ok(ApiResponse::message(format!("{} updated successfully", def.display)))
}

/// DELETE /api/{path}/:id
pub async fn delete(
    def: &'static EntityDef,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    crud::delete(&state, def, &identity, id).await?;
    Ok(ApiResponse::message(format!("{} deleted successfully", def.display)))
}

/// PATCH /api/{path}/:id/status
pub async fn set_status(
    def: &'static EntityDef,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let status = crud::set_status(&state, def, &identity, id, &payload).await?;
    Ok(ApiResponse::success(json!({ "id": id, "status": status }))
        .with_message(format!("{} status updated", def.display)))
}
