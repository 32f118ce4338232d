// handlers/protected/activity.rs - /api/activity-logs
//
// Every read goes through the caller's visibility scope first.

use axum::{
    extract::{Query, State},
    Extension,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::Identity;
use crate::database::{Database, Pagination, SelectQuery, SortDirection};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::visibility_for;
use crate::registry::crud::apply_filters;
use crate::registry::fields::FieldKind;
use crate::registry::{filter, Filter};
use crate::state::AppState;

const FROM: &str = "activity_logs l LEFT JOIN users u ON u.user_id = l.user_id";
const SELECT: &str = "l.*, u.username, u.full_name AS user_full_name";

const FILTERS: &[Filter] = &[
    filter("action", "l.action", FieldKind::Text),
    filter("entity_type", "l.entity_type", FieldKind::Text),
    filter("user_id", "l.user_id", FieldKind::Integer),
];
const SEARCH: &[&str] = &["l.entity_identifier", "l.remarks", "u.username", "u.full_name"];

fn scoped(select: &str, identity: &Identity) -> SelectQuery {
    let mut query = SelectQuery::new(select, FROM);
    visibility_for(identity).apply(&mut query, "l");
    query
}

/// Most recent entries the caller may see.
pub async fn recent(db: &Database, identity: &Identity, limit: i64) -> Result<Vec<Value>, ApiError> {
    let mut query = scoped(SELECT, identity);
    query.order_by("l.log_time", SortDirection::Desc).limit(limit);
    Ok(db.fetch_json(&query.to_json_sql()).await?)
}

/// GET /api/activity-logs
///
/// Query: `page`, `limit`, `action`, `entity_type`, `user_id`, `search`,
/// `date_from`, `date_to`.
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let page = Pagination::new(
        params.get("page").and_then(|p| p.parse().ok()),
        params.get("limit").and_then(|l| l.parse().ok()),
        50,
    );

    let mut query = scoped(SELECT, &identity);
    apply_filters(&mut query, FILTERS, SEARCH, Some("l.log_time"), &params)?;

    let total = state.db.fetch_count(&query.to_count_sql()).await?;
    query.order_by("l.log_time", SortDirection::Desc).paginate(&page);
    let rows = state.db.fetch_json(&query.to_json_sql()).await?;

    Ok(ApiResponse::success(rows).with_field("pagination", page.info(total)))
}

async fn grouped(
    db: &Database,
    identity: &Identity,
    column: &str,
    params: &HashMap<String, String>,
) -> Result<Vec<Value>, ApiError> {
    let mut query = scoped(&format!("{} AS key, COUNT(*) AS count", column), identity);
    apply_filters(&mut query, &[], &[], Some("l.log_time"), params)?;
    query.group_by(column).order_by("count", SortDirection::Desc);
    Ok(db.fetch_json(&query.to_json_sql()).await?)
}

/// GET /api/activity-logs/stats - totals by action and by entity type
pub async fn stats(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Value> {
    let mut total = scoped("COUNT(*) AS count", &identity);
    apply_filters(&mut total, &[], &[], Some("l.log_time"), &params)?;

    let (total, by_action, by_entity_type) = tokio::try_join!(
        async { state.db.fetch_count(&total.to_count_sql()).await.map_err(ApiError::from) },
        grouped(&state.db, &identity, "l.action", &params),
        grouped(&state.db, &identity, "l.entity_type", &params),
    )?;

    Ok(ApiResponse::success(json!({
        "total": total,
        "by_action": by_action,
        "by_entity_type": by_entity_type,
    })))
}
