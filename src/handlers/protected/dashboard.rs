// handlers/protected/dashboard.rs - /api/dashboard/*

use axum::{extract::State, Extension};
use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use sqlx::Row;

use crate::auth::Identity;
use crate::database::Database;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::activity;

type Counter = (&'static str, &'static str);

const OVERVIEW: &[Counter] = &[
    ("total_residents", "SELECT COUNT(*) AS count FROM residents WHERE is_active"),
    ("male_residents", "SELECT COUNT(*) AS count FROM residents WHERE is_active AND gender = 'Male'"),
    ("female_residents", "SELECT COUNT(*) AS count FROM residents WHERE is_active AND gender = 'Female'"),
    ("senior_citizens", "SELECT COUNT(*) AS count FROM residents WHERE is_active AND is_senior_citizen"),
    ("pwd", "SELECT COUNT(*) AS count FROM residents WHERE is_active AND is_pwd"),
    ("four_ps", "SELECT COUNT(*) AS count FROM residents WHERE is_active AND is_4ps"),
    ("registered_voters", "SELECT COUNT(*) AS count FROM residents WHERE is_active AND is_registered_voter"),
    ("total_households", "SELECT COUNT(*) AS count FROM households"),
    (
        "deaths_this_year",
        "SELECT COUNT(*) AS count FROM death_records \
         WHERE EXTRACT(YEAR FROM date_of_death) = EXTRACT(YEAR FROM CURRENT_DATE)",
    ),
    ("pending_requests", "SELECT COUNT(*) AS count FROM certificate_requests WHERE status = 'pending'"),
    (
        "open_complaints",
        "SELECT COUNT(*) AS count FROM complaints WHERE status NOT IN ('resolved', 'dismissed')",
    ),
    ("blotter_records", "SELECT COUNT(*) AS count FROM blotter_records"),
    ("upcoming_events", "SELECT COUNT(*) AS count FROM events WHERE event_date >= CURRENT_DATE"),
];

const SECRETARY: &[Counter] = &[
    ("total_residents", "SELECT COUNT(*) AS count FROM residents WHERE is_active"),
    ("total_households", "SELECT COUNT(*) AS count FROM households"),
    ("pending_requests", "SELECT COUNT(*) AS count FROM certificate_requests WHERE status = 'pending'"),
    (
        "requests_today",
        "SELECT COUNT(*) AS count FROM certificate_requests WHERE request_date >= CURRENT_DATE",
    ),
    ("visitors_today", "SELECT COUNT(*) AS count FROM logbook_visits WHERE visit_date = CURRENT_DATE"),
    (
        "open_complaints",
        "SELECT COUNT(*) AS count FROM complaints WHERE status NOT IN ('resolved', 'dismissed')",
    ),
];

const RECENT_ACTIVITY_LIMIT: i64 = 10;

/// Run every counter concurrently on the pool.
async fn counts(db: &Database, counters: &[Counter]) -> Result<Map<String, Value>, ApiError> {
    let pending = counters.iter().map(|(key, sql)| async move {
        let count: i64 = sqlx::query(sql).fetch_one(db.pool()).await?.try_get("count")?;
        Ok::<_, ApiError>((*key, count))
    });
    Ok(try_join_all(pending)
        .await?
        .into_iter()
        .map(|(key, count)| (key.to_string(), Value::from(count)))
        .collect())
}

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Map<String, Value>> {
    Ok(ApiResponse::success(counts(&state.db, OVERVIEW).await?))
}

/// GET /api/dashboard/secretary - counters plus the caller's visible recent activity
pub async fn secretary(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Value> {
    let (counters, recent) = tokio::try_join!(
        counts(&state.db, SECRETARY),
        activity::recent(&state.db, &identity, RECENT_ACTIVITY_LIMIT),
    )?;
    Ok(ApiResponse::success(json!({
        "stats": counters,
        "recent_activity": recent,
    })))
}
