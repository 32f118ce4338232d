// handlers/protected/reports.rs - /api/reports/*
//
// Every report takes `date_from`, `date_to` and `purok`, and echoes them back
// under `filters` with a `generated_at` timestamp. No pagination.

use axum::extract::{Query, State};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::Row;
use std::collections::HashMap;

use crate::database::{bind_params, SelectQuery, SortDirection};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::catalog::{HOUSEHOLDS, RESIDENTS};
use crate::services::age_bands::{distribute, AgeDistribution};
use crate::state::AppState;

/// Resident report categories and the flag each one selects.
const CATEGORIES: &[(&str, Option<&str>)] = &[
    ("senior", Some("r.is_senior_citizen")),
    ("pwd", Some("r.is_pwd")),
    ("4ps", Some("r.is_4ps")),
    ("voter", Some("r.is_registered_voter")),
    ("all", None),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportFilters {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub purok: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ReportFilters {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            date_from: get("date_from"),
            date_to: get("date_to"),
            purok: get("purok"),
            category: get("category"),
        }
    }

    /// Shared predicates: purok equality and an inclusive date range.
    pub fn apply(&self, query: &mut SelectQuery, purok_column: &str, date_column: &str) {
        query
            .eq_opt(purok_column, self.purok.clone())
            .date_range(date_column, self.date_from.as_deref(), self.date_to.as_deref());
    }
}

fn report<T: Serialize>(data: T, filters: &ReportFilters) -> ApiResult<T> {
    Ok(ApiResponse::success(data)
        .with_field("filters", filters)
        .with_field("generated_at", Utc::now().to_rfc3339()))
}

fn category_flag(raw: Option<&str>) -> Result<Option<&'static str>, ApiError> {
    let raw = raw.unwrap_or("all");
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, flag)| *flag)
        .ok_or_else(|| ApiError::invalid_field("category", "must be one of: senior, pwd, 4ps, voter, all"))
}

/// GET /api/reports/age-distribution - active residents by age band and gender
pub async fn age_distribution(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<AgeDistribution> {
    let filters = ReportFilters::from_params(&params);

    let mut query = SelectQuery::new(
        "(EXTRACT(YEAR FROM AGE(CURRENT_DATE, r.date_of_birth)) * 12 \
         + EXTRACT(MONTH FROM AGE(CURRENT_DATE, r.date_of_birth)))::bigint AS months, r.gender",
        "residents r",
    );
    query.eq("r.is_active", true);
    filters.apply(&mut query, "r.purok", "r.created_at");

    let sql = query.to_sql();
    let rows = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_all(state.db.pool())
        .await?;
    let mut samples = Vec::with_capacity(rows.len());
    for row in &rows {
        let months: i64 = row.try_get("months")?;
        let gender: String = row.try_get("gender")?;
        samples.push((months, gender));
    }

    let distribution = distribute(samples.iter().map(|(m, g)| (*m, g.as_str())));
    report(distribution, &filters)
}

/// GET /api/reports/residents?category=senior|pwd|4ps|voter|all
pub async fn residents(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let mut filters = ReportFilters::from_params(&params);
    let flag = category_flag(filters.category.as_deref())?;
    filters.category.get_or_insert_with(|| "all".to_string());

    let mut query = SelectQuery::new(RESIDENTS.select, RESIDENTS.from);
    query.eq("r.is_active", true);
    if let Some(flag) = flag {
        query.condition(flag);
    }
    filters.apply(&mut query, "r.purok", "r.created_at");
    query
        .order_by("r.purok", SortDirection::Asc)
        .order_by("r.last_name", SortDirection::Asc)
        .order_by("r.first_name", SortDirection::Asc);

    report(state.db.fetch_json(&query.to_json_sql()).await?, &filters)
}

/// GET /api/reports/households - with head and active member count
pub async fn households(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let filters = ReportFilters::from_params(&params);

    let mut query = SelectQuery::new(HOUSEHOLDS.select, HOUSEHOLDS.from);
    filters.apply(&mut query, "h.purok", "h.created_at");
    query.order_by("h.household_number", SortDirection::Asc);

    report(state.db.fetch_json(&query.to_json_sql()).await?, &filters)
}

/// GET /api/reports/complaints - counts by status plus the matching complaints
pub async fn complaints(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Value> {
    let filters = ReportFilters::from_params(&params);
    const FROM: &str = "complaints c \
        LEFT JOIN residents r ON r.resident_id = c.complainant_resident_id \
        LEFT JOIN complaint_categories cc ON cc.category_id = c.category_id";

    let mut summary = SelectQuery::new("c.status, COUNT(*) AS count", FROM);
    filters.apply(&mut summary, "r.purok", "c.created_at");
    summary.group_by("c.status").order_by("count", SortDirection::Desc);

    let mut detail = SelectQuery::new(
        "c.complaint_id, c.complaint_number, c.complainant_name, c.respondent_name, c.status, \
         c.incident_date, c.created_at, cc.name AS category_name, r.purok",
        FROM,
    );
    filters.apply(&mut detail, "r.purok", "c.created_at");
    detail.order_by("c.created_at", SortDirection::Desc);

    let summary_sql = summary.to_json_sql();
    let detail_sql = detail.to_json_sql();
    let (summary, detail) = tokio::try_join!(
        state.db.fetch_json(&summary_sql),
        state.db.fetch_json(&detail_sql),
    )?;
    let total: i64 = summary.iter().filter_map(|row| row["count"].as_i64()).sum();

    report(
        json!({ "summary": summary, "total": total, "complaints": detail }),
        &filters,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_a_closed_set() {
        assert_eq!(category_flag(Some("senior")).unwrap(), Some("r.is_senior_citizen"));
        assert_eq!(category_flag(None).unwrap(), None);
        assert!(category_flag(Some("students")).is_err());
    }

    #[test]
    fn filters_become_predicates() {
        let params: HashMap<String, String> = [("purok", "3"), ("date_from", "2025-01-01"), ("date_to", " ")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let filters = ReportFilters::from_params(&params);
        assert_eq!(filters.date_to, None);

        let mut q = SelectQuery::new("r.*", "residents r");
        filters.apply(&mut q, "r.purok", "r.created_at");
        let sql = q.to_sql();
        assert!(sql.query.contains("r.purok = $1 AND r.created_at >= $2::date"));
        assert_eq!(sql.params.len(), 2);
    }
}
