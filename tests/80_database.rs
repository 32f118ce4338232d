mod common;

// Runs against TEST_DATABASE_URL (a disposable PostgreSQL database); every
// test returns early when it is unset. Rows are made unique per run so the
// database does not need to be empty.

use anyhow::{Context, Result};
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use sqlx::Row;

use barangay_api::audit::{fallback_label, resolve_label, LabelQuery, MemorySink};
use barangay_api::registry::catalog::ANNOUNCEMENTS;
use barangay_api::types::AuditAction;
use common::TestApp;

async fn create_resident(app: &TestApp, token: &str, last_name: &str) -> Result<i64> {
    let (status, body) = common::send(
        app,
        Method::POST,
        "/api/residents",
        Some(token),
        Some(json!({
            "first_name": "Ana",
            "last_name": last_name,
            "date_of_birth": "1990-01-01",
            "gender": "Female",
            "civil_status": "Single",
            "purok": "1",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["resident_id"].as_i64().context("resident_id in create response")
}

fn audit_count(app: &TestApp, action: AuditAction, entity_type: &str, id: i64) -> usize {
    app.audit
        .entries()
        .iter()
        .filter(|e| e.action == action && e.entity_type == entity_type && e.entity_id == Some(id))
        .count()
}

#[tokio::test]
async fn created_resident_is_listed_and_audited() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let captain = common::seed_user(&app, "barangay_captain").await?;
    let token = common::token(&app, captain, "barangay_captain");
    let last_name = common::unique("Cruz");

    let id = create_resident(&app, &token, &last_name).await?;

    let (status, body) =
        common::send(&app, Method::GET, &format!("/api/residents?search={}", last_name), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&Value> = body["data"]
        .as_array()
        .context("data array")?
        .iter()
        .filter(|r| r["resident_id"].as_i64() == Some(id))
        .collect();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["is_active"], true);
    assert_eq!(body["pagination"]["total"], 1);

    assert_eq!(audit_count(&app, AuditAction::Created, "resident", id), 1);
    Ok(())
}

#[tokio::test]
async fn every_write_leaves_exactly_one_audit_entry() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");

    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/announcements",
        Some(&token),
        Some(json!({ "title": common::unique("Cleanup drive"), "content": "Saturday 7AM" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let id = body["data"]["id"].as_i64().context("id")?;

    let (status, _) = common::send(
        &app,
        Method::PUT,
        &format!("/api/announcements/{}", id),
        Some(&token),
        Some(json!({ "title": "Cleanup drive (moved)", "content": "Sunday 7AM", "is_published": "1" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::send(&app, Method::DELETE, &format!("/api/announcements/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    for action in [AuditAction::Created, AuditAction::Updated, AuditAction::Deleted] {
        assert_eq!(audit_count(&app, action, "announcement", id), 1, "{}", action);
    }

    let (status, _) = common::send(&app, Method::GET, &format!("/api/announcements/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(audit_count(&app, AuditAction::Deleted, "announcement", id), 1);
    Ok(())
}

#[tokio::test]
async fn household_numbers_increase_and_never_repeat() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");

    let mut suffixes = Vec::new();
    for _ in 0..3 {
        let (status, body) =
            common::send(&app, Method::POST, "/api/households", Some(&token), Some(json!({ "purok": "2" }))).await?;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let number = body["data"]["household_number"].as_str().context("household_number")?.to_string();
        let digits = number.strip_prefix("HH").context("HH prefix")?;
        assert!(digits.len() >= 3 && digits.chars().all(|c| c.is_ascii_digit()), "{}", number);
        suffixes.push(digits.parse::<u64>()?);
    }
    assert!(suffixes.windows(2).all(|w| w[0] < w[1]), "{:?}", suffixes);

    let duplicates: i64 = sqlx::query(
        "SELECT COUNT(*) AS count FROM (SELECT household_number FROM households \
         GROUP BY household_number HAVING COUNT(*) > 1) d",
    )
    .fetch_one(app.state.db.pool())
    .await?
    .try_get("count")?;
    assert_eq!(duplicates, 0);
    Ok(())
}

#[tokio::test]
async fn household_only_update_changes_nothing_else() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");

    let (_, household) =
        common::send(&app, Method::POST, "/api/households", Some(&token), Some(json!({ "purok": "5" }))).await?;
    let household_id = household["data"]["household_id"].as_i64().context("household_id")?;
    let id = create_resident(&app, &token, &common::unique("Santos")).await?;

    let uri = format!("/api/residents/{}", id);
    let (_, before) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    let (status, body) =
        common::send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "household_id": household_id }))).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (_, after) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;

    let before = before["data"].as_object().context("before")?;
    let after = after["data"].as_object().context("after")?;
    assert_eq!(after["household_id"], household_id);
    for (key, value) in before {
        if key == "household_id" || key == "household_number" {
            continue;
        }
        assert_eq!(&after[key], value, "{} changed", key);
    }
    Ok(())
}

#[tokio::test]
async fn failed_walk_in_intake_leaves_no_rows() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let purpose = common::unique("Scholarship");

    // Longer than the detail row's email column, so the second insert fails.
    let email = format!("{}@example.ph", "a".repeat(300));
    let (status, _) = common::send(
        &app,
        Method::POST,
        "/api/public/requests",
        None,
        Some(json!({
            "requester_type": "non-resident",
            "cert_type_id": 1,
            "purpose": purpose,
            "requester_name": "Pedro Penduko",
            "contact_number": "09171234567",
            "email": email,
            "address": "Somewhere else",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let left: i64 = sqlx::query("SELECT COUNT(*) AS count FROM certificate_requests WHERE purpose = $1")
        .bind(&purpose)
        .fetch_one(app.state.db.pool())
        .await?
        .try_get("count")?;
    assert_eq!(left, 0);
    Ok(())
}

#[tokio::test]
async fn walk_in_request_view_shows_detail_row() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");
    let name = common::unique("Maria Clara");

    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/requests",
        Some(&token),
        Some(json!({
            "requester_type": "non-resident",
            "cert_type_id": 1,
            "purpose": "Employment",
            "requester_name": name,
            "contact_number": "09170000000",
            "email": "maria@example.ph",
            "address": "Purok 9, Kabilang Barangay",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let id = body["data"]["request_id"].as_i64().context("request_id")?;

    let (status, body) = common::send(&app, Method::GET, &format!("/api/requests/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    assert_eq!(view["requester_type"], "non-resident");
    assert_eq!(view["requester_name"], name.as_str());
    assert_eq!(view["contact_number"], "09170000000");
    assert_eq!(view["email"], "maria@example.ph");
    assert_eq!(view["address"], "Purok 9, Kabilang Barangay");
    assert!(view["resident_id"].is_null());

    let details: i64 = sqlx::query("SELECT COUNT(*) AS count FROM public_request_details WHERE certificate_request_id = $1")
        .bind(id)
        .fetch_one(app.state.db.pool())
        .await?
        .try_get("count")?;
    assert_eq!(details, 1);
    Ok(())
}

#[tokio::test]
async fn positions_cap_overlapping_terms() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let captain = common::seed_user(&app, "barangay_captain").await?;
    let token = common::token(&app, captain, "barangay_captain");

    let position_id: i64 = sqlx::query(
        "INSERT INTO official_positions (title, max_slots, sort_order) VALUES ($1, 1, 99) RETURNING position_id",
    )
    .bind(common::unique("Tanod Chief"))
    .fetch_one(app.state.db.pool())
    .await?
    .try_get(0)?;

    let appoint = |name: &str, start: i64, end: i64| {
        json!({ "full_name": name, "position_id": position_id, "term_start": start, "term_end": end })
    };

    let (status, body) =
        common::send(&app, Method::POST, "/api/officials", Some(&token), Some(appoint("First", 2023, 2025))).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) =
        common::send(&app, Method::POST, "/api/officials", Some(&token), Some(appoint("Second", 2025, 2028))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _) =
        common::send(&app, Method::POST, "/api/officials", Some(&token), Some(appoint("Third", 2026, 2028))).await?;
    assert_eq!(status, StatusCode::OK);

    let seated: i64 = sqlx::query("SELECT COUNT(*) AS count FROM officials WHERE position_id = $1")
        .bind(position_id)
        .fetch_one(app.state.db.pool())
        .await?
        .try_get("count")?;
    assert_eq!(seated, 2);

    // The position is full for this term, but the official does not exist.
    let (status, body) = common::send(
        &app,
        Method::PUT,
        &format!("/api/officials/{}", i64::MAX),
        Some(&token),
        Some(appoint("Nobody", 2023, 2025)),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
    Ok(())
}

#[tokio::test]
async fn deactivation_death_and_restore_rules() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");
    let id = create_resident(&app, &token, &common::unique("Reyes")).await?;
    let uri = format!("/api/residents/{}", id);

    let (status, _) = common::send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = common::send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = common::send(&app, Method::POST, &format!("{}/restore", uri), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(audit_count(&app, AuditAction::Restored, "resident", id), 1);

    let death = json!({ "resident_id": id, "date_of_death": "2025-03-01", "cause_of_death": "Natural causes" });
    let (status, body) = common::send(&app, Method::POST, "/api/deaths", Some(&token), Some(death.clone())).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (_, body) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(body["data"]["is_active"], false);

    let (status, _) = common::send(&app, Method::POST, "/api/deaths", Some(&token), Some(death)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = common::send(&app, Method::POST, &format!("{}/restore", uri), Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot restore a resident with a death record");
    Ok(())
}

async fn count_where(app: &TestApp, sql: &str, id: i64) -> Result<i64> {
    Ok(sqlx::query(sql).bind(id).fetch_one(app.state.db.pool()).await?.try_get("count")?)
}

#[tokio::test]
async fn writes_succeed_when_the_audit_sink_fails() -> Result<()> {
    let Some(app) = common::database_app_with(MemorySink::failing()).await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");

    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/announcements",
        Some(&token),
        Some(json!({ "title": common::unique("Water interruption"), "content": "Purok 2, 1PM-5PM" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_i64().context("id")?;

    let (status, body) = common::send(
        &app,
        Method::PUT,
        &format!("/api/announcements/{}", id),
        Some(&token),
        Some(json!({ "title": "Water interruption (cancelled)", "content": "No interruption" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let title: String = sqlx::query("SELECT title FROM announcements WHERE announcement_id = $1")
        .bind(id)
        .fetch_one(app.state.db.pool())
        .await?
        .try_get("title")?;
    assert_eq!(title, "Water interruption (cancelled)");

    let (status, _) = common::send(&app, Method::DELETE, &format!("/api/announcements/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let left = count_where(&app, "SELECT COUNT(*) AS count FROM announcements WHERE announcement_id = $1", id).await?;
    assert_eq!(left, 0);

    assert!(app.audit.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn unresolvable_labels_fall_back_to_type_and_id() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");

    let (_, body) = common::send(
        &app,
        Method::POST,
        "/api/announcements",
        Some(&token),
        Some(json!({ "title": common::unique("Clinic day"), "content": "Free checkups" })),
    )
    .await?;
    let id = body["data"]["id"].as_i64().context("id")?;

    // A blank title leaves nothing to label the row with.
    sqlx::query("UPDATE announcements SET title = '' WHERE announcement_id = $1")
        .bind(id)
        .execute(app.state.db.pool())
        .await?;
    let (status, _) = common::send(&app, Method::DELETE, &format!("/api/announcements/{}", id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let deleted: Vec<_> = app
        .audit
        .entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Deleted && e.entity_id == Some(id))
        .collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].entity_identifier, format!("announcement #{}", id));

    let db = &app.state.db;
    assert_eq!(resolve_label(db, &ANNOUNCEMENTS.label, "announcement", id).await, fallback_label("announcement", id));
    let broken = LabelQuery::new("no_such_table", "no_such_id", "name");
    assert_eq!(resolve_label(db, &broken, "event", 4).await, "event #4");
    Ok(())
}

#[tokio::test]
async fn activity_log_reads_are_scoped_by_role() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let worker = common::seed_user(&app, "barangay_health_worker").await?;
    let councilor = common::seed_user(&app, "barangay_councilor").await?;
    let secretary = common::seed_user(&app, "barangay_secretary").await?;
    let admin = common::seed_user(&app, "admin").await?;
    let marker = common::unique("scope");

    let rows: &[(i64, &str, &str, i64)] = &[
        (1, "created", "resident", secretary),
        (2, "login", "user", secretary),
        (3, "updated", "household", admin),
        (4, "deleted", "complaint", admin),
        (5, "created", "blotter", councilor),
        (6, "restored", "resident", worker),
        (7, "created", "maternal_health", worker),
        (8, "created", "certificate_request", admin),
        (9, "updated", "logbook", councilor),
        (10, "deleted", "announcement", secretary),
    ];
    for &(n, action, entity_type, actor) in rows {
        sqlx::query(
            "INSERT INTO activity_logs (user_id, action, entity_type, entity_id, entity_identifier) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(actor)
        .bind(action)
        .bind(entity_type)
        .bind(n)
        .bind(format!("{} {}", marker, n))
        .execute(app.state.db.pool())
        .await?;
    }

    let cases: [(i64, &str, Vec<i64>); 4] = [
        (worker, "barangay_health_worker", vec![1, 3, 7]),
        (councilor, "barangay_councilor", vec![4, 5, 9]),
        (secretary, "barangay_secretary", vec![1, 10]),
        (admin, "admin", vec![1, 3, 4, 5, 7, 8, 9, 10]),
    ];
    for (user_id, role, expected) in cases {
        let token = common::token(&app, user_id, role);
        let (status, body) = common::send(
            &app,
            Method::GET,
            &format!("/api/activity-logs?search={}&limit=100", marker),
            Some(&token),
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let mut seen: Vec<i64> = body["data"]
            .as_array()
            .context("data array")?
            .iter()
            .filter_map(|row| row["entity_identifier"].as_str())
            .filter_map(|label| label.strip_prefix(&format!("{} ", marker)).and_then(|n| n.parse().ok()))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, expected, "{}", role);
        assert_eq!(body["pagination"]["total"], expected.len(), "{}", role);
    }
    Ok(())
}

#[tokio::test]
async fn bulk_restore_skips_deceased_residents() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");
    let last_name = common::unique("Bautista");
    let moved = create_resident(&app, &token, &last_name).await?;
    let deceased = create_resident(&app, &token, &last_name).await?;

    let (status, _) = common::send(&app, Method::DELETE, &format!("/api/residents/{}", moved), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let death = json!({ "resident_id": deceased, "date_of_death": "2025-06-01" });
    let (status, body) = common::send(&app, Method::POST, "/api/deaths", Some(&token), Some(death)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let listed = |body: &Value| -> Vec<i64> {
        body["data"]
            .as_array()
            .map(|rows| rows.iter().filter_map(|r| r["resident_id"].as_i64()).collect())
            .unwrap_or_default()
    };
    let active_uri = format!("/api/residents?search={}", last_name);
    let (_, body) = common::send(&app, Method::GET, &active_uri, Some(&token), None).await?;
    assert!(listed(&body).is_empty());

    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/residents/restore",
        Some(&token),
        Some(json!({ "resident_ids": [moved, deceased] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["restored_count"], 1);
    assert_eq!(body["data"]["restored"], json!([moved]));
    assert_eq!(body["data"]["skipped"], json!([deceased]));

    let (_, body) = common::send(&app, Method::GET, &active_uri, Some(&token), None).await?;
    assert_eq!(listed(&body), vec![moved]);
    let (_, body) =
        common::send(&app, Method::GET, &format!("{}&status=inactive", active_uri), Some(&token), None).await?;
    assert_eq!(listed(&body), vec![deceased]);

    assert_eq!(audit_count(&app, AuditAction::Restored, "resident", moved), 1);
    assert_eq!(audit_count(&app, AuditAction::Restored, "resident", deceased), 0);
    Ok(())
}

#[tokio::test]
async fn removing_a_death_record_returns_resident_to_active() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");
    let id = create_resident(&app, &token, &common::unique("Mercado")).await?;
    let uri = format!("/api/residents/{}", id);
    let death = json!({ "resident_id": id, "date_of_death": "2025-02-14" });

    // Only an active resident can get a death record.
    let (status, _) = common::send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = common::send(&app, Method::POST, "/api/deaths", Some(&token), Some(death.clone())).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Resident is inactive");

    let (status, _) = common::send(&app, Method::POST, &format!("{}/restore", uri), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = common::send(&app, Method::POST, "/api/deaths", Some(&token), Some(death)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let death_id = body["data"]["death_id"].as_i64().context("death_id")?;

    let (status, _) = common::send(&app, Method::DELETE, &format!("/api/deaths/{}", death_id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(body["data"]["is_active"], true);
    Ok(())
}

#[tokio::test]
async fn household_edits_keep_head_id_and_name_together() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");
    let last_name = common::unique("Villanueva");
    let head = create_resident(&app, &token, &last_name).await?;

    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/households",
        Some(&token),
        Some(json!({ "purok": "4", "head_resident_id": head })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let uri = format!("/api/households/{}", body["data"]["household_id"].as_i64().context("household_id")?);

    let (status, body) = common::send(
        &app,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "purok": "6", "address": "Sitio Malinis" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    let household = &body["data"];
    assert_eq!(household["purok"], "6");
    assert_eq!(household["head_resident_id"], head);
    assert_eq!(household["head_name"], format!("Ana {}", last_name));

    let (_, body) = common::send(
        &app,
        Method::POST,
        "/api/households",
        Some(&token),
        Some(json!({ "purok": "2", "head_name": "Lola Basyang" })),
    )
    .await?;
    let uri = format!("/api/households/{}", body["data"]["household_id"].as_i64().context("household_id")?);
    let (status, _) = common::send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "purok": "3" }))).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = common::send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(body["data"]["head_name"], "Lola Basyang");
    assert!(body["data"]["head_resident_id"].is_null());
    Ok(())
}

#[tokio::test]
async fn closed_requests_keep_their_status_and_send_one_email() -> Result<()> {
    let Some(app) = common::database_app().await? else { return Ok(()) };
    let user = common::seed_user(&app, "barangay_secretary").await?;
    let token = common::token(&app, user, "barangay_secretary");
    let email = format!("{}@example.ph", common::unique("jose"));

    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/requests",
        Some(&token),
        Some(json!({
            "requester_type": "non-resident",
            "cert_type_id": 1,
            "purpose": "Bank requirement",
            "requester_name": "Jose Rizal",
            "contact_number": "09181112222",
            "email": email,
            "address": "Calamba",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let status_uri = format!("/api/requests/{}/status", body["data"]["request_id"].as_i64().context("request_id")?);

    let (status, body) =
        common::send(&app, Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": "rejected" }))).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["email_sent"], true);

    for next in ["approved", "rejected"] {
        let (status, body) =
            common::send(&app, Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": next }))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    }

    let sent = app.mailer.sent().into_iter().filter(|m| m.to == email).count();
    assert_eq!(sent, 1);
    Ok(())
}
