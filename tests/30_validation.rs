mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};

// Every request here is rejected before a connection is needed, so the
// unreachable pool behind `offline_app` is never touched.

async fn captain_call(method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let app = common::offline_app();
    let token = common::token(&app, 1, "barangay_captain");
    common::send(&app, method, uri, Some(&token), body).await
}

#[tokio::test]
async fn resident_create_names_missing_fields() -> Result<()> {
    let (status, body) = captain_call(Method::POST, "/api/residents", Some(json!({ "first_name": "Ana" }))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let message = body["message"].as_str().unwrap_or_default();
    for field in ["last_name", "date_of_birth", "gender", "civil_status", "purok"] {
        assert!(message.contains(field), "{} missing from {}", field, message);
    }
    assert!(!message.contains("first_name"));
    Ok(())
}

#[tokio::test]
async fn resident_gender_is_a_closed_set() -> Result<()> {
    let (status, body) = captain_call(
        Method::POST,
        "/api/residents",
        Some(json!({
            "first_name": "Ana", "last_name": "Cruz", "date_of_birth": "1990-01-01",
            "gender": "Unknown", "civil_status": "Single", "purok": "1",
        })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["gender"], "must be Male or Female");
    Ok(())
}

#[tokio::test]
async fn malformed_dates_are_rejected() -> Result<()> {
    let (status, body) = captain_call(
        Method::POST,
        "/api/residents",
        Some(json!({
            "first_name": "Ana", "last_name": "Cruz", "date_of_birth": "01/01/1990",
            "gender": "Female", "civil_status": "Single", "purok": "1",
        })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["date_of_birth"].is_string());
    Ok(())
}

#[tokio::test]
async fn official_terms_cannot_run_backwards() -> Result<()> {
    let (status, body) = captain_call(
        Method::POST,
        "/api/officials",
        Some(json!({ "full_name": "Jose Rizal", "position_id": 2, "term_start": 2025, "term_end": 2022 })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["term_end"], "must not be earlier than term_start");
    Ok(())
}

#[tokio::test]
async fn status_patches_accept_only_known_states() -> Result<()> {
    let (status, body) =
        captain_call(Method::PATCH, "/api/complaints/1/status", Some(json!({ "status": "archived" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap_or_default().contains("under_investigation"));

    let (status, _) = captain_call(Method::PATCH, "/api/requests/1/status", Some(json!({ "status": "lost" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = captain_call(Method::PATCH, "/api/blotter/1/status", Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields: status");
    Ok(())
}

#[tokio::test]
async fn non_resident_requests_need_contact_details() -> Result<()> {
    let app = common::offline_app();
    let (status, body) = common::send(
        &app,
        Method::POST,
        "/api/public/requests",
        None,
        Some(json!({ "requester_type": "non-resident", "cert_type_id": 1, "purpose": "Employment" })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("contact_number") && message.contains("address"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn account_management_is_gated_by_role() -> Result<()> {
    let app = common::offline_app();
    let secretary = common::token(&app, 7, "barangay_secretary");
    let admin = common::token(&app, 1, "admin");

    let (status, _) = common::send(
        &app,
        Method::POST,
        "/api/users",
        Some(&secretary),
        Some(json!({ "username": "x", "password": "secret1", "full_name": "X", "role": "admin" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::send(&app, Method::PUT, "/api/users/8", Some(&secretary), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = common::send(&app, Method::DELETE, "/api/users/1", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You cannot delete your own account");
    Ok(())
}

#[tokio::test]
async fn notification_types_and_report_categories_are_checked() -> Result<()> {
    let (status, _) = captain_call(
        Method::POST,
        "/api/notifications/viewed",
        Some(json!({ "entity_type": "resident", "entity_id": 1 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = captain_call(Method::GET, "/api/reports/residents?category=students", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["category"], "must be one of: senior, pwd, 4ps, voter, all");
    Ok(())
}

fn multipart(category: &str, filename: &str, content_type: &str, bytes: &[u8], token: &str) -> Result<Request<Body>> {
    let boundary = "XBOUNDARYX";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {c}\r\n\r\n",
            b = boundary,
            f = filename,
            c = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Ok(Request::builder()
        .method(Method::POST)
        .uri(format!("/api/uploads/{}", category))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))?)
}

#[tokio::test]
async fn uploads_reject_unknown_categories_and_types() -> Result<()> {
    let app = common::offline_app();
    let token = common::token(&app, 1, "barangay_secretary");

    let request = multipart("video", "clip.mp4", "video/mp4", b"0000", &token)?;
    let (status, _) = common::respond(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = multipart("document", "tool.exe", "application/octet-stream", b"MZ", &token)?;
    let (status, _) = common::respond(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
