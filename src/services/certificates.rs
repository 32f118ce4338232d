//! Certificate request workflow: intake (resident or walk-in) and status changes
//! with the requester notification.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{PgConnection, Row};

use crate::audit::{resolve_label, ActivityEntry, SideEffect, SideEffectError};
use crate::auth::Identity;
use crate::error::ApiError;
use crate::registry::catalog::{REQUESTS, REQUEST_STATUSES};
use crate::registry::crud;
use crate::registry::fields::{as_object, coerce, missing, require, FieldKind};
use crate::services::mail::{certificate_status_email, CertificateNotice};
use crate::services::notifications;
use crate::state::AppState;
use crate::types::AuditAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterType {
    Resident,
    NonResident,
}

impl RequesterType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "resident" => Some(RequesterType::Resident),
            "non-resident" => Some(RequesterType::NonResident),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequesterType::Resident => "resident",
            RequesterType::NonResident => "non-resident",
        }
    }
}

/// Walk-in requester details, stored in the companion detail row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub requester_name: String,
    pub contact_number: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intake {
    pub requester_type: RequesterType,
    pub resident_id: Option<i64>,
    pub cert_type_id: i64,
    pub purpose: String,
    pub contact: Option<ContactDetails>,
}

fn text_of(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn integer_of(object: &Map<String, Value>, key: &str) -> Result<i64, ApiError> {
    let raw = object.get(key).unwrap_or(&Value::Null);
    coerce(FieldKind::Integer, raw)
        .map_err(|reason| ApiError::invalid_field(key, reason))?
        .as_i64()
        .ok_or_else(|| ApiError::missing_fields(&[key]))
}

/// Validate an intake payload. Nothing here touches storage.
pub fn parse_intake(payload: &Value) -> Result<Intake, ApiError> {
    let object = as_object(payload)?;

    let requester_type = match text_of(object, "requester_type") {
        None => RequesterType::Resident,
        Some(raw) => RequesterType::parse(&raw).ok_or_else(|| {
            ApiError::invalid_field("requester_type", "must be 'resident' or 'non-resident'")
        })?,
    };

    require(object, &["cert_type_id", "purpose"])?;
    let cert_type_id = integer_of(object, "cert_type_id")?;
    let purpose = text_of(object, "purpose").ok_or_else(|| ApiError::missing_fields(&["purpose"]))?;

    match requester_type {
        RequesterType::Resident => {
            require(object, &["resident_id"])?;
            Ok(Intake {
                requester_type,
                resident_id: Some(integer_of(object, "resident_id")?),
                cert_type_id,
                purpose,
                contact: None,
            })
        }
        RequesterType::NonResident => {
            let requester_name = text_of(object, "requester_name").or_else(|| text_of(object, "full_name"));
            let mut absent = missing(object, &["contact_number", "email", "address"]);
            if requester_name.is_none() {
                absent.insert(0, "requester_name");
            }
            if !absent.is_empty() {
                return Err(ApiError::missing_fields(&absent));
            }
            let email = text_of(object, "email").unwrap_or_default();
            if !email.contains('@') {
                return Err(ApiError::invalid_field("email", "must be an email address"));
            }
            Ok(Intake {
                requester_type,
                resident_id: None,
                cert_type_id,
                purpose,
                contact: Some(ContactDetails {
                    requester_name: requester_name.unwrap_or_default(),
                    contact_number: text_of(object, "contact_number").unwrap_or_default(),
                    email,
                    address: text_of(object, "address").unwrap_or_default(),
                }),
            })
        }
    }
}

async fn insert_request(conn: &mut PgConnection, intake: &Intake) -> Result<i64, sqlx::Error> {
    let request_id: i64 = sqlx::query(
        "INSERT INTO certificate_requests (resident_id, requester_type, cert_type_id, purpose) \
         VALUES ($1, $2, $3, $4) RETURNING request_id",
    )
    .bind(intake.resident_id)
    .bind(intake.requester_type.as_str())
    .bind(intake.cert_type_id)
    .bind(&intake.purpose)
    .fetch_one(&mut *conn)
    .await?
    .try_get(0)?;

    if let Some(contact) = &intake.contact {
        sqlx::query(
            "INSERT INTO public_request_details \
             (certificate_request_id, requester_name, contact_number, email, address) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(request_id)
        .bind(&contact.requester_name)
        .bind(&contact.contact_number)
        .bind(&contact.email)
        .bind(&contact.address)
        .execute(&mut *conn)
        .await?;
    }
    Ok(request_id)
}

/// Validate, then insert the request and (for walk-ins) its detail row as one
/// transaction. `actor` is `None` for the public intake form.
pub async fn submit(state: &AppState, actor: Option<&Identity>, payload: &Value) -> Result<i64, ApiError> {
    let intake = parse_intake(payload)?;

    if let Some(resident_id) = intake.resident_id {
        crud::ensure_active_resident(&state.db, resident_id).await?;
    }
    let type_exists: bool =
        sqlx::query("SELECT EXISTS (SELECT 1 FROM certificate_types WHERE cert_type_id = $1) AS found")
            .bind(intake.cert_type_id)
            .fetch_one(state.db.pool())
            .await?
            .try_get("found")?;
    if !type_exists {
        return Err(ApiError::bad_request("Certificate type not found"));
    }

    let mut tx = state.db.pool().begin().await?;
    let request_id = match insert_request(&mut *tx, &intake).await {
        Ok(id) => id,
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!("Rollback of certificate request failed: {}", rollback);
            }
            tracing::error!("Certificate request insert failed: {}", e);
            return Err(ApiError::internal_with_detail("Failed to submit certificate request", e.to_string()));
        }
    };
    tx.commit().await?;

    let label = resolve_label(&state.db, &REQUESTS.label, REQUESTS.entity_type, request_id).await;
    state
        .audit
        .record(ActivityEntry::new(
            actor.map(|a| a.user_id),
            AuditAction::Created,
            REQUESTS.entity_type,
            request_id,
            label,
        ))
        .await;
    if let Some(actor) = actor {
        notifications::record_creator_view(&state.db, actor.user_id, REQUESTS.entity_type, request_id).await;
    }

    Ok(request_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: String,
    pub rejection_reason: Option<String>,
    /// Stored as the processed date; also quoted in the approval email.
    pub pickup_date: Option<String>,
}

pub fn parse_status_change(payload: &Value) -> Result<StatusChange, ApiError> {
    let object = as_object(payload)?;
    let status = text_of(object, "status").ok_or_else(|| ApiError::missing_fields(&["status"]))?;
    if !REQUEST_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::invalid_field(
            "status",
            format!("must be one of: {}", REQUEST_STATUSES.join(", ")),
        ));
    }

    let raw_date = object
        .get("pickup_date")
        .or_else(|| object.get("reschedule_date"))
        .unwrap_or(&Value::Null);
    let pickup_date = coerce(FieldKind::Timestamp, raw_date)
        .map_err(|reason| ApiError::invalid_field("pickup_date", reason))?
        .as_str()
        .map(str::to_string);

    Ok(StatusChange {
        status,
        rejection_reason: text_of(object, "rejection_reason"),
        pickup_date,
    })
}

/// Where each status may move next. Rejected, released and cancelled requests are closed.
const TRANSITIONS: &[(&str, &[&str])] = &[
    ("pending", &["processing", "approved", "rejected", "cancelled"]),
    ("processing", &["approved", "rejected", "cancelled"]),
    ("approved", &["released", "cancelled"]),
];

pub fn check_transition(from: &str, to: &str) -> Result<(), ApiError> {
    if from == to {
        return Err(ApiError::conflict(format!("Request is already {}", to)));
    }
    let next = TRANSITIONS
        .iter()
        .find(|(status, _)| *status == from)
        .map_or(&[][..], |(_, next)| *next);
    if !next.contains(&to) {
        return Err(ApiError::conflict(format!("A {} request cannot be changed to {}", from, to)));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOutcome {
    pub request_id: i64,
    pub status: String,
    pub email_sent: bool,
}

fn notice_from_view(view: &Value, change: &StatusChange, request_id: i64) -> Option<CertificateNotice> {
    let field = |key: &str| view.get(key).and_then(Value::as_str).map(str::to_string);
    let email = field("email").filter(|e| e.contains('@'))?;
    Some(CertificateNotice {
        request_id,
        requester_name: field("requester_name").unwrap_or_else(|| "Requester".to_string()),
        email,
        certificate_type: field("certificate_type").unwrap_or_default(),
        purpose: field("purpose").unwrap_or_default(),
        status: change.status.clone(),
        rejection_reason: change.rejection_reason.clone(),
        pickup_date: change.pickup_date.clone(),
    })
}

/// Apply a status change. The requester email goes out only after the update
/// committed, and its failure never fails the change. The update is conditional
/// on the status read here, so a request is notified once per transition.
pub async fn change_status(
    state: &AppState,
    identity: &Identity,
    request_id: i64,
    payload: &Value,
) -> Result<StatusOutcome, ApiError> {
    let change = parse_status_change(payload)?;
    let view = crud::get(&state.db, &REQUESTS, request_id).await?;
    let current = view.get("status").and_then(Value::as_str).unwrap_or("pending").to_string();
    check_transition(&current, &change.status)?;

    sqlx::query(
        "UPDATE certificate_requests SET status = $1, \
         remarks = COALESCE($2, remarks), \
         processed_by = CASE WHEN $1 IN ('processing', 'approved', 'rejected') THEN $3 ELSE processed_by END, \
         processed_date = CASE \
             WHEN $4::timestamptz IS NOT NULL THEN $4::timestamptz \
             WHEN $1 IN ('processing', 'approved', 'rejected') THEN NOW() \
             ELSE processed_date END, \
         released_by = CASE WHEN $1 = 'released' THEN $3 ELSE released_by END, \
         released_date = CASE WHEN $1 = 'released' THEN NOW() ELSE released_date END \
         WHERE request_id = $5 AND status = $6 RETURNING request_id",
    )
    .bind(&change.status)
    .bind(&change.rejection_reason)
    .bind(identity.user_id)
    .bind(&change.pickup_date)
    .bind(request_id)
    .bind(&current)
    .fetch_optional(state.db.pool())
    .await?
    .ok_or_else(|| ApiError::conflict("Request status changed in the meantime; reload and try again"))?;

    let label = resolve_label(&state.db, &REQUESTS.label, REQUESTS.entity_type, request_id).await;
    state
        .audit
        .record(
            ActivityEntry::new(Some(identity.user_id), AuditAction::Updated, REQUESTS.entity_type, request_id, label)
                .with_remarks(format!("Status changed to {}", change.status)),
        )
        .await;

    let email = notice_from_view(&view, &change, request_id)
        .and_then(|notice| certificate_status_email(&notice, &state.config.mail.office_hours));
    let email_sent = match email {
        Some(email) => SideEffect::from_result("email", state.mailer.send(&email).await).succeeded(),
        None => {
            SideEffect::from_result(
                "email",
                Err(SideEffectError::Skipped(format!("no notification for request {}", request_id))),
            );
            false
        }
    };

    Ok(StatusOutcome {
        request_id,
        status: change.status,
        email_sent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resident_intake_requires_resident_id() {
        let err = parse_intake(&json!({"cert_type_id": 1, "purpose": "Employment"})).unwrap_err();
        assert_eq!(err.message(), "Missing required fields: resident_id");

        let intake = parse_intake(&json!({"resident_id": "7", "cert_type_id": 1, "purpose": "Employment"})).unwrap();
        assert_eq!(intake.requester_type, RequesterType::Resident);
        assert_eq!(intake.resident_id, Some(7));
        assert!(intake.contact.is_none());
    }

    #[test]
    fn walk_in_intake_requires_contact_details() {
        let err = parse_intake(&json!({
            "requester_type": "non-resident",
            "cert_type_id": 2,
            "purpose": "Travel",
            "email": "a@b.ph"
        }))
        .unwrap_err();
        assert_eq!(err.message(), "Missing required fields: requester_name, contact_number, address");

        let intake = parse_intake(&json!({
            "requester_type": "non-resident",
            "cert_type_id": 2,
            "purpose": "Travel",
            "full_name": "Juan Dela Cruz",
            "contact_number": "0917",
            "email": "juan@example.ph",
            "address": "Purok 3"
        }))
        .unwrap();
        assert_eq!(intake.resident_id, None);
        assert_eq!(intake.contact.unwrap().requester_name, "Juan Dela Cruz");
    }

    #[test]
    fn intake_rejects_unknown_requester_type_and_missing_basics() {
        let err = parse_intake(&json!({"requester_type": "visitor", "cert_type_id": 1, "purpose": "x"})).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err = parse_intake(&json!({"requester_type": "resident"})).unwrap_err();
        assert_eq!(err.message(), "Missing required fields: cert_type_id, purpose");
    }

    #[test]
    fn status_change_validates_status_and_date() {
        assert!(parse_status_change(&json!({"status": "archived"})).is_err());
        assert!(parse_status_change(&json!({"status": "approved", "pickup_date": "soon"})).is_err());

        let change = parse_status_change(&json!({
            "status": "rejected",
            "rejection_reason": "Incomplete documents"
        }))
        .unwrap();
        assert_eq!(change.rejection_reason.as_deref(), Some("Incomplete documents"));
        assert_eq!(change.pickup_date, None);

        let change = parse_status_change(&json!({"status": "approved", "reschedule_date": "2025-03-01"})).unwrap();
        assert_eq!(change.pickup_date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn closed_requests_do_not_change_status() {
        assert!(check_transition("pending", "approved").is_ok());
        assert!(check_transition("pending", "rejected").is_ok());
        assert!(check_transition("approved", "released").is_ok());

        let err = check_transition("rejected", "approved").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "A rejected request cannot be changed to approved");
        assert_eq!(check_transition("approved", "approved").unwrap_err().message(), "Request is already approved");
        assert!(check_transition("approved", "rejected").is_err());
        assert!(check_transition("released", "cancelled").is_err());
        assert!(check_transition("archived", "pending").is_err());
    }

    #[test]
    fn notice_needs_a_deliverable_address() {
        let change = parse_status_change(&json!({"status": "approved"})).unwrap();
        let view = json!({"requester_name": "Ana Cruz", "email": null, "certificate_type": "Barangay Clearance"});
        assert!(notice_from_view(&view, &change, 3).is_none());

        let view = json!({"requester_name": "Ana Cruz", "email": "ana@example.ph", "certificate_type": "Barangay Clearance"});
        let notice = notice_from_view(&view, &change, 3).unwrap();
        assert_eq!(notice.email, "ana@example.ph");
        assert_eq!(notice.status, "approved");
    }
}
