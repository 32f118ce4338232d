//! Activity log: one append-only row per successful mutation.
//!
//! Writing the row is a side effect of the mutation, never part of it. A failed
//! write is logged on the operational channel and reported back as a
//! [`SideEffect`] value, so handlers cannot accidentally turn it into an error
//! response.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::database::Database;
use crate::types::AuditAction;

pub mod labels;

pub use labels::{fallback_label, resolve_label, LabelQuery, RESIDENT_NAME_SQL};

#[derive(Debug, Error)]
pub enum SideEffectError {
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("delivery failure: {0}")]
    Delivery(String),

    #[error("skipped: {0}")]
    Skipped(String),
}

/// Outcome of a best-effort side effect. Failures are already logged when this
/// value is created; callers may inspect it but never propagate it.
#[derive(Debug)]
pub struct SideEffect {
    kind: &'static str,
    outcome: Result<(), SideEffectError>,
}

impl SideEffect {
    pub fn from_result(kind: &'static str, outcome: Result<(), SideEffectError>) -> Self {
        match &outcome {
            Err(SideEffectError::Skipped(reason)) => tracing::debug!("{} skipped: {}", kind, reason),
            Err(e) => tracing::warn!("{} side effect failed: {}", kind, e),
            Ok(()) => {}
        }
        Self { kind, outcome }
    }

    pub fn ok(kind: &'static str) -> Self {
        Self { kind, outcome: Ok(()) }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&SideEffectError> {
        self.outcome.as_ref().err()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityEntry {
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub entity_identifier: String,
    pub status: String,
    pub remarks: Option<String>,
}

impl ActivityEntry {
    pub fn new(
        user_id: Option<i64>,
        action: AuditAction,
        entity_type: &str,
        entity_id: i64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id: Some(entity_id),
            entity_identifier: label.into(),
            status: "success".to_string(),
            remarks: None,
        }
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}

/// Destination for activity rows.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), SideEffectError>;
}

pub struct PgActivitySink {
    pool: PgPool,
}

impl PgActivitySink {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

#[async_trait]
impl ActivitySink for PgActivitySink {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), SideEffectError> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs
                (user_id, action, entity_type, entity_id, entity_identifier, status, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.entity_identifier)
        .bind(&entry.status)
        .bind(&entry.remarks)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|e| SideEffectError::Storage(e.to_string()))
    }
}

/// In-memory sink, for dry runs and tests.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ActivityEntry>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every append fails.
    pub fn failing() -> Self {
        Self { entries: Mutex::new(vec![]), fail: true }
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ActivitySink for MemorySink {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), SideEffectError> {
        if self.fail {
            return Err(SideEffectError::Storage("sink unavailable".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| SideEffectError::Storage("sink poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

/// Fire-and-forget audit writer. Issued after the primary statement succeeded,
/// within the same request; at most once, no retry.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn ActivitySink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        Self { sink }
    }

    pub fn postgres(db: &Database) -> Self {
        Self::new(Arc::new(PgActivitySink::new(db)))
    }

    pub async fn record(&self, entry: ActivityEntry) -> SideEffect {
        let outcome = self.sink.append(&entry).await;
        if outcome.is_err() {
            tracing::warn!(
                "Dropping activity entry {} {} #{:?}",
                entry.action,
                entry.entity_type,
                entry.entity_id
            );
        }
        SideEffect::from_result("audit", outcome)
    }
}
