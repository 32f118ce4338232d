use serde::Serialize;
use sqlx::Row;
use std::collections::BTreeMap;

use crate::audit::{SideEffect, SideEffectError};
use crate::database::{Database, DatabaseError};

/// An entity type whose new items show up as badge counts until viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSource {
    pub key: &'static str,
    pub entity_type: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    /// Predicate selecting items that still need attention.
    pub pending: &'static str,
}

pub const SOURCES: &[NotificationSource] = &[
    NotificationSource {
        key: "pending_requests",
        entity_type: "certificate_request",
        table: "certificate_requests",
        id_column: "request_id",
        pending: "status = 'pending'",
    },
    NotificationSource {
        key: "new_complaints",
        entity_type: "complaint",
        table: "complaints",
        id_column: "complaint_id",
        pending: "status = 'filed'",
    },
    NotificationSource {
        key: "new_blotters",
        entity_type: "blotter",
        table: "blotter_records",
        id_column: "blotter_id",
        pending: "status = 'recorded'",
    },
];

pub fn source_for(entity_type: &str) -> Option<&'static NotificationSource> {
    SOURCES.iter().find(|s| s.entity_type == entity_type)
}

impl NotificationSource {
    /// `$1` is the viewing user.
    pub fn unseen_count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) AS count FROM {table} x WHERE x.{pending} AND NOT EXISTS (\
             SELECT 1 FROM notification_views nv WHERE nv.user_id = $1 \
             AND nv.entity_type = '{et}' AND nv.entity_id = x.{id})",
            table = self.table,
            pending = self.pending,
            et = self.entity_type,
            id = self.id_column,
        )
    }

    /// `$1` is the viewing user.
    pub fn mark_all_sql(&self) -> String {
        format!(
            "INSERT INTO notification_views (user_id, entity_type, entity_id) \
             SELECT $1, '{et}', x.{id} FROM {table} x WHERE x.{pending} \
             ON CONFLICT (user_id, entity_type, entity_id) DO UPDATE SET viewed_at = NOW()",
            et = self.entity_type,
            id = self.id_column,
            table = self.table,
            pending = self.pending,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationCounts {
    #[serde(flatten)]
    pub by_source: BTreeMap<&'static str, i64>,
    pub total: i64,
}

pub async fn unseen_counts(db: &Database, user_id: i64) -> Result<NotificationCounts, DatabaseError> {
    let mut by_source = BTreeMap::new();
    for source in SOURCES {
        let count: i64 = sqlx::query(&source.unseen_count_sql())
            .bind(user_id)
            .fetch_one(db.pool())
            .await?
            .try_get("count")?;
        by_source.insert(source.key, count);
    }
    let total = by_source.values().sum();
    Ok(NotificationCounts { by_source, total })
}

pub async fn mark_viewed(
    db: &Database,
    user_id: i64,
    entity_type: &str,
    entity_id: i64,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO notification_views (user_id, entity_type, entity_id) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, entity_type, entity_id) DO UPDATE SET viewed_at = NOW()",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .execute(db.pool())
    .await?;
    Ok(())
}

pub async fn mark_all_viewed(
    db: &Database,
    user_id: i64,
    source: &NotificationSource,
) -> Result<u64, DatabaseError> {
    let result = sqlx::query(&source.mark_all_sql())
        .bind(user_id)
        .execute(db.pool())
        .await?;
    Ok(result.rows_affected())
}

/// A creator has already seen what they created.
pub async fn record_creator_view(db: &Database, user_id: i64, entity_type: &str, entity_id: i64) -> SideEffect {
    let outcome = mark_viewed(db, user_id, entity_type, entity_id)
        .await
        .map_err(|e| SideEffectError::Storage(e.to_string()));
    SideEffect::from_result("notification_view", outcome)
}
