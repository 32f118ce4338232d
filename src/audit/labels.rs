use sqlx::Row;

use crate::database::Database;

/// Display name of a resident aliased as `r`, as a literal usable in `concat!`.
#[macro_export]
macro_rules! resident_name_sql {
    () => {
        "CONCAT_WS(' ', r.first_name, NULLIF(r.middle_name, ''), r.last_name, NULLIF(r.suffix, ''))"
    };
}

pub const RESIDENT_NAME_SQL: &str = resident_name_sql!();

/// Lookup of the human-readable label of one row, e.g. a composed person name
/// or a generated reference number.
#[derive(Debug, Clone, Copy)]
pub struct LabelQuery {
    pub from: &'static str,
    pub id_column: &'static str,
    pub expr: &'static str,
}

impl LabelQuery {
    pub const fn new(from: &'static str, id_column: &'static str, expr: &'static str) -> Self {
        Self { from, id_column, expr }
    }

    pub fn sql(&self) -> String {
        format!(
            "SELECT ({})::text AS label FROM {} WHERE {} = $1",
            self.expr, self.from, self.id_column
        )
    }
}

pub fn fallback_label(entity_type: &str, id: i64) -> String {
    format!("{} #{}", entity_type, id)
}

/// Best effort: any failure or an empty label yields [`fallback_label`].
pub async fn resolve_label(db: &Database, query: &LabelQuery, entity_type: &str, id: i64) -> String {
    let row = sqlx::query(&query.sql())
        .bind(id)
        .fetch_optional(db.pool())
        .await;

    match row {
        Ok(Some(row)) => match row.try_get::<Option<String>, _>("label") {
            Ok(Some(label)) if !label.trim().is_empty() => label,
            _ => fallback_label(entity_type, id),
        },
        Ok(None) => fallback_label(entity_type, id),
        Err(e) => {
            tracing::warn!("Label lookup for {} #{} failed: {}", entity_type, id, e);
            fallback_label(entity_type, id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_label_sql() {
        let q = LabelQuery::new("residents r", "r.resident_id", RESIDENT_NAME_SQL);
        assert_eq!(
            q.sql(),
            format!("SELECT ({})::text AS label FROM residents r WHERE r.resident_id = $1", RESIDENT_NAME_SQL)
        );
    }

    #[test]
    fn fallback_names_type_and_id() {
        assert_eq!(fallback_label("household", 9), "household #9");
    }
}
