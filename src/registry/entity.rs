use serde_json::Value;

use super::fields::{Field, FieldKind};
use crate::audit::LabelQuery;
use crate::database::{SortDirection, SqlResult};
use crate::services::ReferenceFormat;

/// Query-string parameter mapped to an equality predicate.
#[derive(Debug, Clone, Copy)]
pub struct Filter {
    pub param: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

pub const fn filter(param: &'static str, column: &'static str, kind: FieldKind) -> Filter {
    Filter { param, column, kind }
}

/// Application-level reference checks run before a write.
#[derive(Debug, Clone, Copy)]
pub enum Guard {
    /// `field` must name an existing, active resident.
    ActiveResident { field: &'static str },
    /// When set, `field` must name an existing row of `table`.
    Exists {
        field: &'static str,
        table: &'static str,
        id_column: &'static str,
        what: &'static str,
    },
}

/// Declarative description of one CRUD resource.
#[derive(Debug, Clone, Copy)]
pub struct EntityDef {
    /// Activity-log entity type.
    pub entity_type: &'static str,
    /// Route segment under `/api`.
    pub path: &'static str,
    /// Human name used in messages.
    pub display: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    pub select: &'static str,
    pub from: &'static str,
    /// Qualified id column within `from`.
    pub qualified_id: &'static str,
    pub fields: &'static [Field],
    pub required: &'static [&'static str],
    pub search: &'static [&'static str],
    pub filters: &'static [Filter],
    pub date_column: Option<&'static str>,
    pub order_by: (&'static str, SortDirection),
    pub list_limit: i64,
    pub label: LabelQuery,
    pub guards: &'static [Guard],
    /// Generated reference number stored in `reference.column`.
    pub reference: Option<ReferenceFormat>,
    /// Closed status set, enabling `PATCH /:id/status`.
    pub statuses: Option<&'static [&'static str]>,
    pub touches_updated_at: bool,
    /// Creating one records a notification view marker for the creator.
    pub notifiable: bool,
}

impl EntityDef {
    pub fn not_found(&self) -> String {
        format!("{} not found", self.display)
    }
}

/// `INSERT INTO table (cols) VALUES (...) RETURNING id`, with an optional
/// leading pre-computed column such as a reference number.
pub fn insert_sql(
    table: &str,
    id_column: &str,
    fields: &[Field],
    values: &[Value],
    leading: Option<(&str, Value)>,
) -> SqlResult {
    let mut columns = vec![];
    let mut placeholders = vec![];
    let mut params = vec![];

    if let Some((column, value)) = leading {
        params.push(value);
        columns.push(column.to_string());
        placeholders.push(format!("${}", params.len()));
    }
    for (field, value) in fields.iter().zip(values) {
        params.push(value.clone());
        columns.push(field.name.to_string());
        placeholders.push(field.placeholder(params.len()));
    }

    SqlResult {
        query: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            columns.join(", "),
            placeholders.join(", "),
            id_column
        ),
        params,
    }
}

/// Full-replace `UPDATE ... WHERE id = $n RETURNING id`; no row means not found.
pub fn update_sql(
    table: &str,
    id_column: &str,
    fields: &[Field],
    values: &[Value],
    id: i64,
    touch_updated_at: bool,
) -> SqlResult {
    let mut params: Vec<Value> = vec![];
    let mut sets: Vec<String> = fields
        .iter()
        .zip(values)
        .map(|(field, value)| {
            params.push(value.clone());
            format!("{} = {}", field.name, field.placeholder(params.len()))
        })
        .collect();
    if touch_updated_at {
        sets.push("updated_at = NOW()".to_string());
    }
    params.push(Value::from(id));

    SqlResult {
        query: format!(
            "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
            table,
            sets.join(", "),
            id_column,
            params.len(),
            id_column
        ),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fields::{date, flag, int, text};
    use serde_json::json;

    #[test]
    fn insert_numbers_leading_column_first() {
        let fields = [text("complainant_name"), int("category_id")];
        let sql = insert_sql(
            "complaints",
            "complaint_id",
            &fields,
            &[json!("Ana"), Value::Null],
            Some(("complaint_number", json!("CMP-2025-0001"))),
        );
        assert_eq!(
            sql.query,
            "INSERT INTO complaints (complaint_number, complainant_name, category_id) \
             VALUES ($1, $2::text, $3::bigint) RETURNING complaint_id"
        );
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn update_replaces_every_field() {
        let fields = [date("checkup_date"), flag("is_public", true)];
        let sql = update_sql("projects", "project_id", &fields, &[json!("2025-01-01"), Value::Null], 9, true);
        assert_eq!(
            sql.query,
            "UPDATE projects SET checkup_date = $1::date, is_public = COALESCE($2::boolean, TRUE), \
             updated_at = NOW() WHERE project_id = $3 RETURNING project_id"
        );
        assert_eq!(sql.params[2], json!(9));
    }
}
