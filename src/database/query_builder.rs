use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
struct OrderInfo {
    expr: String,
    sort: SortDirection,
}

impl OrderInfo {
    /// Output column name when `expr` is a plain (optionally qualified) column.
    fn output_column(&self) -> Option<&str> {
        let name = self.expr.rsplit('.').next()?;
        let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        plain.then_some(name)
    }
}

/// SELECT composition with optional predicates.
///
/// An omitted filter imposes no constraint; a provided one becomes a
/// parameterized predicate. Placeholders are numbered in the order they are added.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    select: String,
    from: String,
    conditions: Vec<String>,
    params: Vec<Value>,
    group_by: Option<String>,
    order: Vec<OrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    pub fn new(select: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            from: from.into(),
            conditions: vec![],
            params: vec![],
            group_by: None,
            order: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Register a parameter and return its placeholder, with an optional cast.
    pub fn param(&mut self, value: impl Into<Value>, cast: Option<&str>) -> String {
        self.params.push(value.into());
        match cast {
            Some(cast) => format!("${}::{}", self.params.len(), cast),
            None => format!("${}", self.params.len()),
        }
    }

    /// Raw predicate; use [`SelectQuery::param`] for any value it embeds.
    pub fn condition(&mut self, sql: impl Into<String>) -> &mut Self {
        self.conditions.push(sql.into());
        self
    }

    pub fn eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if value.is_null() {
            return self.condition(format!("{} IS NULL", column));
        }
        let p = self.param(value, None);
        self.condition(format!("{} = {}", column, p))
    }

    pub fn eq_cast(&mut self, column: &str, value: impl Into<Value>, cast: &str) -> &mut Self {
        let p = self.param(value, Some(cast));
        self.condition(format!("{} = {}", column, p))
    }

    pub fn eq_opt<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.eq(column, v);
        }
        self
    }

    /// Case-insensitive substring match across `columns`; blank terms are ignored.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() && !columns.is_empty() => t,
            _ => return self,
        };
        let p = self.param(format!("%{}%", term), None);
        let clauses: Vec<String> = columns
            .iter()
            .map(|c| format!("CAST({} AS TEXT) ILIKE {}", c, p))
            .collect();
        self.condition(format!("({})", clauses.join(" OR ")))
    }

    /// Inclusive calendar-date range on a date or timestamp column.
    pub fn date_range(&mut self, column: &str, from: Option<&str>, to: Option<&str>) -> &mut Self {
        if let Some(from) = from.filter(|s| !s.trim().is_empty()) {
            let p = self.param(from.trim(), Some("date"));
            self.condition(format!("{} >= {}", column, p));
        }
        if let Some(to) = to.filter(|s| !s.trim().is_empty()) {
            let p = self.param(to.trim(), Some("date"));
            self.condition(format!("{} < ({} + INTERVAL '1 day')", column, p));
        }
        self
    }

    pub fn in_list(&mut self, column: &str, values: &[&str]) -> &mut Self {
        if values.is_empty() {
            return self.condition("1=0");
        }
        let placeholders: Vec<String> = values.iter().map(|v| self.param(*v, None)).collect();
        self.condition(format!("{} IN ({})", column, placeholders.join(", ")))
    }

    pub fn group_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.group_by = Some(expr.into());
        self
    }

    pub fn order_by(&mut self, expr: impl Into<String>, sort: SortDirection) -> &mut Self {
        self.order.push(OrderInfo { expr: expr.into(), sort });
        self
    }

    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn paginate(&mut self, page: &Pagination) -> &mut Self {
        self.limit = Some(page.limit);
        self.offset = Some(page.offset());
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }

    pub fn to_sql(&self) -> SqlResult {
        let order_clause = if self.order.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{} {}", o.expr, o.sort.to_sql()))
                .collect();
            format!("ORDER BY {}", parts.join(", "))
        };

        let query = [
            format!("SELECT {}", self.select),
            format!("FROM {}", self.from),
            self.where_clause(),
            self.group_by.as_ref().map(|g| format!("GROUP BY {}", g)).unwrap_or_default(),
            order_clause,
            self.limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params: self.params.clone() }
    }

    /// Wrap the query so each row comes back as one JSON object in column `row`.
    pub fn to_json_sql(&self) -> SqlResult {
        let inner = self.to_sql();
        let outer_order: Vec<String> = self
            .order
            .iter()
            .filter_map(|o| o.output_column().map(|c| format!("t.\"{}\" {}", c, o.sort.to_sql())))
            .collect();
        let order_clause = if outer_order.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", outer_order.join(", "))
        };
        SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t{}", inner.query, order_clause),
            params: inner.params,
        }
    }

    /// COUNT(*) over the same FROM and WHERE, ignoring order and paging.
    pub fn to_count_sql(&self) -> SqlResult {
        let query = [
            format!("SELECT COUNT(*) AS count FROM {}", self.from),
            self.where_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
        SqlResult { query, params: self.params.clone() }
    }
}

/// Page/limit request with a computed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit.filter(|l| *l >= 1).unwrap_or(default_limit).min(Self::MAX_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn info(&self, total: i64) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: (total + self.limit - 1) / self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn omitted_filters_add_no_predicates() {
        let mut q = SelectQuery::new("*", "residents r");
        q.search(&["r.first_name"], None)
            .search(&["r.first_name"], Some("   "))
            .eq_opt::<String>("r.purok", None)
            .date_range("r.created_at", None, Some(""));
        let sql = q.to_sql();
        assert_eq!(sql.query, "SELECT * FROM residents r");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn placeholders_are_numbered_in_order() {
        let mut q = SelectQuery::new("r.*", "residents r");
        q.eq("r.is_active", true)
            .search(&["r.first_name", "r.last_name"], Some("cruz"))
            .date_range("r.created_at", Some("2024-01-01"), Some("2024-12-31"))
            .order_by("r.created_at", SortDirection::Desc)
            .limit(50);
        let sql = q.to_sql();
        assert_eq!(
            sql.query,
            "SELECT r.* FROM residents r WHERE r.is_active = $1 AND \
             (CAST(r.first_name AS TEXT) ILIKE $2 OR CAST(r.last_name AS TEXT) ILIKE $2) AND \
             r.created_at >= $3::date AND r.created_at < ($4::date + INTERVAL '1 day') \
             ORDER BY r.created_at DESC LIMIT 50"
        );
        assert_eq!(sql.params, vec![json!(true), json!("%cruz%"), json!("2024-01-01"), json!("2024-12-31")]);
    }

    #[test]
    fn json_wrapper_reorders_by_output_column() {
        let mut q = SelectQuery::new("c.*", "complaints c");
        q.order_by("c.created_at", SortDirection::Desc);
        let sql = q.to_json_sql();
        assert!(sql.query.starts_with("SELECT row_to_json(t) AS row FROM (SELECT c.* FROM complaints c"));
        assert!(sql.query.ends_with("t ORDER BY t.\"created_at\" DESC"));
    }

    #[test]
    fn count_ignores_paging() {
        let mut q = SelectQuery::new("*", "events e");
        q.eq("e.location", "Hall").paginate(&Pagination::new(Some(3), Some(10), 20));
        let sql = q.to_count_sql();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM events e WHERE e.location = $1");
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut q = SelectQuery::new("*", "activity_logs");
        q.in_list("entity_type", &[]);
        assert!(q.to_sql().query.ends_with("WHERE 1=0"));
    }

    #[test]
    fn pagination_computes_offset_and_pages() {
        let page = Pagination::new(Some(3), Some(20), 50);
        assert_eq!(page.offset(), 40);
        let info = page.info(41);
        assert_eq!(info.pages, 3);
        assert_eq!(Pagination::new(Some(0), Some(10_000), 50).limit, Pagination::MAX_LIMIT);
        assert_eq!(Pagination::new(None, None, 25), Pagination { page: 1, limit: 25 });
    }
}
