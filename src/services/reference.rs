use chrono::{Datelike, Utc};
use sqlx::{PgConnection, Row};

use crate::database::DatabaseError;

/// Upper bound on collision probes before allocation gives up.
pub const MAX_PROBES: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixStyle {
    /// `HH001`
    Fixed(&'static str),
    /// `CMP-2025-0001`
    Yearly(&'static str),
}

/// Human-readable reference number stored in `table.column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFormat {
    pub table: &'static str,
    pub column: &'static str,
    pub style: PrefixStyle,
    pub width: usize,
}

pub const HOUSEHOLD_NUMBER: ReferenceFormat = ReferenceFormat {
    table: "households",
    column: "household_number",
    style: PrefixStyle::Fixed("HH"),
    width: 3,
};

pub const COMPLAINT_NUMBER: ReferenceFormat = ReferenceFormat {
    table: "complaints",
    column: "complaint_number",
    style: PrefixStyle::Yearly("CMP"),
    width: 4,
};

pub const BLOTTER_NUMBER: ReferenceFormat = ReferenceFormat {
    table: "blotter_records",
    column: "blotter_number",
    style: PrefixStyle::Yearly("BLT"),
    width: 4,
};

impl ReferenceFormat {
    pub fn prefix(&self, year: i32) -> String {
        match self.style {
            PrefixStyle::Fixed(p) => p.to_string(),
            PrefixStyle::Yearly(p) => format!("{}-{}-", p, year),
        }
    }

    pub fn format(&self, prefix: &str, n: u64) -> String {
        format!("{}{:0width$}", prefix, n, width = self.width)
    }
}

/// Numeric suffix of `number` under `prefix`; anything not purely digits after it is ignored.
pub fn parse_suffix(prefix: &str, number: &str) -> Option<u64> {
    let digits = number.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Highest existing suffix plus one, or 1 when nothing matches.
pub fn next_suffix<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> u64 {
    existing
        .into_iter()
        .filter_map(|n| parse_suffix(prefix, n))
        .max()
        .map_or(1, |max| max + 1)
}

/// Allocate the next free number for `format`.
///
/// Must run inside a transaction: the advisory lock is held until that
/// transaction ends, so concurrent allocations for the same table serialize
/// and each sees the rows committed by the previous one.
pub async fn allocate(conn: &mut PgConnection, format: &ReferenceFormat) -> Result<String, DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
        .bind(format.table)
        .execute(&mut *conn)
        .await?;

    let prefix = format.prefix(Utc::now().year());
    let scan = format!(
        "SELECT {col} AS number FROM {table} WHERE {col} LIKE $1",
        col = format.column,
        table = format.table
    );
    let rows = sqlx::query(&scan)
        .bind(format!("{}%", prefix))
        .fetch_all(&mut *conn)
        .await?;
    let existing: Vec<String> = rows
        .iter()
        .filter_map(|row| row.try_get::<String, _>("number").ok())
        .collect();

    let start = next_suffix(&prefix, existing.iter().map(String::as_str));
    let probe = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1) AS taken",
        format.table, format.column
    );

    for n in start..start + MAX_PROBES {
        let candidate = format.format(&prefix, n);
        let taken: bool = sqlx::query(&probe)
            .bind(&candidate)
            .fetch_one(&mut *conn)
            .await?
            .try_get("taken")?;
        if !taken {
            return Ok(candidate);
        }
        tracing::debug!("{} {} already taken, probing", format.column, candidate);
    }

    Err(DatabaseError::QueryError(format!(
        "no free {} after {} probes from {}",
        format.column, MAX_PROBES, start
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_household_numbers() {
        let prefix = HOUSEHOLD_NUMBER.prefix(2025);
        assert_eq!(prefix, "HH");
        assert_eq!(HOUSEHOLD_NUMBER.format(&prefix, 7), "HH007");
        assert_eq!(HOUSEHOLD_NUMBER.format(&prefix, 1234), "HH1234");
    }

    #[test]
    fn yearly_prefix_includes_year() {
        let prefix = COMPLAINT_NUMBER.prefix(2025);
        assert_eq!(COMPLAINT_NUMBER.format(&prefix, 12), "CMP-2025-0012");
        assert_eq!(BLOTTER_NUMBER.prefix(2024), "BLT-2024-");
    }

    #[test]
    fn next_suffix_takes_numeric_max() {
        let existing = ["HH001", "HH010", "HH009", "HHX12", "HH", "OTHER"];
        assert_eq!(next_suffix("HH", existing), 11);
        assert_eq!(next_suffix("HH", []), 1);
    }

    #[test]
    fn sequential_allocation_is_strictly_increasing() {
        let mut taken: Vec<String> = vec![];
        for _ in 0..25 {
            let n = next_suffix("HH", taken.iter().map(String::as_str));
            taken.push(HOUSEHOLD_NUMBER.format("HH", n));
        }
        let suffixes: Vec<u64> = taken.iter().filter_map(|t| parse_suffix("HH", t)).collect();
        assert!(suffixes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(suffixes.first(), Some(&1));
        assert_eq!(suffixes.last(), Some(&25));
    }
}
