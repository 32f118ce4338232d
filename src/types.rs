/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of account roles. Unrecognised role strings map to `Other`
/// and get the most restrictive treatment everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    Admin,
    BarangayCaptain,
    BarangaySecretary,
    BarangayTreasurer,
    BarangayCouncilor,
    BarangayHealthWorker,
    Other(String),
}

/// Fixed lookup: role -> (wire name, dashboard route, position label).
const ROLE_TABLE: &[(&str, &str, &str)] = &[
    ("admin", "/admin/dashboard", "System Administrator"),
    ("barangay_captain", "/captain/dashboard", "Punong Barangay"),
    ("barangay_secretary", "/secretary/dashboard", "Barangay Secretary"),
    ("barangay_treasurer", "/treasurer/dashboard", "Barangay Treasurer"),
    ("barangay_councilor", "/councilor/dashboard", "Barangay Kagawad"),
    ("barangay_health_worker", "/bhw/dashboard", "Barangay Health Worker"),
];

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "barangay_captain" | "captain" => Role::BarangayCaptain,
            "barangay_secretary" | "secretary" => Role::BarangaySecretary,
            "barangay_treasurer" | "treasurer" => Role::BarangayTreasurer,
            "barangay_councilor" | "councilor" | "kagawad" => Role::BarangayCouncilor,
            "barangay_health_worker" | "bhw" => Role::BarangayHealthWorker,
            _ => Role::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::BarangayCaptain => "barangay_captain",
            Role::BarangaySecretary => "barangay_secretary",
            Role::BarangayTreasurer => "barangay_treasurer",
            Role::BarangayCouncilor => "barangay_councilor",
            Role::BarangayHealthWorker => "barangay_health_worker",
            Role::Other(name) => name,
        }
    }

    fn lookup(&self) -> Option<&'static (&'static str, &'static str, &'static str)> {
        ROLE_TABLE.iter().find(|(name, _, _)| *name == self.as_str())
    }

    pub fn dashboard_url(&self) -> &'static str {
        self.lookup().map(|(_, url, _)| *url).unwrap_or("/dashboard")
    }

    pub fn position_label(&self) -> &'static str {
        self.lookup().map(|(_, _, label)| *label).unwrap_or("Staff")
    }

    /// Captain and admin manage accounts and see everything.
    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::Admin | Role::BarangayCaptain)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Restored,
    Login,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
            AuditAction::Restored => "restored",
            AuditAction::Login => "login",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_and_aliases() {
        assert_eq!(Role::parse("barangay_health_worker"), Role::BarangayHealthWorker);
        assert_eq!(Role::parse("BHW"), Role::BarangayHealthWorker);
        assert_eq!(Role::parse("Captain"), Role::BarangayCaptain);
        assert_eq!(Role::parse("clerk"), Role::Other("clerk".to_string()));
    }

    #[test]
    fn dashboard_lookup_falls_back_for_unknown_roles() {
        assert_eq!(Role::BarangaySecretary.dashboard_url(), "/secretary/dashboard");
        assert_eq!(Role::BarangayCaptain.position_label(), "Punong Barangay");
        assert_eq!(Role::parse("clerk").dashboard_url(), "/dashboard");
    }

    #[test]
    fn role_serializes_as_wire_name() {
        let v = serde_json::to_value(Role::BarangayCouncilor).unwrap();
        assert_eq!(v, serde_json::json!("barangay_councilor"));
        let back: Role = serde_json::from_value(serde_json::json!("admin")).unwrap();
        assert_eq!(back, Role::Admin);
    }
}
