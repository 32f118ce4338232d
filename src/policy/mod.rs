//! Role-scoped visibility for activity-log reads.
//!
//! Evaluated in table order, first match wins; roles with no entry see only
//! their own entries. Independently of role, only `created`, `updated` and
//! `deleted` actions are ever listed.

use crate::auth::Identity;
use crate::database::SelectQuery;
use crate::types::Role;

pub const VISIBLE_ACTIONS: &[&str] = &["created", "updated", "deleted"];

pub const HEALTH_ENTITY_TYPES: &[&str] = &[
    "resident",
    "household",
    "death_record",
    "medical_referral",
    "maternal_health",
    "child_immunization",
];

pub const COUNCILOR_ENTITY_TYPES: &[&str] = &["blotter", "complaint", "logbook"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    EntityTypes(&'static [&'static str]),
    Everything,
}

const ROLE_SCOPES: &[(Role, Scope)] = &[
    (Role::BarangayHealthWorker, Scope::EntityTypes(HEALTH_ENTITY_TYPES)),
    (Role::BarangayCouncilor, Scope::EntityTypes(COUNCILOR_ENTITY_TYPES)),
    (Role::BarangayCaptain, Scope::Everything),
    (Role::Admin, Scope::Everything),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    EntityTypes(&'static [&'static str]),
    OwnEntries(i64),
}

pub fn visibility_for(identity: &Identity) -> Visibility {
    let scope = ROLE_SCOPES
        .iter()
        .find(|(role, _)| *role == identity.role)
        .map(|(_, scope)| *scope);

    match scope {
        Some(Scope::EntityTypes(types)) => Visibility::EntityTypes(types),
        Some(Scope::Everything) => Visibility::All,
        None => Visibility::OwnEntries(identity.user_id),
    }
}

impl Visibility {
    /// Narrow an activity-log query (aliased `alias`) to what the caller may see.
    pub fn apply(&self, query: &mut SelectQuery, alias: &str) {
        match self {
            Visibility::All => {}
            Visibility::EntityTypes(types) => {
                query.in_list(&format!("{}.entity_type", alias), types);
            }
            Visibility::OwnEntries(user_id) => {
                query.eq(&format!("{}.user_id", alias), *user_id);
            }
        }
        query.in_list(&format!("{}.action", alias), VISIBLE_ACTIONS);
    }

    pub fn permits(&self, action: &str, entity_type: &str, actor: Option<i64>) -> bool {
        if !VISIBLE_ACTIONS.contains(&action) {
            return false;
        }
        match self {
            Visibility::All => true,
            Visibility::EntityTypes(types) => types.contains(&entity_type),
            Visibility::OwnEntries(user_id) => actor == Some(*user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: i64, role: &str) -> Identity {
        let role = Role::parse(role);
        Identity {
            user_id,
            username: format!("user{}", user_id),
            dashboard_url: role.dashboard_url(),
            role,
        }
    }

    // (action, entity_type, actor)
    const ROWS: &[(&str, &str, i64)] = &[
        ("created", "resident", 1),
        ("updated", "household", 2),
        ("deleted", "complaint", 3),
        ("created", "blotter", 1),
        ("created", "certificate_request", 4),
        ("updated", "official", 5),
        ("login", "user", 5),
        ("restored", "resident", 1),
        ("created", "maternal_health", 2),
        ("created", "logbook", 5),
    ];

    fn visible(identity: &Identity) -> Vec<(&'static str, &'static str, i64)> {
        let v = visibility_for(identity);
        ROWS.iter()
            .copied()
            .filter(|(action, et, actor)| v.permits(action, et, Some(*actor)))
            .collect()
    }

    #[test]
    fn health_worker_sees_only_health_entities() {
        let rows = visible(&identity(9, "barangay_health_worker"));
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|(_, et, _)| HEALTH_ENTITY_TYPES.contains(et)));
    }

    #[test]
    fn councilor_sees_incident_entities() {
        let rows = visible(&identity(9, "barangay_councilor"));
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|(_, et, _)| COUNCILOR_ENTITY_TYPES.contains(et)));
    }

    #[test]
    fn plain_role_sees_only_own_rows() {
        let rows = visible(&identity(5, "barangay_secretary"));
        assert_eq!(rows, vec![("updated", "official", 5), ("created", "logbook", 5)]);
        assert!(visible(&identity(77, "clerk")).is_empty());
    }

    #[test]
    fn admin_sees_all_mutations_but_no_other_actions() {
        let rows = visible(&identity(1, "admin"));
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|(a, _, _)| VISIBLE_ACTIONS.contains(a)));
        assert_eq!(visibility_for(&identity(1, "barangay_captain")), Visibility::All);
    }

    #[test]
    fn apply_adds_scope_then_action_filter() {
        let mut q = SelectQuery::new("a.*", "activity_logs a");
        visibility_for(&identity(3, "barangay_councilor")).apply(&mut q, "a");
        let sql = q.to_sql();
        assert_eq!(
            sql.query,
            "SELECT a.* FROM activity_logs a WHERE a.entity_type IN ($1, $2, $3) AND a.action IN ($4, $5, $6)"
        );

        let mut own = SelectQuery::new("a.*", "activity_logs a");
        visibility_for(&identity(3, "barangay_treasurer")).apply(&mut own, "a");
        assert!(own.to_sql().query.contains("a.user_id = $1"));
    }
}
