//! Declarative resource definitions. Most are served entirely by the generic
//! CRUD operations; the rest reuse their list and lookup plumbing.

use super::entity::{filter, EntityDef, Filter, Guard};
use super::fields::{date, decimal, flag, int, text, time, timestamp, FieldKind};
use crate::audit::{LabelQuery, RESIDENT_NAME_SQL};
use crate::database::SortDirection::{Asc, Desc};
use crate::services::{BLOTTER_NUMBER, COMPLAINT_NUMBER};

pub const COMPLAINT_STATUSES: &[&str] = &["filed", "under_investigation", "for_mediation", "resolved", "dismissed"];
pub const BLOTTER_STATUSES: &[&str] = &["recorded", "under_investigation", "settled", "referred", "closed"];

const ACTIVE_RESIDENT: &[Guard] = &[Guard::ActiveResident { field: "resident_id" }];
const BY_RESIDENT: Filter = filter("resident_id", "x.resident_id", FieldKind::Integer);

pub const COMPLAINTS: EntityDef = EntityDef {
    entity_type: "complaint",
    path: "complaints",
    display: "Complaint",
    table: "complaints",
    id_column: "complaint_id",
    select: "c.*, cc.name AS category_name",
    from: "complaints c LEFT JOIN complaint_categories cc ON cc.category_id = c.category_id",
    qualified_id: "c.complaint_id",
    fields: &[
        int("complainant_resident_id"),
        text("complainant_name"),
        text("complainant_contact"),
        text("respondent_name"),
        text("respondent_address"),
        int("category_id"),
        date("incident_date"),
        text("incident_location"),
        text("description"),
        text("remarks"),
    ],
    required: &["complainant_name", "description"],
    search: &["c.complaint_number", "c.complainant_name", "c.respondent_name", "c.description"],
    filters: &[
        filter("status", "c.status", FieldKind::Text),
        filter("category_id", "c.category_id", FieldKind::Integer),
    ],
    date_column: Some("c.created_at"),
    order_by: ("c.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("complaints", "complaint_id", "complaint_number"),
    guards: &[
        Guard::Exists {
            field: "complainant_resident_id",
            table: "residents",
            id_column: "resident_id",
            what: "Complainant resident",
        },
        Guard::Exists {
            field: "category_id",
            table: "complaint_categories",
            id_column: "category_id",
            what: "Complaint category",
        },
    ],
    reference: Some(COMPLAINT_NUMBER),
    statuses: Some(COMPLAINT_STATUSES),
    touches_updated_at: true,
    notifiable: true,
};

pub const BLOTTER: EntityDef = EntityDef {
    entity_type: "blotter",
    path: "blotter",
    display: "Blotter record",
    table: "blotter_records",
    id_column: "blotter_id",
    select: "b.*, c.complaint_number",
    from: "blotter_records b LEFT JOIN complaints c ON c.complaint_id = b.complaint_id",
    qualified_id: "b.blotter_id",
    fields: &[
        int("complaint_id"),
        text("incident_type"),
        date("incident_date"),
        text("incident_location"),
        text("complainant_name"),
        text("respondent_name"),
        text("narrative"),
        text("action_taken"),
    ],
    required: &["incident_type", "incident_date"],
    search: &["b.blotter_number", "b.incident_type", "b.complainant_name", "b.respondent_name"],
    filters: &[
        filter("status", "b.status", FieldKind::Text),
        filter("complaint_id", "b.complaint_id", FieldKind::Integer),
    ],
    date_column: Some("b.incident_date"),
    order_by: ("b.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("blotter_records", "blotter_id", "blotter_number"),
    guards: &[Guard::Exists {
        field: "complaint_id",
        table: "complaints",
        id_column: "complaint_id",
        what: "Complaint",
    }],
    reference: Some(BLOTTER_NUMBER),
    statuses: Some(BLOTTER_STATUSES),
    touches_updated_at: true,
    notifiable: true,
};

pub const COMPLAINT_CATEGORIES: EntityDef = EntityDef {
    entity_type: "complaint_category",
    path: "complaint-categories",
    display: "Complaint category",
    table: "complaint_categories",
    id_column: "category_id",
    select: "cc.*",
    from: "complaint_categories cc",
    qualified_id: "cc.category_id",
    fields: &[text("name"), text("description")],
    required: &["name"],
    search: &["cc.name"],
    filters: &[],
    date_column: None,
    order_by: ("cc.name", Asc),
    list_limit: 500,
    label: LabelQuery::new("complaint_categories", "category_id", "name"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const HEALTH_RECORDS: EntityDef = EntityDef {
    entity_type: "health_record",
    path: "health-records",
    display: "Health record",
    table: "health_records",
    id_column: "record_id",
    select: concat!("x.*, ", crate::resident_name_sql!(), " AS resident_name"),
    from: "health_records x JOIN residents r ON r.resident_id = x.resident_id",
    qualified_id: "x.record_id",
    fields: &[
        int("resident_id"),
        date("checkup_date"),
        text("blood_pressure"),
        decimal("temperature"),
        decimal("weight_kg"),
        decimal("height_cm"),
        text("diagnosis"),
        text("treatment"),
        text("notes"),
    ],
    required: &["resident_id", "checkup_date"],
    search: &["r.first_name", "r.last_name", "x.diagnosis"],
    filters: &[BY_RESIDENT],
    date_column: Some("x.checkup_date"),
    order_by: ("x.checkup_date", Desc),
    list_limit: 200,
    label: LabelQuery::new(
        "health_records x JOIN residents r ON r.resident_id = x.resident_id",
        "x.record_id",
        RESIDENT_NAME_SQL,
    ),
    guards: ACTIVE_RESIDENT,
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const MATERNAL_HEALTH: EntityDef = EntityDef {
    entity_type: "maternal_health",
    path: "maternal-health",
    display: "Maternal health record",
    table: "maternal_health_records",
    id_column: "record_id",
    select: concat!("x.*, ", crate::resident_name_sql!(), " AS resident_name"),
    from: "maternal_health_records x JOIN residents r ON r.resident_id = x.resident_id",
    qualified_id: "x.record_id",
    fields: &[
        int("resident_id"),
        text("pregnancy_status"),
        date("last_menstrual_date"),
        date("expected_due_date"),
        int("prenatal_visits").or("0"),
        text("risk_level"),
        text("notes"),
    ],
    required: &["resident_id", "pregnancy_status"],
    search: &["r.first_name", "r.last_name"],
    filters: &[
        BY_RESIDENT,
        filter("risk_level", "x.risk_level", FieldKind::Text),
        filter("pregnancy_status", "x.pregnancy_status", FieldKind::Text),
    ],
    date_column: Some("x.created_at"),
    order_by: ("x.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new(
        "maternal_health_records x JOIN residents r ON r.resident_id = x.resident_id",
        "x.record_id",
        RESIDENT_NAME_SQL,
    ),
    guards: ACTIVE_RESIDENT,
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const CHILD_IMMUNIZATIONS: EntityDef = EntityDef {
    entity_type: "child_immunization",
    path: "child-immunizations",
    display: "Immunization record",
    table: "child_immunizations",
    id_column: "record_id",
    select: concat!("x.*, ", crate::resident_name_sql!(), " AS resident_name"),
    from: "child_immunizations x JOIN residents r ON r.resident_id = x.resident_id",
    qualified_id: "x.record_id",
    fields: &[
        int("resident_id"),
        text("vaccine_name"),
        int("dose_number"),
        date("date_given"),
        date("next_due_date"),
        text("administered_by"),
        text("notes"),
    ],
    required: &["resident_id", "vaccine_name", "date_given"],
    search: &["r.first_name", "r.last_name", "x.vaccine_name"],
    filters: &[BY_RESIDENT, filter("vaccine_name", "x.vaccine_name", FieldKind::Text)],
    date_column: Some("x.date_given"),
    order_by: ("x.date_given", Desc),
    list_limit: 200,
    label: LabelQuery::new(
        "child_immunizations x JOIN residents r ON r.resident_id = x.resident_id",
        "x.record_id",
        RESIDENT_NAME_SQL,
    ),
    guards: ACTIVE_RESIDENT,
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const MEDICAL_REFERRALS: EntityDef = EntityDef {
    entity_type: "medical_referral",
    path: "medical-referrals",
    display: "Medical referral",
    table: "medical_referrals",
    id_column: "referral_id",
    select: concat!("x.*, ", crate::resident_name_sql!(), " AS resident_name"),
    from: "medical_referrals x JOIN residents r ON r.resident_id = x.resident_id",
    qualified_id: "x.referral_id",
    fields: &[
        int("resident_id"),
        date("referral_date"),
        text("referred_to"),
        text("reason"),
        text("status").or("'pending'"),
        text("notes"),
    ],
    required: &["resident_id", "referral_date", "referred_to"],
    search: &["r.first_name", "r.last_name", "x.referred_to", "x.reason"],
    filters: &[BY_RESIDENT, filter("status", "x.status", FieldKind::Text)],
    date_column: Some("x.referral_date"),
    order_by: ("x.referral_date", Desc),
    list_limit: 200,
    label: LabelQuery::new(
        "medical_referrals x JOIN residents r ON r.resident_id = x.resident_id",
        "x.referral_id",
        RESIDENT_NAME_SQL,
    ),
    guards: ACTIVE_RESIDENT,
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const LOGBOOK: EntityDef = EntityDef {
    entity_type: "logbook",
    path: "logbook",
    display: "Logbook entry",
    table: "logbook_visits",
    id_column: "visit_id",
    select: "l.*",
    from: "logbook_visits l",
    qualified_id: "l.visit_id",
    fields: &[
        text("visitor_name"),
        text("purpose"),
        text("person_to_visit"),
        date("visit_date").or("CURRENT_DATE"),
        time("time_in"),
        time("time_out"),
        text("remarks"),
    ],
    required: &["visitor_name", "purpose"],
    search: &["l.visitor_name", "l.purpose", "l.person_to_visit"],
    filters: &[],
    date_column: Some("l.visit_date"),
    order_by: ("l.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("logbook_visits", "visit_id", "visitor_name"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const PROJECTS: EntityDef = EntityDef {
    entity_type: "project",
    path: "projects",
    display: "Project",
    table: "projects",
    id_column: "project_id",
    select: "p.*",
    from: "projects p",
    qualified_id: "p.project_id",
    fields: &[
        text("title"),
        text("description"),
        decimal("budget"),
        date("start_date"),
        date("end_date"),
        text("status").or("'planned'"),
        flag("is_public", true),
    ],
    required: &["title"],
    search: &["p.title", "p.description"],
    filters: &[filter("status", "p.status", FieldKind::Text)],
    date_column: Some("p.start_date"),
    order_by: ("p.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("projects", "project_id", "title"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const ANNOUNCEMENTS: EntityDef = EntityDef {
    entity_type: "announcement",
    path: "announcements",
    display: "Announcement",
    table: "announcements",
    id_column: "announcement_id",
    select: "a.*",
    from: "announcements a",
    qualified_id: "a.announcement_id",
    fields: &[
        text("title"),
        text("content"),
        text("category"),
        flag("is_published", false),
        timestamp("published_at"),
    ],
    required: &["title", "content"],
    search: &["a.title", "a.content"],
    filters: &[
        filter("category", "a.category", FieldKind::Text),
        filter("is_published", "a.is_published", FieldKind::Boolean),
    ],
    date_column: Some("a.created_at"),
    order_by: ("a.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("announcements", "announcement_id", "title"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const EVENTS: EntityDef = EntityDef {
    entity_type: "event",
    path: "events",
    display: "Event",
    table: "events",
    id_column: "event_id",
    select: "e.*",
    from: "events e",
    qualified_id: "e.event_id",
    fields: &[
        text("title"),
        text("description"),
        date("event_date"),
        time("start_time"),
        text("location"),
    ],
    required: &["title", "event_date"],
    search: &["e.title", "e.location"],
    filters: &[],
    date_column: Some("e.event_date"),
    order_by: ("e.event_date", Desc),
    list_limit: 200,
    label: LabelQuery::new("events", "event_id", "title"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const SPOT_MAPS: EntityDef = EntityDef {
    entity_type: "spot_map",
    path: "spot-maps",
    display: "Spot map",
    table: "spot_maps",
    id_column: "spot_map_id",
    select: "s.*",
    from: "spot_maps s",
    qualified_id: "s.spot_map_id",
    fields: &[text("title"), text("description"), text("purok"), text("image_url")],
    required: &["title", "image_url"],
    search: &["s.title", "s.description"],
    filters: &[filter("purok", "s.purok", FieldKind::Text)],
    date_column: None,
    order_by: ("s.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("spot_maps", "spot_map_id", "title"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const BARANGAY_HISTORY: EntityDef = EntityDef {
    entity_type: "barangay_history",
    path: "barangay-history",
    display: "History entry",
    table: "barangay_history",
    id_column: "history_id",
    select: "bh.*",
    from: "barangay_history bh",
    qualified_id: "bh.history_id",
    fields: &[text("title"), text("content"), text("document_url")],
    required: &["title"],
    search: &["bh.title"],
    filters: &[],
    date_column: None,
    order_by: ("bh.created_at", Desc),
    list_limit: 200,
    label: LabelQuery::new("barangay_history", "history_id", "title"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub static GENERIC: &[&EntityDef] = &[
    &COMPLAINTS,
    &BLOTTER,
    &COMPLAINT_CATEGORIES,
    &HEALTH_RECORDS,
    &MATERNAL_HEALTH,
    &CHILD_IMMUNIZATIONS,
    &MEDICAL_REFERRALS,
    &LOGBOOK,
    &PROJECTS,
    &ANNOUNCEMENTS,
    &EVENTS,
    &SPOT_MAPS,
    &BARANGAY_HISTORY,
];

// Resources with bespoke write rules. Their list/get/label plumbing still
// goes through the generic pieces.

pub const REQUEST_STATUSES: &[&str] = &["pending", "processing", "approved", "rejected", "released", "cancelled"];

pub const USERS: EntityDef = EntityDef {
    entity_type: "user",
    path: "users",
    display: "User",
    table: "users",
    id_column: "user_id",
    select: "u.user_id, u.username, u.full_name, u.email, u.role, u.photo_url, u.is_active, u.created_at, u.updated_at",
    from: "users u",
    qualified_id: "u.user_id",
    fields: &[text("username"), text("full_name"), text("email"), text("photo_url")],
    required: &["username", "full_name"],
    search: &["u.username", "u.full_name", "u.email"],
    filters: &[
        filter("role", "u.role", FieldKind::Text),
        filter("is_active", "u.is_active", FieldKind::Boolean),
    ],
    date_column: None,
    order_by: ("u.created_at", Desc),
    list_limit: 500,
    label: LabelQuery::new("users", "user_id", "username"),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: true,
    notifiable: false,
};

pub const RESIDENTS: EntityDef = EntityDef {
    entity_type: "resident",
    path: "residents",
    display: "Resident",
    table: "residents",
    id_column: "resident_id",
    select: concat!(
        "r.*, h.household_number, ",
        crate::resident_name_sql!(),
        " AS full_name, EXTRACT(YEAR FROM AGE(CURRENT_DATE, r.date_of_birth))::int AS age"
    ),
    from: "residents r LEFT JOIN households h ON h.household_id = r.household_id",
    qualified_id: "r.resident_id",
    fields: &[
        text("first_name"),
        text("middle_name"),
        text("last_name"),
        text("suffix"),
        date("date_of_birth"),
        text("place_of_birth"),
        text("gender"),
        text("civil_status"),
        text("purok"),
        text("address"),
        text("contact_number"),
        text("email"),
        text("occupation"),
        text("religion"),
        text("photo_url"),
        flag("is_4ps", false),
        flag("is_registered_voter", false),
        flag("is_pwd", false),
        flag("is_senior_citizen", false),
        int("household_id"),
    ],
    required: &["first_name", "last_name", "date_of_birth", "gender", "civil_status", "purok"],
    search: &["r.first_name", "r.middle_name", "r.last_name", "r.contact_number", "r.address"],
    filters: &[
        filter("purok", "r.purok", FieldKind::Text),
        filter("gender", "r.gender", FieldKind::Text),
        filter("civil_status", "r.civil_status", FieldKind::Text),
        filter("household_id", "r.household_id", FieldKind::Integer),
        filter("is_4ps", "r.is_4ps", FieldKind::Boolean),
        filter("is_registered_voter", "r.is_registered_voter", FieldKind::Boolean),
        filter("is_pwd", "r.is_pwd", FieldKind::Boolean),
        filter("is_senior_citizen", "r.is_senior_citizen", FieldKind::Boolean),
    ],
    date_column: Some("r.created_at"),
    order_by: ("r.created_at", Desc),
    list_limit: 50,
    label: LabelQuery::new("residents r", "r.resident_id", RESIDENT_NAME_SQL),
    guards: &[Guard::Exists {
        field: "household_id",
        table: "households",
        id_column: "household_id",
        what: "Household",
    }],
    reference: None,
    statuses: None,
    touches_updated_at: true,
    notifiable: false,
};

pub const HOUSEHOLDS: EntityDef = EntityDef {
    entity_type: "household",
    path: "households",
    display: "Household",
    table: "households",
    id_column: "household_id",
    select: "h.*, (SELECT COUNT(*) FROM residents m WHERE m.household_id = h.household_id AND m.is_active) AS member_count",
    from: "households h",
    qualified_id: "h.household_id",
    // head_name follows head_resident_id and is written only when the head is set.
    fields: &[text("address"), text("purok"), text("contact_number")],
    required: &["purok"],
    search: &["h.household_number", "h.head_name", "h.address"],
    filters: &[filter("purok", "h.purok", FieldKind::Text)],
    date_column: Some("h.created_at"),
    order_by: ("h.created_at", Desc),
    list_limit: 500,
    label: LabelQuery::new("households", "household_id", "household_number"),
    guards: &[],
    reference: Some(crate::services::HOUSEHOLD_NUMBER),
    statuses: None,
    touches_updated_at: true,
    notifiable: false,
};

pub const DEATHS: EntityDef = EntityDef {
    entity_type: "death_record",
    path: "deaths",
    display: "Death record",
    table: "death_records",
    id_column: "death_id",
    select: concat!("x.*, ", crate::resident_name_sql!(), " AS resident_name, r.purok"),
    from: "death_records x JOIN residents r ON r.resident_id = x.resident_id",
    qualified_id: "x.death_id",
    fields: &[
        int("resident_id"),
        date("date_of_death"),
        text("cause_of_death"),
        text("place_of_death"),
        text("remarks"),
    ],
    required: &["resident_id", "date_of_death"],
    search: &["r.first_name", "r.last_name", "x.cause_of_death"],
    filters: &[filter("purok", "r.purok", FieldKind::Text)],
    date_column: Some("x.date_of_death"),
    order_by: ("x.date_of_death", Desc),
    list_limit: 200,
    label: LabelQuery::new(
        "death_records x JOIN residents r ON r.resident_id = x.resident_id",
        "x.death_id",
        RESIDENT_NAME_SQL,
    ),
    guards: &[],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

pub const OFFICIALS: EntityDef = EntityDef {
    entity_type: "official",
    path: "officials",
    display: "Official",
    table: "officials",
    id_column: "official_id",
    select: "o.*, p.title AS position_title, p.sort_order",
    from: "officials o JOIN official_positions p ON p.position_id = o.position_id",
    qualified_id: "o.official_id",
    fields: &[
        text("full_name"),
        int("resident_id"),
        int("position_id"),
        int("term_start"),
        int("term_end"),
        text("contact_number"),
        text("photo_url"),
        text("committee"),
    ],
    required: &["full_name", "position_id", "term_start", "term_end"],
    search: &["o.full_name", "o.committee"],
    filters: &[filter("position_id", "o.position_id", FieldKind::Integer)],
    date_column: None,
    order_by: ("p.sort_order", Asc),
    list_limit: 200,
    label: LabelQuery::new("officials", "official_id", "full_name"),
    guards: &[Guard::Exists {
        field: "resident_id",
        table: "residents",
        id_column: "resident_id",
        what: "Resident",
    }],
    reference: None,
    statuses: None,
    touches_updated_at: false,
    notifiable: false,
};

macro_rules! requester_case {
    ($detail:literal, $resident:expr) => {
        concat!(
            "CASE WHEN cr.requester_type = 'non-resident' THEN prd.",
            $detail,
            " ELSE ",
            $resident,
            " END"
        )
    };
}

const REQUEST_FROM: &str = "certificate_requests cr \
    JOIN certificate_types ct ON ct.cert_type_id = cr.cert_type_id \
    LEFT JOIN residents r ON r.resident_id = cr.resident_id \
    LEFT JOIN public_request_details prd ON prd.certificate_request_id = cr.request_id";

/// Merged request view: non-resident contact fields come only from the detail row.
pub const REQUESTS: EntityDef = EntityDef {
    entity_type: "certificate_request",
    path: "requests",
    display: "Certificate request",
    table: "certificate_requests",
    id_column: "request_id",
    select: concat!(
        "cr.*, ct.name AS certificate_type, ct.fee, r.purok, ",
        requester_case!("requester_name", crate::resident_name_sql!()),
        " AS requester_name, ",
        requester_case!("contact_number", "r.contact_number"),
        " AS contact_number, ",
        requester_case!("email", "r.email"),
        " AS email, ",
        requester_case!("address", "r.address"),
        " AS address"
    ),
    from: REQUEST_FROM,
    qualified_id: "cr.request_id",
    fields: &[int("resident_id"), text("requester_type"), int("cert_type_id"), text("purpose")],
    required: &["cert_type_id", "purpose"],
    search: &["prd.requester_name", "r.first_name", "r.last_name", "ct.name", "cr.purpose"],
    filters: &[
        filter("status", "cr.status", FieldKind::Text),
        filter("requester_type", "cr.requester_type", FieldKind::Text),
        filter("cert_type_id", "cr.cert_type_id", FieldKind::Integer),
        filter("resident_id", "cr.resident_id", FieldKind::Integer),
    ],
    date_column: Some("cr.request_date"),
    order_by: ("cr.request_date", Desc),
    list_limit: 200,
    label: LabelQuery::new(
        REQUEST_FROM,
        "cr.request_id",
        concat!(
            "CONCAT(ct.name, ' - ', ",
            requester_case!("requester_name", crate::resident_name_sql!()),
            ")"
        ),
    ),
    guards: &[],
    reference: None,
    statuses: Some(REQUEST_STATUSES),
    touches_updated_at: false,
    notifiable: true,
};
