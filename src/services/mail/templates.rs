use super::OutgoingEmail;

/// Certificate type name -> documents to bring on pickup.
const REQUIREMENTS: &[(&str, &[&str])] = &[
    (
        "Barangay Clearance",
        &["Valid government-issued ID", "Community Tax Certificate (Cedula)", "Proof of residency"],
    ),
    (
        "Certificate of Residency",
        &["Valid government-issued ID", "Proof of address (e.g. utility bill)"],
    ),
    (
        "Certificate of Indigency",
        &["Valid government-issued ID", "Letter stating the purpose of the request"],
    ),
    (
        "Business Clearance",
        &[
            "DTI or SEC registration",
            "Valid ID of the business owner",
            "Lease contract or proof of business address",
            "Previous business clearance, if renewing",
        ],
    ),
    (
        "First Time Job Seeker",
        &[
            "Valid government-issued ID",
            "Signed Oath of Undertaking",
            "Proof of residency of at least six months",
        ],
    ),
];

const GENERIC_REQUIREMENTS: &[&str] = &["Valid government-issued ID", "Payment of applicable fees"];

pub fn requirements_for(certificate_type: &str) -> &'static [&'static str] {
    REQUIREMENTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(certificate_type.trim()))
        .map(|(_, reqs)| *reqs)
        .unwrap_or(GENERIC_REQUIREMENTS)
}

/// Everything a status email needs, read from the merged request view.
#[derive(Debug, Clone)]
pub struct CertificateNotice {
    pub request_id: i64,
    pub requester_name: String,
    pub email: String,
    pub certificate_type: String,
    pub purpose: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub pickup_date: Option<String>,
}

/// Compose the notification for a new status; only `approved` and `rejected` notify.
pub fn certificate_status_email(notice: &CertificateNotice, office_hours: &str) -> Option<OutgoingEmail> {
    let name = escape(&notice.requester_name);
    let cert = escape(&notice.certificate_type);

    let (subject, html_body, text_body) = match notice.status.as_str() {
        "approved" => {
            let reqs = requirements_for(&notice.certificate_type);
            let pickup = notice
                .pickup_date
                .as_deref()
                .map(|d| format!("on or after {}", d))
                .unwrap_or_else(|| "at your earliest convenience".to_string());
            let items: String = reqs.iter().map(|r| format!("<li>{}</li>", escape(r))).collect();
            let text_items: String = reqs.iter().map(|r| format!("  - {}\n", r)).collect();
            (
                format!("Your {} request has been approved", notice.certificate_type),
                format!(
                    "<p>Dear {name},</p>\
                     <p>Your request for a <strong>{cert}</strong> (reference #{id}) has been approved. \
                     You may claim it at the Barangay Hall {pickup}, during office hours ({hours}).</p>\
                     <p>Please bring the following:</p><ul>{items}</ul>",
                    name = name,
                    cert = cert,
                    id = notice.request_id,
                    pickup = escape(&pickup),
                    hours = escape(office_hours),
                    items = items,
                ),
                format!(
                    "Dear {},\n\nYour request for a {} (reference #{}) has been approved. \
                     You may claim it at the Barangay Hall {}, during office hours ({}).\n\n\
                     Please bring the following:\n{}",
                    notice.requester_name,
                    notice.certificate_type,
                    notice.request_id,
                    pickup,
                    office_hours,
                    text_items
                ),
            )
        }
        "rejected" => {
            let reason = notice
                .rejection_reason
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or("No reason was provided.");
            (
                format!("Update on your {} request", notice.certificate_type),
                format!(
                    "<p>Dear {name},</p>\
                     <p>We regret to inform you that your request for a <strong>{cert}</strong> \
                     (reference #{id}) was not approved.</p>\
                     <p><strong>Reason:</strong> {reason}</p>\
                     <p>You may submit a new request once the issue above is addressed, or visit the \
                     Barangay Hall during office hours ({hours}) for assistance.</p>",
                    name = name,
                    cert = cert,
                    id = notice.request_id,
                    reason = escape(reason),
                    hours = escape(office_hours),
                ),
                format!(
                    "Dear {},\n\nWe regret to inform you that your request for a {} (reference #{}) \
                     was not approved.\n\nReason: {}\n\nYou may submit a new request once the issue \
                     above is addressed, or visit the Barangay Hall during office hours ({}) for assistance.\n",
                    notice.requester_name, notice.certificate_type, notice.request_id, reason, office_hours
                ),
            )
        }
        _ => return None,
    };

    Some(OutgoingEmail {
        to: notice.email.clone(),
        subject,
        html: html_body,
        text: text_body,
    })
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
