pub mod age_bands;
pub mod certificates;
pub mod mail;
pub mod notifications;
pub mod reference;
pub mod uploads;

pub use mail::{build_mailer, Mailer, OutgoingEmail};
pub use reference::{ReferenceFormat, BLOTTER_NUMBER, COMPLAINT_NUMBER, HOUSEHOLD_NUMBER};
pub use uploads::{UploadCategory, UploadError, UploadStore};
