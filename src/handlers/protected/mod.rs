// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Everything under /api except login and the public portal. The JWT
// middleware has already put the caller's Identity into request extensions.

pub mod activity;
pub mod dashboard;
pub mod deaths;
pub mod households;
pub mod me;
pub mod notifications;
pub mod officials;
pub mod records;
pub mod reports;
pub mod requests;
pub mod residents;
pub mod uploads;
pub mod users;

pub use me::me as auth_me;
