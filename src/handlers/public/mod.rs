// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition plus the read-only public records and the walk-in
// certificate intake. This list is deliberately short.

pub mod login;
pub mod portal;

pub use login::login as auth_login;
