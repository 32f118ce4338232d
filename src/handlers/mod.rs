// handlers/mod.rs - Two-tier handler layout
//
// Public (no credential) -> Protected (bearer JWT, /api/*)

pub mod protected;
pub mod public;
