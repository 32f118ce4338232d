//! Declarative entity registry.
//!
//! Each CRUD resource is described once by an [`EntityDef`]: its table, writable
//! fields and their SQL kinds, required fields, list filters, audit label and
//! reference checks. The generic operations in [`crud`] serve any definition;
//! resources with extra rules reuse the same pieces from their own handlers.

pub mod catalog;
pub mod crud;
pub mod entity;
pub mod fields;

pub use entity::{filter, insert_sql, update_sql, EntityDef, Filter, Guard};
pub use fields::{Field, FieldKind};
