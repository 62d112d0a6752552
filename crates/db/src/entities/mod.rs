//! `SeaORM` entities.
//!
//! `tenants` lives in the `public` schema. Every other table exists once per
//! tenant schema and is resolved through `search_path`, see [`crate::scope`].

pub mod accounts;
pub mod cost_centers;
pub mod journal_entries;
pub mod journal_entry_lines;
pub mod tenants;
