/// State management module
///
/// This module holds the data model and everything that outlives a single page
/// request:
/// - Field-name resolution for gallery payloads (fields.rs)
/// - Items, pages and favorites payloads (data.rs)
/// - Filter vocabulary and predicates (filters.rs)
/// - SQLite-backed durable key-value store (durable.rs)
/// - Two-tier surface state with debounced scroll writes (persistence.rs)

pub mod fields;
pub mod data;
pub mod filters;
pub mod durable;
pub mod persistence;
