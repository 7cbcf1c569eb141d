//! Tenant identifier sanitization.
//!
//! Instance identifiers are chosen by the tenant and may contain anything.
//! The derived database and role names must be safe, unquoted PostgreSQL
//! identifiers, so everything outside `[A-Za-z0-9_]` is dropped and the
//! rest is lower-cased.
//!
//! No length cap is applied here; PostgreSQL truncates identifiers longer
//! than `NAMEDATALEN - 1` bytes on its own.

/// Prefix of the database derived from an instance identifier.
pub const DATABASE_PREFIX: &str = "d";

/// Prefix of the owning role derived from an instance identifier.
pub const ROLE_PREFIX: &str = "u";

/// Strip every character outside `[A-Za-z0-9_]` and lower-case the rest.
///
/// Pure and total: an empty or fully invalid input yields an empty string,
/// which callers must reject before using it as a name.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Database name owned by the instance with the given identifier.
pub fn database_name(instance_id: &str) -> String {
    format!("{DATABASE_PREFIX}{}", sanitize(instance_id))
}

/// Role name owning the database of the instance with the given identifier.
pub fn role_name(instance_id: &str) -> String {
    format!("{ROLE_PREFIX}{}", sanitize(instance_id))
}
