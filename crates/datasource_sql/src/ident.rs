//! Field naming conventions.
//!
//! Application code refers to fields in camelCase while columns are
//! stored in snake_case. Conversion is pluggable: callers can disable
//! it with [`Identity`] or supply their own [`IdentStyle`].

use crate::value::Row;

/// Bidirectional mapping between application-side field names and
/// storage-side column identifiers.
pub trait IdentStyle: Send + Sync {
    /// Application convention -> stored column identifier.
    fn to_storage(&self, name: &str) -> String;

    /// Stored column identifier -> application convention.
    fn to_application(&self, name: &str) -> String;

    /// Rewrite every key of a row from storage to application convention.
    fn normalize_row(&self, row: Row) -> Row {
        row.into_iter()
            .map(|(k, v)| (self.to_application(&k), v))
            .collect()
    }
}

/// Default convention: camelCase field names, snake_case columns.
///
/// `to_storage` and `to_application` are exact inverses for identifiers
/// made of ASCII letters and digits whose word boundaries are marked by
/// capitalization (application side) or underscores (storage side).
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCase;

impl IdentStyle for SnakeCase {
    fn to_storage(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        for c in name.chars() {
            if c.is_ascii_uppercase() {
                out.push('_');
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    fn to_application(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut upper_next = false;
        for c in name.chars() {
            if c == '_' {
                upper_next = true;
            } else if upper_next {
                out.push(c.to_ascii_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Conversion disabled; names pass through unchanged both ways.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl IdentStyle for Identity {
    fn to_storage(&self, name: &str) -> String {
        name.to_string()
    }

    fn to_application(&self, name: &str) -> String {
        name.to_string()
    }
}
