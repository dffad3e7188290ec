//! Application value to bindable parameter coercion.

use serde_json::Value;

use crate::statement::Dialect;

/// A single row, keyed by field name.
pub type Row = serde_json::Map<String, Value>;

/// A value accepted by the positional parameter binder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Coerce an application-level value into a bindable parameter.
///
/// Primitives pass through. Compound values serialize to their JSON
/// text so they can occupy a single text column. Integers outside the
/// i64 range are rendered as decimal strings. Booleans stay booleans on
/// dialects with a native boolean type and normalize to 0/1 elsewhere.
/// Never fails; anything unrepresentable binds as null.
pub fn to_bindable(value: &Value, dialect: Dialect) -> BindValue {
    match value {
        Value::Null => BindValue::Null,
        Value::Bool(b) => {
            if dialect.native_bool() {
                BindValue::Bool(*b)
            } else {
                BindValue::Int(i64::from(*b))
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BindValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                // Exceeds the signed 64-bit range.
                BindValue::Text(u.to_string())
            } else if let Some(f) = n.as_f64() {
                BindValue::Float(f)
            } else {
                BindValue::Null
            }
        }
        Value::String(s) => BindValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => BindValue::Text(value.to_string()),
    }
}
