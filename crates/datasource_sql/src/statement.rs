//! Statement assembly.
//!
//! Builders compose the compiled filter fragment with projection,
//! sort, pagination, and update clauses, using `?` value markers
//! throughout. A single `finalize` pass renumbers every marker
//! left-to-right into the dialect's positional placeholder, so filter
//! and update parameters share one numbering no matter how the
//! statement was assembled.

use std::fmt::Write;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;
use crate::filter::{compile_filter, Filter};
use crate::ident::IdentStyle;
use crate::value::{to_bindable, BindValue, Row};

/// Target SQL dialect. Controls positional placeholder syntax and
/// whether booleans bind natively or as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub(crate) fn native_bool(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Delimiter-quote a storage identifier so reserved words and mixed
    /// case are safe to use as column or table names.
    pub(crate) fn quote_ident(self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn write_placeholder(self, buf: &mut String, n: usize) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(buf, "${n}"),
            Dialect::Sqlite => {
                buf.push('?');
                Ok(())
            }
        }
    }
}

/// A fully assembled statement ready for the execution boundary.
/// Built fresh per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub values: Vec<BindValue>,
}

/// Sort direction for the single-column ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Options applied to a SELECT. A `None` field omits its clause
/// entirely; in particular unset limit/offset render nothing rather
/// than zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectOptions {
    /// Fields to project, in the given order, de-duplicated. `None`
    /// projects `*`.
    pub projection: Option<Vec<String>>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// One entry of an update descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateOp {
    /// Replace the field with the given value.
    Set(Value),
    /// Add the given amount to the field's current value.
    Increment(Value),
}

impl From<Value> for UpdateOp {
    fn from(value: Value) -> Self {
        UpdateOp::Set(value)
    }
}

/// Ordered field -> update op mapping. Empty descriptors are a no-op;
/// builders return `None` and callers must not issue a statement.
pub type UpdateDoc = IndexMap<String, UpdateOp>;

/// Renumber `?` markers left-to-right into dialect placeholders. Runs
/// once over the fully assembled statement text.
fn finalize(sql: &str, values: Vec<BindValue>, dialect: Dialect) -> Result<CompiledStatement> {
    let mut out = String::with_capacity(sql.len() + values.len() * 2);
    let mut n = 0usize;
    for c in sql.chars() {
        if c == '?' {
            n += 1;
            dialect.write_placeholder(&mut out, n)?;
        } else {
            out.push(c);
        }
    }
    debug_assert_eq!(n, values.len(), "marker count must match bound values");
    Ok(CompiledStatement { sql: out, values })
}

pub fn build_select(
    table: &str,
    filter: Option<&Filter>,
    opts: &SelectOptions,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<CompiledStatement> {
    let projection = match &opts.projection {
        Some(fields) => {
            let mut cols: Vec<String> = Vec::with_capacity(fields.len());
            for field in fields {
                let col = dialect.quote_ident(&idents.to_storage(field));
                if !cols.contains(&col) {
                    cols.push(col);
                }
            }
            cols.join(", ")
        }
        None => "*".to_string(),
    };

    let (predicate, values) = compile_filter(filter, idents, dialect)?;

    let mut sql = format!("SELECT {} FROM {}", projection, dialect.quote_ident(table));
    if !predicate.is_empty() {
        write!(sql, " WHERE {predicate}")?;
    }
    if let Some((field, order)) = &opts.order_by {
        write!(
            sql,
            " ORDER BY {} {}",
            dialect.quote_ident(&idents.to_storage(field)),
            order.as_sql()
        )?;
    }
    if let Some(limit) = opts.limit {
        write!(sql, " LIMIT {limit}")?;
    }
    if let Some(offset) = opts.offset {
        write!(sql, " OFFSET {offset}")?;
    }

    finalize(&sql, values, dialect)
}

/// Build an INSERT for one row. Non-null fields become the column
/// list. A null or absent primary key switches to generated-key mode:
/// the statement gains a `RETURNING` clause for the key and the second
/// tuple element is true. A concrete key is inserted as-is.
pub fn build_insert(
    table: &str,
    row: &Row,
    key_field: &str,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<(CompiledStatement, bool)> {
    let mut cols = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (field, value) in row {
        if value.is_null() {
            continue;
        }
        cols.push(dialect.quote_ident(&idents.to_storage(field)));
        values.push(to_bindable(value, dialect));
    }

    let generated_key = row.get(key_field).map_or(true, Value::is_null);

    let mut sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", dialect.quote_ident(table))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_ident(table),
            cols.join(", "),
            vec!["?"; values.len()].join(", ")
        )
    };
    if generated_key {
        write!(
            sql,
            " RETURNING {}",
            dialect.quote_ident(&idents.to_storage(key_field))
        )?;
    }

    finalize(&sql, values, dialect).map(|stmt| (stmt, generated_key))
}

/// Build an UPDATE for one row keyed by `key_field`. Returns `None`
/// for an empty descriptor.
pub fn build_update(
    table: &str,
    key_field: &str,
    key: &Value,
    update: &UpdateDoc,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<Option<CompiledStatement>> {
    let Some((set_clause, mut values)) = set_clause(update, idents, dialect) else {
        return Ok(None);
    };
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        dialect.quote_ident(table),
        set_clause,
        dialect.quote_ident(&idents.to_storage(key_field))
    );
    values.push(to_bindable(key, dialect));
    finalize(&sql, values, dialect).map(Some)
}

/// Build an UPDATE over a filter-matched row set. Returns `None` for
/// an empty descriptor.
pub fn build_update_many(
    table: &str,
    filter: Option<&Filter>,
    update: &UpdateDoc,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<Option<CompiledStatement>> {
    let Some((set_clause, mut values)) = set_clause(update, idents, dialect) else {
        return Ok(None);
    };
    let (predicate, filter_values) = compile_filter(filter, idents, dialect)?;
    let mut sql = format!("UPDATE {} SET {}", dialect.quote_ident(table), set_clause);
    if !predicate.is_empty() {
        write!(sql, " WHERE {predicate}")?;
    }
    values.extend(filter_values);
    finalize(&sql, values, dialect).map(Some)
}

fn set_clause(
    update: &UpdateDoc,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Option<(String, Vec<BindValue>)> {
    if update.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(update.len());
    let mut values = Vec::with_capacity(update.len());
    for (field, op) in update {
        let col = dialect.quote_ident(&idents.to_storage(field));
        match op {
            UpdateOp::Set(value) => {
                parts.push(format!("{col} = ?"));
                values.push(to_bindable(value, dialect));
            }
            UpdateOp::Increment(value) => {
                parts.push(format!("{col} = {col} + ?"));
                values.push(to_bindable(value, dialect));
            }
        }
    }
    Some((parts.join(", "), values))
}

pub fn build_delete(
    table: &str,
    key_field: &str,
    key: &Value,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<CompiledStatement> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        dialect.quote_ident(table),
        dialect.quote_ident(&idents.to_storage(key_field))
    );
    finalize(&sql, vec![to_bindable(key, dialect)], dialect)
}

pub fn build_delete_many(
    table: &str,
    filter: Option<&Filter>,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<CompiledStatement> {
    let (predicate, values) = compile_filter(filter, idents, dialect)?;
    let mut sql = format!("DELETE FROM {}", dialect.quote_ident(table));
    if !predicate.is_empty() {
        write!(sql, " WHERE {predicate}")?;
    }
    finalize(&sql, values, dialect)
}

pub fn build_count(
    table: &str,
    filter: Option<&Filter>,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<CompiledStatement> {
    let (predicate, values) = compile_filter(filter, idents, dialect)?;
    let mut sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {}",
        dialect.quote_ident(table)
    );
    if !predicate.is_empty() {
        write!(sql, " WHERE {predicate}")?;
    }
    finalize(&sql, values, dialect)
}

pub fn build_sum(
    table: &str,
    field: &str,
    filter: Option<&Filter>,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<CompiledStatement> {
    let (predicate, values) = compile_filter(filter, idents, dialect)?;
    let mut sql = format!(
        "SELECT SUM({}) AS \"sum\" FROM {}",
        dialect.quote_ident(&idents.to_storage(field)),
        dialect.quote_ident(table)
    );
    if !predicate.is_empty() {
        write!(sql, " WHERE {predicate}")?;
    }
    finalize(&sql, values, dialect)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ident::SnakeCase;

    fn eq(field: &str, value: Value) -> Filter {
        Filter::Eq {
            field: field.to_string(),
            value,
        }
    }

    #[test]
    fn select_without_limit_or_offset_omits_both_clauses() {
        let stmt = build_select(
            "users",
            None,
            &SelectOptions::default(),
            &SnakeCase,
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(stmt.sql, r#"SELECT * FROM "users""#);
        assert!(stmt.values.is_empty());
    }

    #[test]
    fn select_renders_explicit_limit_and_zero_offset() {
        let opts = SelectOptions {
            limit: Some(10),
            offset: Some(0),
            ..Default::default()
        };
        let stmt = build_select("users", None, &opts, &SnakeCase, Dialect::Postgres).unwrap();
        assert_eq!(stmt.sql, r#"SELECT * FROM "users" LIMIT 10 OFFSET 0"#);
    }

    #[test]
    fn select_projects_converted_deduplicated_fields_in_order() {
        let opts = SelectOptions {
            projection: Some(vec![
                "firstName".to_string(),
                "age".to_string(),
                "firstName".to_string(),
            ]),
            order_by: Some(("firstName".to_string(), SortOrder::Desc)),
            ..Default::default()
        };
        let stmt = build_select("users", None, &opts, &SnakeCase, Dialect::Postgres).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "first_name", "age" FROM "users" ORDER BY "first_name" DESC"#
        );
    }

    #[test]
    fn select_renumbers_filter_placeholders() {
        let filter = Filter::And(vec![eq("age", json!(5)), eq("name", json!("ada"))]);
        let stmt = build_select(
            "users",
            Some(&filter),
            &SelectOptions::default(),
            &SnakeCase,
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "users" WHERE ("age" = $1) AND ("name" = $2)"#
        );
        assert_eq!(
            stmt.values,
            vec![BindValue::Int(5), BindValue::Text("ada".to_string())]
        );
    }

    #[test]
    fn sqlite_keeps_question_marks() {
        let filter = eq("age", json!(5));
        let stmt = build_select(
            "users",
            Some(&filter),
            &SelectOptions::default(),
            &SnakeCase,
            Dialect::Sqlite,
        )
        .unwrap();
        assert_eq!(stmt.sql, r#"SELECT * FROM "users" WHERE "age" = ?"#);
    }

    #[test]
    fn insert_with_absent_key_returns_generated_key_clause() {
        let mut row = Row::new();
        row.insert("firstName".to_string(), json!("ada"));
        row.insert("age".to_string(), json!(36));
        let (stmt, generated) =
            build_insert("users", &row, "id", &SnakeCase, Dialect::Postgres).unwrap();
        assert!(generated);
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("first_name", "age") VALUES ($1, $2) RETURNING "id""#
        );
        assert_eq!(
            stmt.values,
            vec![BindValue::Text("ada".to_string()), BindValue::Int(36)]
        );
    }

    #[test]
    fn insert_with_null_key_also_uses_generated_key_mode() {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(null));
        row.insert("age".to_string(), json!(36));
        let (stmt, generated) =
            build_insert("users", &row, "id", &SnakeCase, Dialect::Postgres).unwrap();
        assert!(generated);
        // The null key is not part of the column list.
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("age") VALUES ($1) RETURNING "id""#
        );
    }

    #[test]
    fn insert_with_concrete_key_inserts_it_as_is() {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(7));
        row.insert("age".to_string(), json!(36));
        let (stmt, generated) =
            build_insert("users", &row, "id", &SnakeCase, Dialect::Postgres).unwrap();
        assert!(!generated);
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("id", "age") VALUES ($1, $2)"#
        );
    }

    #[test]
    fn empty_update_descriptor_builds_nothing() {
        let update = UpdateDoc::new();
        assert!(build_update(
            "users",
            "id",
            &json!(1),
            &update,
            &SnakeCase,
            Dialect::Postgres
        )
        .unwrap()
        .is_none());
        assert!(
            build_update_many("users", None, &update, &SnakeCase, Dialect::Postgres)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn update_emits_set_and_increment_ops() {
        let mut update = UpdateDoc::new();
        update.insert("firstName".to_string(), UpdateOp::Set(json!("ada")));
        update.insert("loginCount".to_string(), UpdateOp::Increment(json!(1)));
        let stmt = build_update(
            "users",
            "id",
            &json!(7),
            &update,
            &SnakeCase,
            Dialect::Postgres,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "users" SET "first_name" = $1, "login_count" = "login_count" + $2 WHERE "id" = $3"#
        );
        assert_eq!(
            stmt.values,
            vec![
                BindValue::Text("ada".to_string()),
                BindValue::Int(1),
                BindValue::Int(7)
            ]
        );
    }

    #[test]
    fn update_many_renumbers_across_set_and_filter_fragments() {
        let mut update = UpdateDoc::new();
        update.insert("age".to_string(), UpdateOp::Set(json!(40)));
        let filter = Filter::And(vec![eq("name", json!("ada")), eq("active", json!(true))]);
        let stmt = build_update_many(
            "users",
            Some(&filter),
            &update,
            &SnakeCase,
            Dialect::Postgres,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "users" SET "age" = $1 WHERE ("name" = $2) AND ("active" = $3)"#
        );
        assert_eq!(
            stmt.values,
            vec![
                BindValue::Int(40),
                BindValue::Text("ada".to_string()),
                BindValue::Bool(true)
            ]
        );
    }

    #[test]
    fn delete_statements() {
        let stmt = build_delete("users", "id", &json!(7), &SnakeCase, Dialect::Postgres).unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "users" WHERE "id" = $1"#);
        assert_eq!(stmt.values, vec![BindValue::Int(7)]);

        let stmt = build_delete_many("users", None, &SnakeCase, Dialect::Postgres).unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "users""#);
        assert!(stmt.values.is_empty());
    }

    #[test]
    fn aggregate_statements() {
        let filter = eq("active", json!(true));
        let stmt =
            build_count("users", Some(&filter), &SnakeCase, Dialect::Postgres).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT COUNT(*) AS "count" FROM "users" WHERE "active" = $1"#
        );

        let stmt = build_sum("users", "loginCount", None, &SnakeCase, Dialect::Postgres).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT SUM("login_count") AS "sum" FROM "users""#
        );
    }
}
