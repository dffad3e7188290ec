//! Filter tree compilation.
//!
//! Compiles a backend-agnostic filter tree into a SQL boolean
//! expression with `?` value markers plus the bound values in marker
//! order. The final renumbering into dialect placeholders happens in
//! one pass over the assembled statement (see `statement::finalize`),
//! so marker order here must match textual order exactly.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::ident::IdentStyle;
use crate::statement::Dialect;
use crate::value::{to_bindable, BindValue};

/// Backend-agnostic boolean predicate over row fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Conjunction. Children compiling to nothing contribute nothing;
    /// an all-vacuous conjunction is itself vacuous.
    And(Vec<Filter>),
    /// Disjunction, with the same empty-handling as [`Filter::And`].
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Restricted regular-expression match, translated to LIKE. Only
    /// anchored-prefix, anchored-suffix, and bare substring patterns
    /// are understood; anything richer is treated as literal text.
    Regex {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// Field equals any of the listed values.
    ///
    /// An empty value list compiles to an *empty* predicate, so a
    /// surrounding `And` silently drops the constraint instead of
    /// matching zero rows. Long-standing quirk, kept as-is.
    In { field: String, values: Vec<Value> },
    /// `IS NOT NULL` when `exists`, `IS NULL` otherwise.
    Exists { field: String, exists: bool },
    /// Null values compile to `IS NULL` with no bound parameter.
    Eq { field: String, value: Value },
    /// Null values compile to `IS NOT NULL` with no bound parameter.
    Ne { field: String, value: Value },
    Gt { field: String, value: Value },
    Lt { field: String, value: Value },
    Gte { field: String, value: Value },
    Lte { field: String, value: Value },
}

/// Compile a filter into `(fragment, values)`.
///
/// `None` is "no filter" and compiles to an empty fragment with no
/// values, as do vacuous trees like `And([])`.
pub fn compile_filter(
    filter: Option<&Filter>,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<(String, Vec<BindValue>)> {
    let mut buf = String::new();
    let mut values = Vec::new();
    if let Some(filter) = filter {
        write_filter(filter, &mut buf, &mut values, idents, dialect)?;
    }
    Ok((buf, values))
}

/// Write one node into the buffer, returning whether anything was
/// written. Vacuous nodes leave the buffer and values untouched.
fn write_filter(
    filter: &Filter,
    buf: &mut String,
    values: &mut Vec<BindValue>,
    idents: &dyn IdentStyle,
    dialect: Dialect,
) -> Result<bool> {
    match filter {
        Filter::And(children) | Filter::Or(children) => {
            let join = match filter {
                Filter::And(_) => " AND ",
                _ => " OR ",
            };
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                let mut part = String::new();
                if write_filter(child, &mut part, values, idents, dialect)? {
                    parts.push(part);
                }
            }
            if parts.is_empty() {
                return Ok(false);
            }
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    buf.push_str(join);
                }
                write!(buf, "({part})")?;
            }
        }
        Filter::Not(child) => {
            let mut inner = String::new();
            if !write_filter(child, &mut inner, values, idents, dialect)? {
                return Ok(false);
            }
            write!(buf, "NOT ({inner})")?;
        }
        Filter::Regex {
            field,
            pattern,
            case_insensitive,
        } => {
            let col = column(field, idents, dialect);
            let like = regex_to_like(pattern, *case_insensitive);
            if like.case_insensitive {
                write!(buf, "UPPER({col}) LIKE UPPER(?) ESCAPE '\\'")?;
            } else {
                write!(buf, "{col} LIKE ? ESCAPE '\\'")?;
            }
            values.push(BindValue::Text(like.pattern));
        }
        Filter::In { field, values: list } => {
            if list.is_empty() {
                debug!(field, "empty IN list compiles to no predicate");
                return Ok(false);
            }
            let col = column(field, idents, dialect);
            for (i, value) in list.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" OR ");
                }
                write!(buf, "{col} = ?")?;
                values.push(to_bindable(value, dialect));
            }
        }
        Filter::Exists { field, exists } => {
            let col = column(field, idents, dialect);
            if *exists {
                write!(buf, "{col} IS NOT NULL")?;
            } else {
                write!(buf, "{col} IS NULL")?;
            }
        }
        Filter::Eq { field, value } => {
            let col = column(field, idents, dialect);
            if value.is_null() {
                write!(buf, "{col} IS NULL")?;
            } else {
                write!(buf, "{col} = ?")?;
                values.push(to_bindable(value, dialect));
            }
        }
        Filter::Ne { field, value } => {
            let col = column(field, idents, dialect);
            if value.is_null() {
                write!(buf, "{col} IS NOT NULL")?;
            } else {
                write!(buf, "{col} != ?")?;
                values.push(to_bindable(value, dialect));
            }
        }
        Filter::Gt { field, value }
        | Filter::Lt { field, value }
        | Filter::Gte { field, value }
        | Filter::Lte { field, value } => {
            let op = match filter {
                Filter::Gt { .. } => ">",
                Filter::Lt { .. } => "<",
                Filter::Gte { .. } => ">=",
                _ => "<=",
            };
            let col = column(field, idents, dialect);
            write!(buf, "{col} {op} ?")?;
            // Null comparison values bind as null; the comparison
            // result is then dialect-defined, not special-cased here.
            values.push(to_bindable(value, dialect));
        }
    }

    Ok(true)
}

fn column(field: &str, idents: &dyn IdentStyle, dialect: Dialect) -> String {
    dialect.quote_ident(&idents.to_storage(field))
}

pub(crate) struct LikePattern {
    pub pattern: String,
    pub case_insensitive: bool,
}

/// Translate a restricted regular expression into a LIKE pattern.
///
/// One layer of backslash escaping is stripped from the source first
/// (`\\` collapses to `\`, any other escaped character becomes itself).
/// A leading `^` anchors a prefix match, a trailing `$` a suffix match,
/// and everything else matches as a substring. LIKE wildcards inside
/// the literal text are backslash-escaped so they match literally.
pub(crate) fn regex_to_like(source: &str, case_insensitive: bool) -> LikePattern {
    let literal = unescape(source);
    let pattern = if let Some(rest) = literal.strip_prefix('^') {
        format!("{}%", escape_like(rest))
    } else if let Some(rest) = literal.strip_suffix('$') {
        format!("%{}", escape_like(rest))
    } else {
        format!("%{}%", escape_like(&literal))
    };
    LikePattern {
        pattern,
        case_insensitive,
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            // A trailing lone backslash stays literal.
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ident::SnakeCase;

    fn compile(filter: Option<&Filter>) -> (String, Vec<BindValue>) {
        compile_filter(filter, &SnakeCase, Dialect::Postgres).unwrap()
    }

    #[test]
    fn no_filter_compiles_to_nothing() {
        assert_eq!(compile(None), (String::new(), Vec::new()));
    }

    #[test]
    fn vacuous_trees_compile_to_nothing() {
        assert_eq!(compile(Some(&Filter::And(vec![]))), (String::new(), vec![]));
        assert_eq!(compile(Some(&Filter::Or(vec![]))), (String::new(), vec![]));
        let nested = Filter::And(vec![Filter::Or(vec![]), Filter::And(vec![])]);
        assert_eq!(compile(Some(&nested)), (String::new(), vec![]));
        let not = Filter::Not(Box::new(Filter::And(vec![])));
        assert_eq!(compile(Some(&not)), (String::new(), vec![]));
    }

    #[test]
    fn eq_with_null_is_is_null() {
        let (sql, values) = compile(Some(&Filter::Eq {
            field: "age".to_string(),
            value: json!(null),
        }));
        assert_eq!(sql, r#""age" IS NULL"#);
        assert!(values.is_empty());
    }

    #[test]
    fn eq_with_value_binds_one_parameter() {
        let (sql, values) = compile(Some(&Filter::Eq {
            field: "age".to_string(),
            value: json!(5),
        }));
        assert_eq!(sql, r#""age" = ?"#);
        assert_eq!(values, vec![BindValue::Int(5)]);
    }

    #[test]
    fn ne_mirrors_eq() {
        let (sql, values) = compile(Some(&Filter::Ne {
            field: "age".to_string(),
            value: json!(null),
        }));
        assert_eq!(sql, r#""age" IS NOT NULL"#);
        assert!(values.is_empty());

        let (sql, values) = compile(Some(&Filter::Ne {
            field: "age".to_string(),
            value: json!(5),
        }));
        assert_eq!(sql, r#""age" != ?"#);
        assert_eq!(values, vec![BindValue::Int(5)]);
    }

    #[test]
    fn comparisons_always_bind() {
        let (sql, values) = compile(Some(&Filter::Gte {
            field: "loginCount".to_string(),
            value: json!(10),
        }));
        assert_eq!(sql, r#""login_count" >= ?"#);
        assert_eq!(values, vec![BindValue::Int(10)]);
    }

    #[test]
    fn exists_emits_null_checks() {
        let (sql, values) = compile(Some(&Filter::Exists {
            field: "email".to_string(),
            exists: true,
        }));
        assert_eq!(sql, r#""email" IS NOT NULL"#);
        assert!(values.is_empty());

        let (sql, _) = compile(Some(&Filter::Exists {
            field: "email".to_string(),
            exists: false,
        }));
        assert_eq!(sql, r#""email" IS NULL"#);
    }

    #[test]
    fn in_expands_to_or_joined_equalities() {
        let (sql, values) = compile(Some(&Filter::In {
            field: "id".to_string(),
            values: vec![json!(1), json!(2), json!(3)],
        }));
        assert_eq!(sql, r#""id" = ? OR "id" = ? OR "id" = ?"#);
        assert_eq!(
            values,
            vec![BindValue::Int(1), BindValue::Int(2), BindValue::Int(3)]
        );
    }

    #[test]
    fn empty_in_compiles_to_nothing() {
        // Documented quirk: the constraint disappears entirely rather
        // than matching zero rows.
        let (sql, values) = compile(Some(&Filter::In {
            field: "id".to_string(),
            values: vec![],
        }));
        assert!(sql.is_empty());
        assert!(values.is_empty());

        let and = Filter::And(vec![
            Filter::In {
                field: "id".to_string(),
                values: vec![],
            },
            Filter::Eq {
                field: "age".to_string(),
                value: json!(5),
            },
        ]);
        let (sql, values) = compile(Some(&and));
        assert_eq!(sql, r#"("age" = ?)"#);
        assert_eq!(values, vec![BindValue::Int(5)]);
    }

    #[test]
    fn and_or_parenthesize_each_child() {
        let tree = Filter::Or(vec![
            Filter::And(vec![
                Filter::Eq {
                    field: "age".to_string(),
                    value: json!(5),
                },
                Filter::Gt {
                    field: "score".to_string(),
                    value: json!(90),
                },
            ]),
            Filter::Eq {
                field: "name".to_string(),
                value: json!("ada"),
            },
        ]);
        let (sql, values) = compile(Some(&tree));
        assert_eq!(
            sql,
            r#"(("age" = ?) AND ("score" > ?)) OR ("name" = ?)"#
        );
        assert_eq!(
            values,
            vec![
                BindValue::Int(5),
                BindValue::Int(90),
                BindValue::Text("ada".to_string())
            ]
        );
    }

    #[test]
    fn not_wraps_its_child() {
        let tree = Filter::Not(Box::new(Filter::Eq {
            field: "age".to_string(),
            value: json!(5),
        }));
        let (sql, values) = compile(Some(&tree));
        assert_eq!(sql, r#"NOT ("age" = ?)"#);
        assert_eq!(values, vec![BindValue::Int(5)]);
    }

    #[test]
    fn regex_prefix_suffix_substring() {
        let (sql, values) = compile(Some(&Filter::Regex {
            field: "name".to_string(),
            pattern: "^abc".to_string(),
            case_insensitive: true,
        }));
        assert_eq!(sql, r#"UPPER("name") LIKE UPPER(?) ESCAPE '\'"#);
        assert_eq!(values, vec![BindValue::Text("abc%".to_string())]);

        let (sql, values) = compile(Some(&Filter::Regex {
            field: "name".to_string(),
            pattern: "xyz$".to_string(),
            case_insensitive: false,
        }));
        assert_eq!(sql, r#""name" LIKE ? ESCAPE '\'"#);
        assert_eq!(values, vec![BindValue::Text("%xyz".to_string())]);

        let (_, values) = compile(Some(&Filter::Regex {
            field: "name".to_string(),
            pattern: "mid".to_string(),
            case_insensitive: false,
        }));
        assert_eq!(values, vec![BindValue::Text("%mid%".to_string())]);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        let like = regex_to_like("^50%_off", false);
        assert_eq!(like.pattern, r"50\%\_off%");

        // Double backslash collapses to one literal backslash, which is
        // then escaped for LIKE.
        let like = regex_to_like(r"a\\b", false);
        assert_eq!(like.pattern, r"%a\\b%");

        // Other escapes collapse to the bare character.
        let like = regex_to_like(r"a\.b", false);
        assert_eq!(like.pattern, "%a.b%");
    }

    #[test]
    fn field_names_are_converted_and_quoted() {
        let (sql, _) = compile(Some(&Filter::Eq {
            field: "firstName".to_string(),
            value: json!("ada"),
        }));
        assert_eq!(sql, r#""first_name" = ?"#);
    }
}
