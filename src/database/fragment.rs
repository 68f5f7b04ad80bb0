//! Parameterized SQL fragments for partial updates and filtered reads.
//!
//! Both builders are pure: they borrow an ordered field mapping, number
//! placeholders from `$1` on every call, and return the clause together with
//! the positional values that must be bound in the same order.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

/// Logical field name -> storage column name.
pub type ColumnMap<'a> = &'a [(&'a str, &'a str)];

#[derive(Debug, Error, PartialEq)]
pub enum FragmentError {
    #[error("No data")]
    NoData,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: expected {expected}")]
    InvalidValue { field: String, expected: &'static str },
}

/// A parameterized SQL clause plus its ordered positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// How a recognized filter key turns into a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `"col">=$n`
    AtLeast,
    /// `"col"<=$n`
    AtMost,
    /// `true` yields `"col">$n` bound to 0; `false` yields nothing.
    Positive,
    /// Case-insensitive substring match against the policy's text column.
    Contains,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterRule {
    pub key: &'static str,
    pub op: FilterOp,
}

/// The closed set of filter keys an entity accepts.
#[derive(Debug, Clone, Copy)]
pub struct FilterPolicy {
    /// Qualified `(table, column)` used by [`FilterOp::Contains`].
    pub text_column: (&'static str, &'static str),
    pub columns: ColumnMap<'static>,
    pub rules: &'static [FilterRule],
}

impl FilterPolicy {
    fn rule(&self, key: &str) -> Option<FilterOp> {
        self.rules.iter().find(|rule| rule.key == key).map(|rule| rule.op)
    }
}

/// Build the `SET` list of an UPDATE statement.
///
/// `{numEmployees: 10, logoUrl: "http://x"}` with
/// `[("numEmployees", "num_employees"), ("logoUrl", "logo_url")]` becomes
/// `"num_employees"=$1, "logo_url"=$2` with params `[10, "http://x"]`.
pub fn sql_for_partial_update(
    fields: &Map<String, Value>,
    js_to_sql: ColumnMap<'_>,
) -> Result<SqlFragment, FragmentError> {
    sql_for_partial_update_with_numeric(fields, js_to_sql, &[])
}

/// Like [`sql_for_partial_update`], but keys listed in `numeric` get a
/// `$n::numeric` placeholder. Their values may be decimal strings, which are
/// bound as text and converted by PostgreSQL without going through a float.
pub fn sql_for_partial_update_with_numeric(
    fields: &Map<String, Value>,
    js_to_sql: ColumnMap<'_>,
    numeric: &[&str],
) -> Result<SqlFragment, FragmentError> {
    if fields.is_empty() {
        return Err(FragmentError::NoData);
    }

    let mut assignments = Vec::with_capacity(fields.len());
    for (idx, (key, value)) in fields.iter().enumerate() {
        let column = quote_identifier(column_for(key, js_to_sql));
        if numeric.contains(&key.as_str()) {
            check_numeric(key, value)?;
            assignments.push(format!("{}=${}::numeric", column, idx + 1));
        } else {
            check_scalar(key, value)?;
            assignments.push(format!("{}=${}", column, idx + 1));
        }
    }

    Ok(SqlFragment {
        sql: assignments.join(", "),
        params: fields.values().cloned().collect(),
    })
}

fn check_scalar(key: &str, value: &Value) -> Result<(), FragmentError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(invalid(key, "a scalar")),
        _ => Ok(()),
    }
}

fn check_numeric(key: &str, value: &Value) -> Result<(), FragmentError> {
    match value {
        Value::Null | Value::Number(_) => Ok(()),
        Value::String(s) if Decimal::from_str(s).is_ok() => Ok(()),
        _ => Err(invalid(key, "a number")),
    }
}

/// Build the AND-joined predicate list of a filtered SELECT.
///
/// Keys the policy does not list are rejected. Predicates that drop out
/// (`hasEquity=false`) consume no placeholder, so the resulting fragment can
/// be empty; callers should then skip the `WHERE` clause.
pub fn sql_for_filter(
    fields: &Map<String, Value>,
    policy: &FilterPolicy,
) -> Result<SqlFragment, FragmentError> {
    if fields.is_empty() {
        return Err(FragmentError::NoData);
    }

    let mut predicates = Vec::with_capacity(fields.len());
    let mut params = Vec::with_capacity(fields.len());

    for (key, value) in fields {
        let op = policy
            .rule(key)
            .ok_or_else(|| FragmentError::UnknownField(key.clone()))?;
        let placeholder = params.len() + 1;

        match op {
            FilterOp::AtLeast | FilterOp::AtMost => {
                if !value.is_number() {
                    return Err(invalid(key, "a number"));
                }
                let cmp = if op == FilterOp::AtLeast { ">=" } else { "<=" };
                predicates.push(format!(
                    "{}{}${}",
                    quote_identifier(column_for(key, policy.columns)),
                    cmp,
                    placeholder
                ));
                params.push(value.clone());
            }
            FilterOp::Positive => {
                let wanted = value.as_bool().ok_or_else(|| invalid(key, "a boolean"))?;
                if wanted {
                    predicates.push(format!(
                        "{}>${}",
                        quote_identifier(column_for(key, policy.columns)),
                        placeholder
                    ));
                    params.push(Value::from(0));
                }
            }
            FilterOp::Contains => {
                let text = value.as_str().ok_or_else(|| invalid(key, "a string"))?;
                let (table, column) = policy.text_column;
                predicates.push(format!(
                    "LOWER({}.{}) LIKE LOWER(${})",
                    quote_identifier(table),
                    quote_identifier(column),
                    placeholder
                ));
                params.push(Value::String(format!("%{}%", text)));
            }
        }
    }

    Ok(SqlFragment {
        sql: predicates.join(" AND "),
        params,
    })
}

fn column_for<'a>(key: &'a str, js_to_sql: ColumnMap<'a>) -> &'a str {
    js_to_sql
        .iter()
        .find(|(js, _)| *js == key)
        .map(|(_, sql)| *sql)
        .unwrap_or(key)
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn invalid(key: &str, expected: &'static str) -> FragmentError {
    FragmentError::InvalidValue {
        field: key.to_string(),
        expected,
    }
}
