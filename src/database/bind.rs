use serde_json::Value;
use sqlx::{postgres::PgArguments, FromRow};

use super::FragmentError;

type PgQueryAs<'q, O> = sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>;

/// Bind every fragment parameter, in order, to a typed query.
///
/// Fragments only carry scalars; an array or object is rejected rather than
/// sent as JSONB into a scalar column.
pub fn bind_params_query_as<'q, O>(
    mut q: PgQueryAs<'q, O>,
    params: &'q [Value],
) -> Result<PgQueryAs<'q, O>, FragmentError>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    for (idx, p) in params.iter().enumerate() {
        q = bind_param_query_as(q, p).ok_or_else(|| FragmentError::InvalidValue {
            field: format!("${}", idx + 1),
            expected: "a scalar",
        })?;
    }
    Ok(q)
}

fn bind_param_query_as<'q, O>(q: PgQueryAs<'q, O>, v: &'q Value) -> Option<PgQueryAs<'q, O>>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    let q = match v {
        Value::Null => {
            // int8 NULL assigns cleanly to integer, numeric and text columns
            let none: Option<i64> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => return None,
    };
    Some(q)
}
