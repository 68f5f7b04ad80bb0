pub mod bind;
pub mod fragment;
pub mod manager;

pub use fragment::{
    sql_for_filter, sql_for_partial_update, sql_for_partial_update_with_numeric, FragmentError,
    SqlFragment,
};
pub use manager::{DatabaseError, DatabaseManager};

use serde_json::Value;

/// Trace a dynamically built statement when query logging is enabled.
pub fn log_query(sql: &str, params: &[Value]) {
    if crate::config::config().database.enable_query_logging {
        tracing::debug!(sql, params = ?params, "Executing query");
    }
}
