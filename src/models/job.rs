use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use super::{check_update_fields, classify_write_error, ModelError};
use crate::database::bind::bind_params_query_as;
use crate::database::fragment::{FilterOp, FilterPolicy, FilterRule};
use crate::database::{log_query, sql_for_filter, sql_for_partial_update_with_numeric};

const JOB_COLUMNS: &str = "id, title, salary, equity, company_handle";

const IMMUTABLE: &[&str] = &["id", "companyHandle"];

const UPDATABLE: &[&str] = &["title", "salary", "equity"];

const NUMERIC: &[&str] = &["equity"];

pub const JOB_FILTERS: FilterPolicy = FilterPolicy {
    text_column: ("jobs", "title"),
    columns: &[("minSalary", "salary"), ("hasEquity", "equity")],
    rules: &[
        FilterRule { key: "title", op: FilterOp::Contains },
        FilterRule { key: "minSalary", op: FilterOp::AtLeast },
        FilterRule { key: "hasEquity", op: FilterOp::Positive },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<Decimal>,
    pub company_handle: String,
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewJob {
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<Decimal>,
    pub company_handle: String,
}

impl NewJob {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.title.trim().is_empty() {
            return Err(ModelError::Validation("title must not be empty".to_string()));
        }
        if self.company_handle.is_empty() {
            return Err(ModelError::Validation("companyHandle must not be empty".to_string()));
        }
        validate_salary(self.salary)?;
        validate_equity(self.equity)
    }
}

/// Body of `PATCH /jobs/:id`. `id` and `companyHandle` are not accepted.
/// An explicit `null` clears `salary` or `equity`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub salary: Option<Option<i32>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub equity: Option<Option<Decimal>>,
}

impl JobUpdate {
    pub fn into_fields(self) -> Result<Map<String, Value>, ModelError> {
        validate_salary(self.salary.flatten())?;
        validate_equity(self.equity.flatten())?;

        let mut fields = Map::new();
        if let Some(title) = self.title {
            if title.trim().is_empty() {
                return Err(ModelError::Validation("title must not be empty".to_string()));
            }
            fields.insert("title".to_string(), Value::from(title));
        }
        if let Some(salary) = self.salary {
            fields.insert("salary".to_string(), salary.map_or(Value::Null, Value::from));
        }
        if let Some(equity) = self.equity {
            // Decimal text, cast to NUMERIC in the UPDATE
            let equity = equity.map_or(Value::Null, |e| Value::String(e.to_string()));
            fields.insert("equity".to_string(), equity);
        }
        Ok(fields)
    }
}

/// Query string of `GET /jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobFilter {
    pub title: Option<String>,
    pub min_salary: Option<i32>,
    pub has_equity: Option<bool>,
}

impl JobFilter {
    pub fn into_fields(self) -> Result<Map<String, Value>, ModelError> {
        validate_salary(self.min_salary)?;

        let mut fields = Map::new();
        if let Some(title) = self.title {
            fields.insert("title".to_string(), Value::from(title));
        }
        if let Some(min_salary) = self.min_salary {
            fields.insert("minSalary".to_string(), Value::from(min_salary));
        }
        if let Some(has_equity) = self.has_equity {
            fields.insert("hasEquity".to_string(), Value::from(has_equity));
        }
        Ok(fields)
    }
}

fn validate_salary(salary: Option<i32>) -> Result<(), ModelError> {
    match salary {
        Some(s) if s < 0 => Err(ModelError::Validation("salary must be at least 0".to_string())),
        _ => Ok(()),
    }
}

fn validate_equity(equity: Option<Decimal>) -> Result<(), ModelError> {
    match equity {
        Some(e) if e < Decimal::ZERO || e > Decimal::ONE => {
            Err(ModelError::Validation("equity must be between 0 and 1".to_string()))
        }
        _ => Ok(()),
    }
}

/// Jobs table access.
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a job; fails with `Conflict` when an identical posting exists.
    pub async fn create(&self, data: &NewJob) -> Result<Job, ModelError> {
        let duplicate = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM jobs \
             WHERE title = $1 \
               AND salary IS NOT DISTINCT FROM $2 \
               AND equity IS NOT DISTINCT FROM $3 \
               AND company_handle = $4",
        )
        .bind(&data.title)
        .bind(data.salary)
        .bind(data.equity)
        .bind(&data.company_handle)
        .fetch_optional(&self.pool)
        .await?;

        if duplicate.is_some() {
            return Err(ModelError::Conflict(format!(
                "Duplicate job posting: {} with {}",
                data.title, data.company_handle
            )));
        }

        let sql = format!(
            "INSERT INTO jobs (title, salary, equity, company_handle) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {JOB_COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(&data.title)
            .bind(data.salary)
            .bind(data.equity)
            .bind(&data.company_handle)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                classify_write_error(
                    e,
                    || format!("Duplicate job posting: {} with {}", data.title, data.company_handle),
                    || format!("No company: {}", data.company_handle),
                )
            })?;

        info!(id = job.id, company = %job.company_handle, "Created job");
        Ok(job)
    }

    /// All jobs ordered by id, optionally narrowed by a filter mapping.
    pub async fn find_all(&self, filter: Option<&Map<String, Value>>) -> Result<Vec<Job>, ModelError> {
        let fragment = match filter {
            Some(fields) if !fields.is_empty() => Some(sql_for_filter(fields, &JOB_FILTERS)?),
            _ => None,
        }
        .filter(|fragment| !fragment.is_empty());

        let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs");
        let params: &[Value] = match &fragment {
            Some(fragment) => {
                sql.push_str(" WHERE ");
                sql.push_str(&fragment.sql);
                &fragment.params
            }
            None => &[],
        };
        sql.push_str(" ORDER BY id");

        log_query(&sql, params);
        let jobs = bind_params_query_as(sqlx::query_as::<_, Job>(&sql), params)?
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    pub async fn get(&self, id: i32) -> Result<Job, ModelError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("No job with id={}", id)))
    }

    /// Partial update of `title`, `salary` and `equity`. Touching `id` or
    /// `companyHandle` fails with `Validation` whether or not the job exists.
    pub async fn update(&self, id: i32, data: &Map<String, Value>) -> Result<Job, ModelError> {
        check_update_fields(data, IMMUTABLE, UPDATABLE)?;
        let fragment = sql_for_partial_update_with_numeric(data, &[], NUMERIC)?;

        let sql = format!(
            "UPDATE jobs SET {} WHERE id = ${} RETURNING {JOB_COLUMNS}",
            fragment.sql,
            fragment.params.len() + 1
        );

        log_query(&sql, &fragment.params);
        let job = bind_params_query_as(sqlx::query_as::<_, Job>(&sql), &fragment.params)?
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify_write_error(e, || format!("Duplicate job posting: {}", id), || id.to_string()))?
            .ok_or_else(|| ModelError::NotFound(format!("No job with id={}", id)))?;

        debug!(id, "Updated job");
        Ok(job)
    }

    pub async fn remove(&self, id: i32) -> Result<(), ModelError> {
        let deleted = sqlx::query_scalar::<_, i32>("DELETE FROM jobs WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match deleted {
            Some(_) => {
                info!(id, "Deleted job");
                Ok(())
            }
            None => Err(ModelError::NotFound(format!("No job with id={}", id))),
        }
    }
}
