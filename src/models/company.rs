use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use super::{check_update_fields, classify_write_error, ModelError};
use crate::database::bind::bind_params_query_as;
use crate::database::fragment::{ColumnMap, FilterOp, FilterPolicy, FilterRule};
use crate::database::{log_query, sql_for_filter, sql_for_partial_update};

const COMPANY_COLUMNS: &str = "handle, name, description, num_employees, logo_url";

const UPDATE_COLUMNS: ColumnMap<'static> = &[("numEmployees", "num_employees"), ("logoUrl", "logo_url")];

const UPDATABLE: &[&str] = &["name", "description", "numEmployees", "logoUrl"];

pub const COMPANY_FILTERS: FilterPolicy = FilterPolicy {
    text_column: ("companies", "name"),
    columns: &[("minEmployees", "num_employees"), ("maxEmployees", "num_employees")],
    rules: &[
        FilterRule { key: "name", op: FilterOp::Contains },
        FilterRule { key: "minEmployees", op: FilterOp::AtLeast },
        FilterRule { key: "maxEmployees", op: FilterOp::AtMost },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub handle: String,
    pub name: String,
    pub description: String,
    pub num_employees: Option<i32>,
    pub logo_url: Option<String>,
}

/// A company together with the jobs it has posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: Company,
    pub jobs: Vec<CompanyJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyJob {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<Decimal>,
}

#[derive(Debug, FromRow)]
struct CompanyJobRow {
    handle: String,
    name: String,
    description: String,
    num_employees: Option<i32>,
    logo_url: Option<String>,
    job_id: Option<i32>,
    title: Option<String>,
    salary: Option<i32>,
    equity: Option<Decimal>,
}

/// Fold LEFT JOIN rows into one company. Rows without a job id come from the
/// outer side of the join and add nothing to `jobs`.
fn fold_company_rows(rows: Vec<CompanyJobRow>) -> Option<CompanyDetail> {
    let mut rows = rows.into_iter().peekable();
    let first = rows.peek()?;
    let company = Company {
        handle: first.handle.clone(),
        name: first.name.clone(),
        description: first.description.clone(),
        num_employees: first.num_employees,
        logo_url: first.logo_url.clone(),
    };

    let jobs = rows
        .filter_map(|row| {
            Some(CompanyJob {
                id: row.job_id?,
                title: row.title.unwrap_or_default(),
                salary: row.salary,
                equity: row.equity,
            })
        })
        .collect();

    Some(CompanyDetail { company, jobs })
}

/// Body of `POST /companies`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCompany {
    pub handle: String,
    pub name: String,
    pub description: String,
    pub num_employees: Option<i32>,
    pub logo_url: Option<String>,
}

impl NewCompany {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.handle.is_empty() || self.handle.len() > 25 {
            return Err(ModelError::Validation("handle must be 1 to 25 characters".to_string()));
        }
        if self.handle != self.handle.to_lowercase() {
            return Err(ModelError::Validation("handle must be lowercase".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(ModelError::Validation("name must not be empty".to_string()));
        }
        validate_num_employees(self.num_employees)
    }
}

/// Body of `PATCH /companies/:handle`. An explicit `null` clears
/// `numEmployees` or `logoUrl`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub num_employees: Option<Option<i32>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub logo_url: Option<Option<String>>,
}

impl CompanyUpdate {
    /// Present fields, keyed by their logical names.
    pub fn into_fields(self) -> Result<Map<String, Value>, ModelError> {
        validate_num_employees(self.num_employees.flatten())?;

        let mut fields = Map::new();
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(ModelError::Validation("name must not be empty".to_string()));
            }
            fields.insert("name".to_string(), Value::from(name));
        }
        if let Some(description) = self.description {
            fields.insert("description".to_string(), Value::from(description));
        }
        if let Some(num_employees) = self.num_employees {
            fields.insert("numEmployees".to_string(), num_employees.map_or(Value::Null, Value::from));
        }
        if let Some(logo_url) = self.logo_url {
            fields.insert("logoUrl".to_string(), logo_url.map_or(Value::Null, Value::from));
        }
        Ok(fields)
    }
}

/// Query string of `GET /companies`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompanyFilter {
    pub name: Option<String>,
    pub min_employees: Option<i32>,
    pub max_employees: Option<i32>,
}

impl CompanyFilter {
    pub fn into_fields(self) -> Result<Map<String, Value>, ModelError> {
        if let (Some(min), Some(max)) = (self.min_employees, self.max_employees) {
            if min > max {
                return Err(ModelError::Validation(
                    "minEmployees cannot be greater than maxEmployees".to_string(),
                ));
            }
        }

        let mut fields = Map::new();
        if let Some(name) = self.name {
            fields.insert("name".to_string(), Value::from(name));
        }
        if let Some(min) = self.min_employees {
            fields.insert("minEmployees".to_string(), Value::from(min));
        }
        if let Some(max) = self.max_employees {
            fields.insert("maxEmployees".to_string(), Value::from(max));
        }
        Ok(fields)
    }
}

fn validate_num_employees(num_employees: Option<i32>) -> Result<(), ModelError> {
    match num_employees {
        Some(n) if n < 0 => Err(ModelError::Validation("numEmployees must be at least 0".to_string())),
        _ => Ok(()),
    }
}

/// Companies table access.
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a company; fails with `Conflict` when the handle is taken.
    pub async fn create(&self, data: &NewCompany) -> Result<Company, ModelError> {
        let duplicate = sqlx::query_scalar::<_, String>("SELECT handle FROM companies WHERE handle = $1")
            .bind(&data.handle)
            .fetch_optional(&self.pool)
            .await?;

        if duplicate.is_some() {
            return Err(ModelError::Conflict(format!("Duplicate company: {}", data.handle)));
        }

        let sql = format!(
            "INSERT INTO companies (handle, name, description, num_employees, logo_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COMPANY_COLUMNS}"
        );
        let company = sqlx::query_as::<_, Company>(&sql)
            .bind(&data.handle)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.num_employees)
            .bind(&data.logo_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                classify_write_error(
                    e,
                    || format!("Duplicate company: {}", data.handle),
                    || format!("Invalid company: {}", data.handle),
                )
            })?;

        info!(handle = %company.handle, "Created company");
        Ok(company)
    }

    /// All companies ordered by name, optionally narrowed by a filter mapping.
    pub async fn find_all(&self, filter: Option<&Map<String, Value>>) -> Result<Vec<Company>, ModelError> {
        let fragment = match filter {
            Some(fields) if !fields.is_empty() => Some(sql_for_filter(fields, &COMPANY_FILTERS)?),
            _ => None,
        }
        .filter(|fragment| !fragment.is_empty());

        let mut sql = format!("SELECT {COMPANY_COLUMNS} FROM companies");
        let params: &[Value] = match &fragment {
            Some(fragment) => {
                sql.push_str(" WHERE ");
                sql.push_str(&fragment.sql);
                &fragment.params
            }
            None => &[],
        };
        sql.push_str(" ORDER BY name");

        log_query(&sql, params);
        let companies = bind_params_query_as(sqlx::query_as::<_, Company>(&sql), params)?
            .fetch_all(&self.pool)
            .await?;
        Ok(companies)
    }

    /// One company with its jobs; `NotFound` when the handle is unknown.
    pub async fn get(&self, handle: &str) -> Result<CompanyDetail, ModelError> {
        let rows = sqlx::query_as::<_, CompanyJobRow>(
            "SELECT c.handle, c.name, c.description, c.num_employees, c.logo_url, \
                    j.id AS job_id, j.title, j.salary, j.equity \
             FROM companies c \
             LEFT JOIN jobs j ON c.handle = j.company_handle \
             WHERE c.handle = $1 \
             ORDER BY j.id",
        )
        .bind(handle)
        .fetch_all(&self.pool)
        .await?;

        fold_company_rows(rows).ok_or_else(|| ModelError::NotFound(format!("No company: {}", handle)))
    }

    /// Partial update. Only `name`, `description`, `numEmployees` and
    /// `logoUrl` may change.
    pub async fn update(&self, handle: &str, data: &Map<String, Value>) -> Result<Company, ModelError> {
        check_update_fields(data, &["handle"], UPDATABLE)?;
        let fragment = sql_for_partial_update(data, UPDATE_COLUMNS)?;

        let sql = format!(
            "UPDATE companies SET {} WHERE handle = ${} RETURNING {COMPANY_COLUMNS}",
            fragment.sql,
            fragment.params.len() + 1
        );

        log_query(&sql, &fragment.params);
        let company = bind_params_query_as(sqlx::query_as::<_, Company>(&sql), &fragment.params)?
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify_write_error(e, || "Duplicate company name".to_string(), || handle.to_string()))?
            .ok_or_else(|| ModelError::NotFound(format!("No company: {}", handle)))?;

        debug!(handle, "Updated company");
        Ok(company)
    }

    pub async fn remove(&self, handle: &str) -> Result<(), ModelError> {
        let deleted = sqlx::query_scalar::<_, String>("DELETE FROM companies WHERE handle = $1 RETURNING handle")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;

        match deleted {
            Some(_) => {
                info!(handle, "Deleted company");
                Ok(())
            }
            None => Err(ModelError::NotFound(format!("No company: {}", handle))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(job_id: Option<i32>, title: Option<&str>) -> CompanyJobRow {
        CompanyJobRow {
            handle: "c1".to_string(),
            name: "C1".to_string(),
            description: "Desc1".to_string(),
            num_employees: Some(1),
            logo_url: Some("http://c1.img".to_string()),
            job_id,
            title: title.map(str::to_string),
            salary: job_id.map(|id| id * 1000),
            equity: None,
        }
    }

    #[test]
    fn fold_without_rows_is_none() {
        assert!(fold_company_rows(vec![]).is_none());
    }

    #[test]
    fn fold_outer_join_row_gives_empty_jobs() {
        let detail = fold_company_rows(vec![row(None, None)]).unwrap();
        assert_eq!(detail.company.handle, "c1");
        assert!(detail.jobs.is_empty());
        assert_eq!(serde_json::to_value(&detail).unwrap()["jobs"], json!([]));
    }

    #[test]
    fn fold_collects_every_job() {
        let detail = fold_company_rows(vec![row(Some(1), Some("j1")), row(Some(2), Some("j2"))]).unwrap();
        let ids: Vec<i32> = detail.jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(detail.jobs[1].salary, Some(2000));
    }

    #[test]
    fn company_serializes_camel_case() {
        let detail = fold_company_rows(vec![row(None, None)]).unwrap();
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["numEmployees"], json!(1));
        assert_eq!(value["logoUrl"], json!("http://c1.img"));
        assert!(value.get("company").is_none());
    }

    #[test]
    fn new_company_validation() {
        let mut company = NewCompany {
            handle: "c1".to_string(),
            name: "C1".to_string(),
            description: "Desc".to_string(),
            num_employees: Some(3),
            logo_url: None,
        };
        assert!(company.validate().is_ok());

        company.num_employees = Some(-1);
        assert!(matches!(company.validate(), Err(ModelError::Validation(_))));

        company.num_employees = None;
        company.handle = "C1".to_string();
        assert!(matches!(company.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn new_company_rejects_unknown_keys() {
        let body = json!({"handle": "c1", "name": "C1", "description": "d", "extra": true});
        assert!(serde_json::from_value::<NewCompany>(body).is_err());
    }

    #[test]
    fn update_fields_keep_logical_names() {
        let update: CompanyUpdate = serde_json::from_value(json!({"numEmployees": 10, "logoUrl": "http://x"})).unwrap();
        let fields = update.into_fields().unwrap();
        assert_eq!(Value::Object(fields), json!({"numEmployees": 10, "logoUrl": "http://x"}));
    }

    #[test]
    fn update_null_clears_nullable_fields() {
        let update: CompanyUpdate = serde_json::from_value(json!({"numEmployees": null, "logoUrl": null})).unwrap();
        let fields = update.into_fields().unwrap();
        assert_eq!(Value::Object(fields), json!({"numEmployees": null, "logoUrl": null}));
    }

    #[test]
    fn empty_update_produces_empty_fields() {
        assert!(CompanyUpdate::default().into_fields().unwrap().is_empty());
    }

    #[test]
    fn filter_rejects_inverted_employee_range() {
        let filter = CompanyFilter {
            name: None,
            min_employees: Some(10),
            max_employees: Some(5),
        };
        assert!(matches!(filter.into_fields(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn filter_fields_match_policy_keys() {
        let filter = CompanyFilter {
            name: Some("net".to_string()),
            min_employees: Some(1),
            max_employees: None,
        };
        let fields = filter.into_fields().unwrap();
        let fragment = sql_for_filter(&fields, &COMPANY_FILTERS).unwrap();
        assert_eq!(
            fragment.sql,
            r#"LOWER("companies"."name") LIKE LOWER($1) AND "num_employees">=$2"#
        );
    }
}
