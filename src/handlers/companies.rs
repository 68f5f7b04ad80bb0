use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Company, CompanyDetail, CompanyFilter, CompanyUpdate, NewCompany};
use crate::state::AppState;

/// POST /companies - Create a company (admin)
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewCompany>, JsonRejection>,
) -> ApiResult<Company> {
    let Json(data) = payload?;
    data.validate()?;

    let company = state.companies().create(&data).await?;
    Ok(ApiResponse::created(company))
}

/// GET /companies - List companies, optionally filtered by
/// `name`, `minEmployees` and `maxEmployees`
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<CompanyFilter>, QueryRejection>,
) -> ApiResult<Vec<Company>> {
    let Query(filter) = query?;
    let fields = filter.into_fields()?;

    let companies = state.companies().find_all(Some(&fields)).await?;
    Ok(ApiResponse::success(companies))
}

/// GET /companies/:handle - One company with its jobs
pub async fn get(State(state): State<AppState>, Path(handle): Path<String>) -> ApiResult<CompanyDetail> {
    let company = state.companies().get(&handle).await?;
    Ok(ApiResponse::success(company))
}

/// PATCH /companies/:handle - Partial update (admin)
pub async fn update(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    payload: Result<Json<CompanyUpdate>, JsonRejection>,
) -> ApiResult<Company> {
    let Json(update) = payload?;
    let fields = update.into_fields()?;

    let company = state.companies().update(&handle, &fields).await?;
    Ok(ApiResponse::success(company))
}

/// DELETE /companies/:handle (admin)
pub async fn delete(State(state): State<AppState>, Path(handle): Path<String>) -> ApiResult<Value> {
    state.companies().remove(&handle).await?;
    Ok(ApiResponse::success(json!({ "deleted": handle })))
}
