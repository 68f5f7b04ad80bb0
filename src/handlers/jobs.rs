use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Job, JobFilter, JobUpdate, NewJob};
use crate::state::AppState;

/// POST /jobs - Create a job posting (admin)
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewJob>, JsonRejection>,
) -> ApiResult<Job> {
    let Json(data) = payload?;
    data.validate()?;

    let job = state.jobs().create(&data).await?;
    Ok(ApiResponse::created(job))
}

/// GET /jobs - List jobs, optionally filtered by `title`, `minSalary` and `hasEquity`
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<JobFilter>, QueryRejection>,
) -> ApiResult<Vec<Job>> {
    let Query(filter) = query?;
    let fields = filter.into_fields()?;

    let jobs = state.jobs().find_all(Some(&fields)).await?;
    Ok(ApiResponse::success(jobs))
}

/// GET /jobs/:id
pub async fn get(State(state): State<AppState>, id: Result<Path<i32>, PathRejection>) -> ApiResult<Job> {
    let Path(id) = id?;
    let job = state.jobs().get(id).await?;
    Ok(ApiResponse::success(job))
}

/// PATCH /jobs/:id - Partial update of title, salary and equity (admin)
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<JobUpdate>, JsonRejection>,
) -> ApiResult<Job> {
    let Path(id) = id?;
    let Json(update) = payload?;
    let fields = update.into_fields()?;

    let job = state.jobs().update(id, &fields).await?;
    Ok(ApiResponse::success(job))
}

/// DELETE /jobs/:id (admin)
pub async fn delete(State(state): State<AppState>, id: Result<Path<i32>, PathRejection>) -> ApiResult<Value> {
    let Path(id) = id?;
    state.jobs().remove(id).await?;
    Ok(ApiResponse::success(json!({ "deleted": id })))
}
