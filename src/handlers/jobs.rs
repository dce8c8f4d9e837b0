//! # Job Handlers
//!
//! Listing, detail and the retry/discard actions.

use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::cursor::decode_cursor;
use crate::error::ApiError;
use crate::handlers::{ReturnTo, found, parse_id, parse_state};
use crate::repositories::JobRepository;
use crate::repositories::job::{JobDetail, JobListQuery, JobPage};
use crate::server::AppState;

/// Query parameters for listing jobs
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJobsParams {
    /// One of: all, queued, running, succeeded, discarded, retried, unfinished
    pub state: Option<String>,
    /// Case-insensitive match against job class and arguments
    pub query: Option<String>,
    /// Page size (clamped to the configured maximum)
    pub limit: Option<u64>,
    /// Opaque cursor from a previous page
    pub cursor: Option<String>,
}

#[utoipa::path(
    get,
    path = "/jobs",
    security(("bearer_auth" = [])),
    params(ListJobsParams),
    responses(
        (status = 200, description = "Jobs newest first", body = JobPage),
        (status = 400, description = "Invalid state filter or cursor", body = ApiError)
    ),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<JobPage>, ApiError> {
    let filter = parse_state(params.state.as_deref())?;
    let cursor = params
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(decode_cursor)
        .transpose()?;

    let page = JobRepository::new(state.db.clone())
        .list(JobListQuery {
            state: filter,
            query: params.query,
            limit: state.config.effective_limit(params.limit),
            cursor,
        })
        .await?;

    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/jobs/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Job id (UUID)")),
    responses(
        (status = 200, description = "Job with its executions, head first", body = JobDetail),
        (status = 404, description = "Unknown job or no executions left", body = ApiError)
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>, ApiError> {
    let job_id = parse_id(&id)?;
    let aggregate = JobRepository::new(state.db.clone()).find(job_id).await?;
    let detail = aggregate
        .detail()
        .ok_or_else(|| crate::error::AdminError::not_found("job", job_id))?;
    Ok(Json(detail))
}

/// Schedule a new attempt for a discarded job
#[utoipa::path(
    put,
    path = "/jobs/{id}/retry",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Job id (UUID)"), ReturnTo),
    responses(
        (status = 302, description = "Retried; redirects to the filtered job list"),
        (status = 404, description = "Unknown job", body = ApiError),
        (status = 409, description = "Job is not in a retryable state", body = ApiError)
    ),
    tag = "jobs"
)]
pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Response, ApiError> {
    let job_id = parse_id(&id)?;
    state.admin().retry(job_id).await?;
    Ok(found(&return_to.jobs_location()))
}

/// Terminate a queued or running job
#[utoipa::path(
    put,
    path = "/jobs/{id}/discard",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Job id (UUID)"), ReturnTo),
    responses(
        (status = 302, description = "Discarded; redirects to the filtered job list"),
        (status = 404, description = "Unknown job", body = ApiError),
        (status = 409, description = "Job already finished", body = ApiError)
    ),
    tag = "jobs"
)]
pub async fn discard_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Response, ApiError> {
    let job_id = parse_id(&id)?;
    state.admin().discard(job_id).await?;
    Ok(found(&return_to.jobs_location()))
}
