//! # Execution Handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue},
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::cursor::decode_cursor;
use crate::error::ApiError;
use crate::handlers::{ReturnTo, found, parse_id, parse_state};
use crate::repositories::ExecutionRepository;
use crate::repositories::execution::{ExecutionListQuery, ExecutionPage};
use crate::server::AppState;

/// Header carrying the confirmation shown after a delete
pub const NOTICE_HEADER: &str = "x-notice";
pub const EXECUTION_DELETED_NOTICE: &str = "Job execution deleted";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListExecutionsParams {
    /// Execution-level state filter
    pub state: Option<String>,
    /// Case-insensitive match against the owning job's class and arguments
    pub query: Option<String>,
    pub limit: Option<u64>,
    pub cursor: Option<String>,
}

#[utoipa::path(
    get,
    path = "/executions",
    security(("bearer_auth" = [])),
    params(ListExecutionsParams),
    responses(
        (status = 200, description = "Executions newest first", body = ExecutionPage),
        (status = 400, description = "Invalid state filter or cursor", body = ApiError)
    ),
    tag = "executions"
)]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(params): Query<ListExecutionsParams>,
) -> Result<Json<ExecutionPage>, ApiError> {
    let filter = parse_state(params.state.as_deref())?;
    let cursor = params
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(decode_cursor)
        .transpose()?;

    let page = ExecutionRepository::new(state.db.clone())
        .list(ExecutionListQuery {
            state: filter,
            query: params.query,
            limit: state.config.effective_limit(params.limit),
            cursor,
        })
        .await?;

    Ok(Json(page))
}

/// Delete one execution; the job disappears once it has none left
#[utoipa::path(
    delete,
    path = "/executions/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Execution id (UUID)"), ReturnTo),
    responses(
        (status = 302, description = "Deleted; redirects to the filtered job list with an x-notice header"),
        (status = 404, description = "Unknown execution", body = ApiError),
        (status = 409, description = "Execution already deleted", body = ApiError)
    ),
    tag = "executions"
)]
pub async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(return_to): Query<ReturnTo>,
) -> Result<Response, ApiError> {
    let execution_id = parse_id(&id)?;
    state.admin().delete_execution(execution_id).await?;

    let mut response = found(&return_to.jobs_location());
    response.headers_mut().insert(
        HeaderName::from_static(NOTICE_HEADER),
        HeaderValue::from_static(EXECUTION_DELETED_NOTICE),
    );
    Ok(response)
}
