//! # API Handlers
//!
//! HTTP endpoint handlers for the job admin service. Mutating endpoints
//! answer with `302 Found` back to the listing they were issued from.

pub mod cron_entries;
pub mod executions;
pub mod jobs;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorType, validation_error};
use crate::models::ServiceInfo;
use crate::server::AppState;
use crate::status::StateFilter;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// Liveness and database reachability
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service and database are healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    crate::db::health_check(&state.db).await.map_err(|err| {
        tracing::warn!(error = %err, "Health check failed");
        ApiError::from(ErrorType::ServiceUnavailable)
    })?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        database: "ok".to_string(),
    }))
}

/// Listing filter carried through an action so the redirect lands on the
/// same filtered view
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnTo {
    /// State filter of the originating listing
    pub state: Option<String>,
    /// Text query of the originating listing
    pub query: Option<String>,
}

impl ReturnTo {
    /// `/jobs` with the non-empty filter parameters form-urlencoded.
    pub fn jobs_location(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(state) = self.state.as_deref().filter(|s| !s.trim().is_empty()) {
            serializer.append_pair("state", state);
        }
        if let Some(query) = self.query.as_deref().filter(|q| !q.trim().is_empty()) {
            serializer.append_pair("query", query);
        }
        let encoded = serializer.finish();
        if encoded.is_empty() {
            "/jobs".to_string()
        } else {
            format!("/jobs?{}", encoded)
        }
    }
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

pub(crate) fn parse_state(raw: Option<&str>) -> Result<StateFilter, ApiError> {
    raw.unwrap_or_default().parse().map_err(|err: String| {
        validation_error(
            "Invalid state filter",
            serde_json::json!({ "state": format!("{}; expected one of: {}", err, StateFilter::VALUES) }),
        )
    })
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| {
        validation_error(
            "Invalid identifier",
            serde_json::json!({ "id": "Must be a valid UUID" }),
        )
    })
}
