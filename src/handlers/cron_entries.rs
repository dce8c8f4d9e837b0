//! # Cron Entry Handlers

use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::found;
use crate::repositories::CronEntryRepository;
use crate::repositories::cron_entry::{CronEntryEventView, CronEntryView};
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct CronEntriesResponse {
    pub cron_entries: Vec<CronEntryView>,
}

/// Cron entry with its enabled-state history, oldest change first
#[derive(Debug, Serialize, ToSchema)]
pub struct CronEntryDetail {
    #[serde(flatten)]
    pub entry: CronEntryView,
    pub events: Vec<CronEntryEventView>,
}

#[utoipa::path(
    get,
    path = "/cron_entries",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All registered cron entries", body = CronEntriesResponse),
        (status = 401, description = "Missing or invalid operator token", body = ApiError)
    ),
    tag = "cron_entries"
)]
pub async fn list_cron_entries(
    State(state): State<AppState>,
) -> Result<Json<CronEntriesResponse>, ApiError> {
    let entries = CronEntryRepository::new(state.db.clone()).list().await?;
    Ok(Json(CronEntriesResponse {
        cron_entries: entries.into_iter().map(CronEntryView::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/cron_entries/{key}",
    security(("bearer_auth" = [])),
    params(("key" = String, Path, description = "Cron entry key")),
    responses(
        (status = 200, description = "Cron entry and its toggle history", body = CronEntryDetail),
        (status = 404, description = "Unknown key", body = ApiError)
    ),
    tag = "cron_entries"
)]
pub async fn get_cron_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CronEntryDetail>, ApiError> {
    let repo = CronEntryRepository::new(state.db.clone());
    let entry = repo.find(&key).await?;
    let events = repo.events(&key).await?;

    Ok(Json(CronEntryDetail {
        entry: entry.into(),
        events: events.into_iter().map(CronEntryEventView::from).collect(),
    }))
}

/// Flip the entry's enabled flag; takes effect on the scheduler's next tick
#[utoipa::path(
    put,
    path = "/cron_entries/{key}/toggle",
    security(("bearer_auth" = [])),
    params(("key" = String, Path, description = "Cron entry key")),
    responses(
        (status = 302, description = "Toggled; redirects to /cron_entries"),
        (status = 404, description = "Unknown key", body = ApiError)
    ),
    tag = "cron_entries"
)]
pub async fn toggle_cron_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    state.admin().toggle_cron(&key).await?;
    Ok(found("/cron_entries"))
}
