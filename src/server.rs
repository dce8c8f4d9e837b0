//! # Server Configuration
//!
//! Router assembly, OpenAPI document and the serve loop.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::admin::AdminService;
use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers;
use crate::telemetry::{TraceContext, with_trace_context};

const TRACE_HEADER: &str = "x-trace-id";

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    /// Admin service bound to this state's connection and policy
    pub fn admin(&self) -> AdminService {
        AdminService::from_config(self.db.clone(), &self.config)
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/cron_entries", get(handlers::cron_entries::list_cron_entries))
        .route("/cron_entries/{key}", get(handlers::cron_entries::get_cron_entry))
        .route(
            "/cron_entries/{key}/toggle",
            put(handlers::cron_entries::toggle_cron_entry),
        )
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route("/jobs/{id}/retry", put(handlers::jobs::retry_job))
        .route("/jobs/{id}/discard", put(handlers::jobs::discard_job))
        .route("/executions", get(handlers::executions::list_executions))
        .route(
            "/executions/{id}",
            delete(handlers::executions::delete_execution),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Scopes each request in a trace context so error bodies and logs share
/// one id. An incoming `x-trace-id` is reused.
async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let context = TraceContext {
        trace_id: trace_id.clone(),
    };
    request.extensions_mut().insert(context.clone());

    let mut response = with_trace_context(context, next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_HEADER, value);
    }
    response
}

/// Serves the API until `shutdown` is cancelled.
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();
    let app = create_app(AppState::new(config, db));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// State backed by a fresh in-memory SQLite database with migrations applied
pub async fn create_test_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    use migration::{Migrator, MigratorTrait};

    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(AppState::new(config, db))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::cron_entries::list_cron_entries,
        crate::handlers::cron_entries::get_cron_entry,
        crate::handlers::cron_entries::toggle_cron_entry,
        crate::handlers::jobs::list_jobs,
        crate::handlers::jobs::get_job,
        crate::handlers::jobs::retry_job,
        crate::handlers::jobs::discard_job,
        crate::handlers::executions::list_executions,
        crate::handlers::executions::delete_execution,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::error::ApiError,
            crate::status::Status,
            crate::status::StateFilter,
            crate::repositories::cron_entry::CronEntryView,
            crate::repositories::cron_entry::CronEntryEventView,
            crate::handlers::cron_entries::CronEntriesResponse,
            crate::handlers::cron_entries::CronEntryDetail,
            crate::repositories::job::JobView,
            crate::repositories::job::JobDetail,
            crate::repositories::job::JobPage,
            crate::repositories::execution::ExecutionView,
            crate::repositories::execution::ExecutionListItem,
            crate::repositories::execution::ExecutionPage,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "root", description = "Service info and health"),
        (name = "cron_entries", description = "Cron entry registry"),
        (name = "jobs", description = "Jobs and operator actions"),
        (name = "executions", description = "Execution history"),
    ),
    info(
        title = "Jobdesk Admin API",
        description = "Administrative control plane for background jobs",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
