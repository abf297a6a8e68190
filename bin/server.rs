// Company Registry Sync - Web Server
// REST API with Axum. Every route is one orchestrator call.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use company_sync::logging::init_tracing;
use company_sync::{
    Company, CompanyUpdate, Config, CreateOutcome, ErrorKind, LookupResult, SyncAttempt,
    SyncError, SyncOrchestrator, SyncOutcome,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Mutex<SyncOrchestrator>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }
}

#[derive(Deserialize)]
struct CreateRequest {
    registry_number: String,
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError {
    status: StatusCode,
    kind: Option<ErrorKind>,
    message: String,
}

impl ApiError {
    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: None,
            message,
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidFormat => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unreachable | ErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The company exists; a registry-side NotFound must not read as an unknown id
fn sync_failure_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::UNPROCESSABLE_ENTITY,
        other => status_for(other),
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            kind: Some(kind),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.message, "request failed");
        }

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(self.message),
            error_kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Runs one orchestrator call on the blocking pool (SQLite and the registry client block)
async fn call<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&SyncOrchestrator) -> company_sync::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let orchestrator = Arc::clone(&state.orchestrator);

    tokio::task::spawn_blocking(move || {
        let guard = orchestrator
            .lock()
            .map_err(|_| ApiError::internal("orchestrator lock poisoned".to_string()))?;
        f(&guard).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::internal(format!("blocking task failed: {}", e)))?
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/companies - All companies, newest first
async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Company>>>, ApiError> {
    let companies = call(&state, |o| o.list()).await?;
    Ok(Json(ApiResponse::ok(companies)))
}

/// POST /api/companies - Create from registry number
async fn create_company(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateOutcome>>), ApiError> {
    let outcome = call(&state, move |o| {
        o.create_from_registry_number(&request.registry_number)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(outcome))))
}

/// GET /api/companies/:id
async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Company>>, ApiError> {
    let company = call(&state, move |o| o.get(&id)).await?;
    Ok(Json(ApiResponse::ok(company)))
}

/// PATCH /api/companies/:id - Partial update
async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<CompanyUpdate>,
) -> Result<Json<ApiResponse<Company>>, ApiError> {
    let company = call(&state, move |o| o.update(&id, &fields)).await?;
    Ok(Json(ApiResponse::ok(company)))
}

/// DELETE /api/companies/:id
async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let deleted = id.clone();
    call(&state, move |o| o.delete(&id)).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": deleted }))))
}

/// POST /api/companies/:id/sync - Refresh from registry
async fn sync_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome: SyncOutcome = call(&state, move |o| o.sync_company(&id)).await?;

    let status = match outcome.error_kind {
        None => StatusCode::OK,
        Some(kind) => sync_failure_status(kind),
    };
    let body = ApiResponse {
        success: outcome.succeeded,
        error: outcome.error.clone(),
        error_kind: outcome.error_kind,
        data: Some(outcome),
    };

    Ok((status, Json(body)).into_response())
}

/// GET /api/companies/:id/history - Sync attempts, newest first
async fn company_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<SyncAttempt>>>, ApiError> {
    let history = call(&state, move |o| o.sync_history(&id)).await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// GET /api/registry/:number - Registry preview, nothing stored
async fn registry_lookup(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<ApiResponse<LookupResult>>, ApiError> {
    let result = call(&state, move |o| o.lookup(&number)).await?;
    Ok(Json(ApiResponse::ok(result)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/companies", get(list_companies).post(create_company))
        .route(
            "/companies/:id",
            get(get_company).patch(update_company).delete(delete_company),
        )
        .route("/companies/:id/sync", post(sync_company))
        .route("/companies/:id/history", get(company_history))
        .route("/registry/:number", get(registry_lookup))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    info!(addr, version = company_sync::VERSION, "server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

// ============================================================================
// Main Server
// ============================================================================

fn main() -> Result<()> {
    init_tracing("company_sync=info,tower_http=info")?;

    let config = Config::from_env()?;
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    // Built outside the runtime: the blocking registry client must not be
    // created or dropped on an async worker
    let orchestrator = SyncOrchestrator::from_config(&config)?;
    info!(
        path = %config.database_path.display(),
        fallback = orchestrator.registry().has_fallback(),
        sync_on_create = orchestrator.sync_on_create(),
        "database opened"
    );

    let state = AppState {
        orchestrator: Arc::new(Mutex::new(orchestrator)),
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(serve(state.clone(), &config.server_addr));
    drop(runtime);
    drop(state);

    result
}
