// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP server exposing the control plane operations
//!
//! Every route except `/health` requires a matching `x-api-key` header when
//! an API key is configured. Errors are returned as `{"error": "<message>"}`.

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use twinboss_core::application::{ControlPlaneError, ControlPlaneService, PlaybookService, TwinService};
use twinboss_core::domain::generation::ContentGenerator;
use twinboss_core::domain::upsert::{AgentRegistration, HostDomainRequest, StorageSetupRequest};
use twinboss_core::infrastructure::{EventBus, FallbackGenerator};

use crate::commands::ControlPlaneContext;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ControlPlane(ControlPlaneError::InvalidDomain(_))
            | ApiError::ControlPlane(ControlPlaneError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::ControlPlane(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared handler state
pub struct AppState {
    control_plane: Arc<ControlPlaneService>,
    twin: TwinService,
    playbooks: PlaybookService,
    event_bus: Arc<EventBus>,
    api_key: Option<String>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(control_plane: Arc<ControlPlaneService>, generator: Arc<dyn ContentGenerator>) -> Self {
        let event_bus = control_plane.event_bus().clone();
        Self {
            twin: TwinService::new(generator, event_bus.clone()),
            playbooks: PlaybookService::new(control_plane.clone()),
            control_plane,
            event_bus,
            api_key: None,
            metrics: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.is_empty());
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_playbooks(mut self, playbooks: PlaybookService) -> Self {
        self.playbooks = playbooks;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    let protected = Router::new()
        .route("/config", get(config_handler))
        .route("/domains", get(list_domains_handler))
        .route("/domains/host", post(host_domain_handler))
        .route("/storage/date", get(storage_handler))
        .route("/storage/date/setup", post(setup_storage_handler))
        .route("/agents", get(list_agents_handler))
        .route("/agents/register", post(register_agent_handler))
        .route("/agents/create", post(ensure_agent_handler))
        .route("/agents/twin/execute", post(twin_execute_handler))
        .route("/business/integrate", post(business_integrate_handler))
        .route("/admin/automate", post(admin_automate_handler))
        .route("/fundraising/deploy", post(fundraising_deploy_handler))
        .route("/previews/stream", get(previews_stream_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bootstrap the control plane and serve until Ctrl+C / SIGTERM
pub async fn serve(ctx: ControlPlaneContext) -> Result<()> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let bootstrap = ctx
        .control_plane
        .bootstrap()
        .context("Failed to bootstrap control plane")?;
    info!(
        "State ready at revision {} ({} seed domains added)",
        bootstrap.revision,
        bootstrap.seeded.len()
    );

    let generator = FallbackGenerator::from_config(&ctx.config.spec.generation);
    if !generator.is_live() {
        warn!("No OpenAI key configured; twin execution returns placeholder output");
    }

    let api = &ctx.config.spec.api;
    let state = AppState::new(ctx.control_plane.clone(), Arc::new(generator))
        .with_api_key(api.api_key.clone())
        .with_metrics(metrics);

    let addr = format!("{}:{}", api.bind_address, api.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Twin Boss API listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Twin Boss API shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.api_key {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

/// Run a state operation off the async workers
async fn blocking<T, F>(state: &AppState, operation: F) -> Result<T, ApiError>
where
    F: FnOnce(&ControlPlaneService) -> Result<T, ControlPlaneError> + Send + 'static,
    T: Send + 'static,
{
    let control_plane = state.control_plane.clone();
    tokio::task::spawn_blocking(move || operation(&control_plane))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// Like [`blocking`], for operations that need more than the control plane
async fn blocking_with_state<T, F>(state: &Arc<AppState>, operation: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, ControlPlaneError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || operation(&state))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn health_handler() -> Json<serde_json::Value> {
    let now = chrono::Utc::now();
    Json(json!({
        "ok": true,
        "service": "twinboss",
        "time": now.timestamp_millis() as f64 / 1000.0,
    }))
}

async fn config_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = blocking(&state, |cp| cp.config_summary()).await?;
    Ok(Json(json!(summary)))
}

async fn list_domains_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let (domains, revision) = blocking(&state, |cp| cp.list_domains()).await?;
    Ok(Json(json!({ "domains": domains, "revision": revision })))
}

async fn host_domain_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HostDomainRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let hosted = blocking(&state, move |cp| cp.host_domain(&request)).await?;
    Ok(Json(json!({ "domain": hosted.record, "revision": hosted.revision })))
}

async fn storage_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = blocking(&state, |cp| cp.storage_profile()).await?;
    Ok(Json(json!(profile)))
}

async fn setup_storage_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StorageSetupRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ready = blocking(&state, move |cp| cp.setup_storage(&request)).await?;
    Ok(Json(json!({ "storage": ready.record, "revision": ready.revision })))
}

async fn list_agents_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let (agents, revision) = blocking(&state, |cp| cp.list_agents()).await?;
    Ok(Json(json!({ "agents": agents, "revision": revision })))
}

async fn register_agent_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AgentRegistration>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let registered = blocking(&state, move |cp| cp.register_agent(&request)).await?;
    Ok(Json(json!({ "agent": registered.record, "revision": registered.revision })))
}

#[derive(Deserialize)]
struct EnsureAgentBody {
    #[serde(default)]
    name: String,
}

async fn ensure_agent_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnsureAgentBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ensured = blocking(&state, move |cp| cp.ensure_agent(&body.name)).await?;
    let agent = ensured.record;
    Ok(Json(json!({
        "created": agent.name,
        "rights": agent.rights,
        "status": agent.status,
        "slug": agent.slug,
        "revision": ensured.revision,
    })))
}

#[derive(Deserialize)]
struct TwinQuery {
    query: String,
}

async fn twin_execute_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TwinQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.twin.twin_execute(&body.query).await?;
    Ok(Json(json!(outcome)))
}

async fn business_integrate_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let report = blocking_with_state(&state, |state| state.playbooks.business_integrate()).await?;
    Ok(Json(json!(report)))
}

async fn admin_automate_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!(state.playbooks.admin_automate()))
}

async fn fundraising_deploy_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!(state.playbooks.fundraising_deploy().await))
}

async fn previews_stream_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_bus.subscribe_raw()).filter_map(|item| match item {
        Ok(event) => Some(Ok(Event::default().data(event.to_string()))),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!("Preview stream lagged by {} events", n);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
