//! HTTP API over a document cascade.
//!
//! - GET/PUT/DELETE /v1/items/{key}
//! - POST /v1/items/{key}/refresh
//! - GET/PUT /v1/all
//! - GET/PUT /v1/lists/{id}
//! - GET /v1/tiers
//! - GET /health
//! - GET /metrics
//!
//! Every cascade route accepts `from` (starting tier name), `skip_read` and
//! `skip_write` (comma-separated capabilities, tier names or positions) and
//! `downstream` (`true`/`false`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::cascade::{CallOptions, ExpirationMode, SharedChain, TierRef, TierSelector};
use crate::config::Config;
use crate::error::CascadeError;
use crate::server::document::Document;

/// Application state shared across handlers.
pub struct AppState {
    pub chain: SharedChain<String, Document>,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route(
            "/v1/items/{key}",
            get(get_item).put(put_item).delete(delete_item),
        )
        .route("/v1/items/{key}/refresh", post(refresh_item))
        .route("/v1/all", get(get_all).put(put_all))
        .route("/v1/lists/{id}", get(get_list).put(put_list))
        .route("/v1/tiers", get(list_tiers))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Per-request cascade options.
#[derive(Debug, Default, Deserialize)]
pub struct CascadeQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub skip_read: Option<String>,
    #[serde(default)]
    pub skip_write: Option<String>,
    #[serde(default)]
    pub downstream: Option<bool>,
}

impl CascadeQuery {
    pub fn options(&self) -> CallOptions {
        let mut opts = CallOptions::new();
        for selector in selectors(self.skip_read.as_deref()) {
            opts = opts.skip_read(selector);
        }
        for selector in selectors(self.skip_write.as_deref()) {
            opts = opts.skip_write(selector);
        }
        if let Some(downstream) = self.downstream {
            opts = opts.downstream(downstream);
        }
        opts
    }
}

/// Positions select by index; everything else goes through
/// `TierSelector::from(&str)`.
fn selectors(list: Option<&str>) -> Vec<TierSelector> {
    list.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(index) => TierSelector::Index(index),
            Err(_) => TierSelector::from(s),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct TierInfo {
    pub index: usize,
    pub name: String,
    pub backend: String,
    pub capabilities: Vec<String>,
    pub ttl_secs: Option<u64>,
    pub mode: ExpirationMode,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub tiers: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error returned by handlers; renders as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Map a cascade failure to a status code and log it.
    fn cascade(request_id: &str, err: CascadeError) -> Self {
        let status = match &err {
            CascadeError::Backend { .. } => StatusCode::BAD_GATEWAY,
            CascadeError::NotConfigured { .. } => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(request_id, status = status.as_u16(), error = %err, "Cascade call failed");
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

fn start_tier<'a>(
    state: &'a AppState,
    query: &CascadeQuery,
) -> Result<TierRef<'a, String, Document>, ApiError> {
    match &query.from {
        Some(name) => state
            .chain
            .tier_by_name(name)
            .ok_or_else(|| ApiError::not_found(format!("unknown tier `{name}`"))),
        None => Ok(state.chain.head()),
    }
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<CascadeQuery>,
) -> Result<Json<Document>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, key, from = start.name(), "Get item");

    start
        .get(&key, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no item under `{key}`")))
}

async fn put_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<CascadeQuery>,
    Json(doc): Json<Document>,
) -> Result<StatusCode, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, key, from = start.name(), "Set item");

    start
        .set(&key, &doc, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<CascadeQuery>,
) -> Result<StatusCode, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, key, from = start.name(), "Delete item");

    start
        .delete(&key, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<CascadeQuery>,
) -> Result<Json<Document>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, key, from = start.name(), "Refresh item");

    start
        .refresh(&key, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no item under `{key}`")))
}

async fn get_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CascadeQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, from = start.name(), "Get all");

    let docs = start
        .get_all(&query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?;
    Ok(Json(docs))
}

async fn put_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CascadeQuery>,
    Json(docs): Json<Vec<Document>>,
) -> Result<StatusCode, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, from = start.name(), count = docs.len(), "Set all");

    start
        .set_all(&docs, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CascadeQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, list = id, from = start.name(), "Get list");

    let docs = start
        .get_list(&id, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?;
    Ok(Json(docs))
}

async fn put_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CascadeQuery>,
    Json(docs): Json<Vec<Document>>,
) -> Result<StatusCode, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let start = start_tier(&state, &query)?;
    info!(request_id, list = id, from = start.name(), count = docs.len(), "Set list");

    start
        .set_list(&id, &docs, &query.options())
        .await
        .map_err(|e| ApiError::cascade(&request_id, e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tiers(State(state): State<Arc<AppState>>) -> Json<Vec<TierInfo>> {
    let tiers = state
        .chain
        .tiers()
        .enumerate()
        .map(|(index, tier)| TierInfo {
            index,
            name: tier.name().to_string(),
            backend: tier.backend().kind().to_string(),
            capabilities: tier.capabilities().iter().map(|c| c.to_string()).collect(),
            ttl_secs: tier.expiration().ttl.map(|ttl| ttl.as_secs()),
            mode: tier.expiration().mode,
        })
        .collect();
    Json(tiers)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tiers: state.chain.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, StatusCode> {
    let body = state.chain.metrics().render().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
