//! Local HTTP API over a [`Library`]
//!
//! Endpoints:
//! - `GET  /search?q=<text>&mode=all|any&format=EPUB,PDF&limit=<n>`
//! - `POST /refresh`
//! - `GET  /status`
//! - `GET  /health`

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::crawler::CrawlProgress;
use crate::error::Error;
use crate::library::Library;
use crate::models::{FormatFilter, IndexStatus, MatchMode, RefreshReport, SearchHit};

/// Query parameters for GET /search
#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matches before `limit` was applied
    pub total: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Clone)]
struct AppState {
    library: Arc<Library>,
    shutdown: CancellationToken,
}

type ApiError = (StatusCode, String);

fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::NoIndex | Error::RefreshInProgress => StatusCode::CONFLICT,
        Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        Error::Fetch { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    log::info!("Search request: q='{}' mode={:?} format={:?}", params.q, params.mode, params.format);

    let settings = state.library.settings();
    let mode = match params.mode.as_deref() {
        Some(raw) => raw.parse::<MatchMode>().map_err(|_| {
            (StatusCode::BAD_REQUEST, format!("Unknown mode '{}'. Use 'all' or 'any'.", raw))
        })?,
        None => settings.search.mode,
    };
    let formats = params
        .format
        .as_deref()
        .map(FormatFilter::parse)
        .unwrap_or_else(|| settings.format_filter());
    // 0 means unlimited, as on the command line
    let limit = params.limit.filter(|&n| n > 0);

    match state.library.search_hits(&params.q, mode, &formats, limit) {
        Ok((total, results)) => Ok(Json(SearchResponse { total, results })),
        Err(e) => Err((status_for(&e), e.to_string())),
    }
}

async fn handle_refresh(State(state): State<AppState>) -> Result<Json<RefreshReport>, ApiError> {
    log::info!("Refresh request");

    // A refresh in flight is abandoned when the server shuts down
    let cancel = state.shutdown.child_token();
    match state.library.refresh(&cancel, &|_: CrawlProgress| {}).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            log::error!("Refresh failed: {}", e);
            Err((status_for(&e), e.to_string()))
        }
    }
}

async fn handle_status(State(state): State<AppState>) -> Json<IndexStatus> {
    Json(state.library.status())
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "dirdex is running")
}

/// Build the API router; `shutdown` cancels any refresh started through it
pub fn router(library: Arc<Library>, shutdown: CancellationToken) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", get(handle_search))
        .route("/refresh", post(handle_refresh))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { library, shutdown })
}

/// Serve the API until Ctrl-C
pub async fn serve(library: Arc<Library>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    log::info!("Server listening on {}", addr);

    let shutdown = CancellationToken::new();
    let app = router(library, shutdown.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down server");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    Ok(())
}
