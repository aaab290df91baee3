//! HTTP transport for the ownership registry.
//!
//! Routes:
//! - `GET /?q=...`           HTML page (greeting without `q`)
//! - `GET /api/lookup?q=...` the same evaluation as JSON
//! - `GET|POST /refresh`     rebuild the registry
//! - anything else           404

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use whoowns_core::{query, RefreshOutcome, TeamRegistry};

use crate::render;

/// Query string parameters shared by the page and the JSON API
#[derive(Debug, Deserialize)]
struct QueryParams {
    q: Option<String>,
}

/// Build the router around an explicit registry handle
pub fn router(registry: Arc<TeamRegistry>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/lookup", get(handle_api_lookup))
        .route("/refresh", get(handle_refresh).post(handle_refresh))
        .fallback(handle_not_found)
        .with_state(registry)
}

async fn handle_index(
    State(registry): State<Arc<TeamRegistry>>,
    Query(params): Query<QueryParams>,
) -> Response {
    let text = params.q.clone();
    let evaluation = query::evaluate(&registry, &query::Query::from_param(params.q));
    debug!("Evaluated {} query lines", evaluation.lines().len());
    match render::page(&evaluation, text.as_deref()) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "render failed\n").into_response()
        }
    }
}

async fn handle_api_lookup(
    State(registry): State<Arc<TeamRegistry>>,
    Query(params): Query<QueryParams>,
) -> Json<query::Evaluation> {
    Json(query::evaluate(
        &registry,
        &query::Query::from_param(params.q),
    ))
}

async fn handle_refresh(State(registry): State<Arc<TeamRegistry>>) -> impl IntoResponse {
    match registry.refresh().await {
        Ok(RefreshOutcome::Refreshed(stats)) => (
            StatusCode::OK,
            format!(
                "refreshed generation {}: {} teams, {} links\n",
                stats.generation, stats.teams, stats.links
            ),
        ),
        Ok(RefreshOutcome::Skipped) => {
            (StatusCode::OK, "refresh already in progress\n".to_string())
        }
        Err(e) => {
            error!(error = %e, "Refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("refresh failed: {e}\n"),
            )
        }
    }
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found\n")
}

/// Refresh the registry on a fixed period. The first rebuild happens one
/// period after start; overlapping manual refreshes are skipped by the guard.
pub fn spawn_periodic_refresh(registry: Arc<TeamRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match registry.refresh().await {
                Ok(RefreshOutcome::Refreshed(stats)) => {
                    debug!(generation = stats.generation, "Periodic refresh complete")
                }
                Ok(RefreshOutcome::Skipped) => debug!("Periodic refresh skipped"),
                Err(e) => warn!("Periodic refresh failed: {}", e),
            }
        }
    })
}

/// Bind `listen` and serve until Ctrl-C
pub async fn serve(
    registry: Arc<TeamRegistry>,
    listen: SocketAddr,
    refresh_interval: Option<Duration>,
) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to address: {listen}"))?;
    let local = listener
        .local_addr()
        .context("Failed to get local address")?;

    let refresher = refresh_interval.map(|period| {
        info!("Periodic refresh every {:?}", period);
        spawn_periodic_refresh(registry.clone(), period)
    });

    info!("Serving ownership lookups on http://{}", local);

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(handle) = refresher {
        handle.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
