//! HTTP server: the relay endpoint used as a fetch strategy, and JSON
//! endpoints for submitting and polling batch jobs.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Settings;
use crate::scrapers::fetch::{build_client, DirectFetch, FetchError, BROWSER_USER_AGENT};
use crate::services::{BatchRunner, ParserService};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ParserService>,
    pub runner: BatchRunner,
    pub relay: Arc<DirectFetch>,
}

impl AppState {
    pub fn new(service: Arc<ParserService>, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = build_client(BROWSER_USER_AGENT, request_timeout)?;
        Ok(Self {
            runner: BatchRunner::new(service.clone()),
            service,
            relay: Arc::new(DirectFetch::navigation(client)),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/proxy", get(handlers::proxy))
        .route("/api/parse-batch", post(handlers::parse_batch))
        .route("/api/parse-html", post(handlers::parse_html))
        .route("/api/job-status", get(handlers::job_status))
        .route("/api/active-jobs", get(handlers::active_jobs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(settings: &Settings, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&settings.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
