//! Route handlers.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::AppState;
use crate::scrapers::fetch::{has_ok_button, strip_ok_popup, FetchStrategy};

/// Most URLs accepted by one batch request.
const MAX_BATCH_URLS: usize = 5000;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub url: Option<String>,
}

/// Fetch a page with browser headers and hand back its HTML.
pub async fn proxy(State(state): State<AppState>, Query(params): Query<ProxyParams>) -> Response {
    let Some(url) = params.url.filter(|u| !u.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "URL parameter is required");
    };

    match state.relay.fetch_once(&url).await {
        Ok(mut html) => {
            if has_ok_button(&html) {
                info!("Removing OK popup from {}", url);
                html = strip_ok_popup(&html);
            }
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response()
        }
        Err(e) => {
            warn!("Relay fetch of {} failed: {}", url, e);
            error_response(StatusCode::BAD_GATEWAY, format!("Failed to fetch URL: {}", e))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    pub source: Option<String>,
}

pub async fn parse_batch(State(state): State<AppState>, Json(request): Json<BatchRequest>) -> Response {
    let urls: Vec<String> = request
        .urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if urls.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No URLs provided");
    }
    if urls.len() > MAX_BATCH_URLS {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("At most {} URLs per batch", MAX_BATCH_URLS),
        );
    }

    let source = request.source.as_deref().or(Some("api"));
    match state.runner.submit(urls, source).await {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(json!({ "jobId": job_id }))).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ParseHtmlRequest {
    pub html: String,
    pub url: String,
}

pub async fn parse_html(State(state): State<AppState>, Json(request): Json<ParseHtmlRequest>) -> Response {
    if request.html.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "HTML content is required");
    }
    let outcome = state
        .service
        .parse_and_save_html(&request.html, &request.url)
        .await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(outcome)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusParams {
    pub job_id: Option<i64>,
}

/// Job row plus its latest log rows.
pub async fn job_status(State(state): State<AppState>, Query(params): Query<JobStatusParams>) -> Response {
    let Some(job_id) = params.job_id else {
        return error_response(StatusCode::BAD_REQUEST, "jobId parameter is required");
    };

    let jobs = state.service.jobs();
    let job = match jobs.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Job not found"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let logs = jobs.recent_logs(Some(job_id)).await.unwrap_or_default();

    Json(json!({ "job": job, "logs": logs })).into_response()
}

pub async fn active_jobs(State(state): State<AppState>) -> Response {
    match state.service.jobs().active_jobs().await {
        Ok(jobs) => Json(json!({ "jobs": jobs })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::{router, AppState};
    use crate::repository::create_memory_pool;
    use crate::scrapers::ProfileRegistry;
    use crate::services::parser::tests::{review_page, FakeFetcher};
    use crate::services::ParserService;

    async fn spawn_server() -> String {
        let pool = create_memory_pool().await.unwrap();
        let fetcher = FakeFetcher::default()
            .with_page("https://casino.guru/a-review", review_page("Alpha Casino"));
        let service = ParserService::new(Arc::new(fetcher), Arc::new(ProfileRegistry::builtin()), pool)
            .with_courtesy_delay(Duration::ZERO);
        let state = AppState::new(Arc::new(service), Duration::from_secs(5)).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_batch_submit_and_poll() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/api/parse-batch", base))
            .json(&serde_json::json!({ "urls": ["https://casino.guru/a-review"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
        let body: serde_json::Value = response.json().await.unwrap();
        let job_id = body["jobId"].as_i64().unwrap();

        let mut status = String::new();
        for _ in 0..100 {
            let body: serde_json::Value = client
                .get(format!("{}/api/job-status?jobId={}", base, job_id))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            status = body["job"]["status"].as_str().unwrap().to_string();
            if status == "completed" {
                assert_eq!(body["job"]["successful_urls"], 1);
                assert!(!body["logs"].as_array().unwrap().is_empty());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, "completed");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let empty = client
            .post(format!("{}/api/parse-batch", base))
            .json(&serde_json::json!({ "urls": ["  "] }))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), 400);

        let missing = client
            .get(format!("{}/api/job-status?jobId=999", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let no_url = client.get(format!("{}/api/proxy", base)).send().await.unwrap();
        assert_eq!(no_url.status(), 400);
    }
}
