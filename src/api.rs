//! HTTP front end: submit an analysis, poll its status.

use crate::analyzer::{AnalysisOptions, PerformanceAnalyzer};
use crate::error::ApiError;
use crate::queue::{AnalysisJob, JobStatus, JobStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub analyzer: Arc<PerformanceAnalyzer>,
    /// Applied to fields a request leaves out
    pub defaults: AnalysisOptions,
}

/// Fields as an HTML form posts them: every value is text and may be blank.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SearchForm {
    pub query: Option<String>,
    pub num_candidates: Option<String>,
    pub min_duration_in_seconds: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub num_candidates: Option<u32>,
    pub min_duration_in_seconds: Option<u64>,
}

impl TryFrom<SearchForm> for SearchRequest {
    type Error = ApiError;

    fn try_from(form: SearchForm) -> Result<Self, Self::Error> {
        Ok(Self {
            query: form.query,
            num_candidates: parse_field("num_candidates", form.num_candidates)?,
            min_duration_in_seconds: parse_field("min_duration_in_seconds", form.min_duration_in_seconds)?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, ApiError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be a non-negative integer, got {:?}", name, v))),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub task_id: String,
    pub query: String,
    pub num_candidates: u32,
    pub min_duration_in_seconds: u64,
    pub status_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/api/search", post(search_json))
        .route("/status/:task_id", get(task_status))
        .route("/health", get(health))
        .with_state(state)
}

/// Queue an analysis submitted from the dashboard form
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 202, description = "Analysis queued", body = SearchResponse),
        (status = 400, description = "Missing query or malformed number")
    ),
    tag = "analysis"
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SearchForm>,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let request = SearchRequest::try_from(form)?;
    enqueue(&state, request).await
}

/// Queue an analysis from a JSON body
#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 202, description = "Analysis queued", body = SearchResponse),
        (status = 400, description = "Missing query")
    ),
    tag = "analysis"
)]
pub async fn search_json(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    enqueue(&state, request).await
}

async fn enqueue(
    state: &AppState,
    request: SearchRequest,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let query = request.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let num_candidates = request.num_candidates.unwrap_or(state.defaults.num_candidates);
    let min_duration = request
        .min_duration_in_seconds
        .unwrap_or(state.defaults.min_duration_secs);
    let job = AnalysisJob::new(query, num_candidates, min_duration);
    state.jobs.push_job(&job).await?;
    info!("[API] Queued job {} for {:?}", job.id, job.query);

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchResponse {
            status_url: format!("/status/{}", job.id),
            task_id: job.id,
            query: job.query,
            num_candidates,
            min_duration_in_seconds: min_duration,
        }),
    ))
}

/// Current state of a queued analysis
#[utoipa::path(
    get,
    path = "/status/{task_id}",
    params(("task_id" = String, Path, description = "Id returned by the search endpoint")),
    responses((status = 200, description = "Job state", body = JobStatus)),
    tag = "analysis"
)]
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(state.jobs.get_status(&task_id).await?))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "analysis"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::CommentSource;
    use crate::config::AnalyzerConfig;
    use crate::error::IngestionError;
    use crate::ml::LexiconClassifier;
    use crate::queue::memory::MemoryJobStore;
    use crate::queue::JobState;
    use crate::scoring::ScoringParams;
    use crate::youtube::Ingestion;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    struct NoSource;

    #[async_trait]
    impl CommentSource for NoSource {
        async fn search_and_filter(
            &self,
            _query: &str,
            _num_candidates: u32,
            _min_duration_secs: u64,
            _max_comments: u32,
        ) -> Result<Ingestion, IngestionError> {
            Ok(Ingestion::default())
        }
    }

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            jobs: Arc::new(MemoryJobStore::default()),
            analyzer: Arc::new(PerformanceAnalyzer::new(
                Box::new(NoSource),
                Box::new(LexiconClassifier),
                ScoringParams::default(),
                std::env::temp_dir(),
            )),
            defaults: AnalysisOptions::from_config(&AnalyzerConfig::default()),
        })
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/search")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_search_queues_job_with_defaults() {
        let state = state();
        let response = router(state.clone())
            .oneshot(form_post("query=Brahms+Violin+Concerto&num_candidates=&min_duration_in_seconds=120"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = json_body(response).await;
        assert_eq!(body["query"], "Brahms Violin Concerto");
        assert_eq!(body["num_candidates"], 50);
        assert_eq!(body["min_duration_in_seconds"], 120);

        let task_id = body["task_id"].as_str().unwrap();
        let job = state.jobs.pop_job().await.unwrap().unwrap();
        assert_eq!(job.id, task_id);
        assert_eq!(job.min_duration_secs, 120);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let response = router(state()).oneshot(form_post("query=+++")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_malformed_number_is_rejected() {
        let response = router(state())
            .oneshot(form_post("query=Chopin&num_candidates=many"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_json_search_and_status() {
        let state = state();
        let request = Request::builder()
            .method("POST")
            .uri("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"query": "Chopin Ballade 1", "num_candidates": 5}"#))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let task_id = json_body(response).await["task_id"].as_str().unwrap().to_string();

        let status = Request::builder()
            .uri(format!("/status/{}", task_id))
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(status).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["state"], "PENDING");
        assert_eq!(body["status"], crate::queue::PENDING_MESSAGE);

        let job = state.jobs.pop_job().await.unwrap().unwrap();
        crate::worker::process_job(&state, job).await;
        assert_eq!(state.jobs.get_status(&task_id).await.unwrap().state, JobState::Success);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router(state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }
}
