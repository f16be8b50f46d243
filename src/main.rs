use dotenv::dotenv;
use performance_analyzer::analyzer::{AnalysisOptions, PerformanceAnalyzer};
use performance_analyzer::api::{self, AppState};
use performance_analyzer::config::AnalyzerConfig;
use performance_analyzer::ml::RemoteClassifier;
use performance_analyzer::queue::RedisJobQueue;
use performance_analyzer::worker;
use performance_analyzer::youtube::YouTubeClient;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(api::search, api::search_json, api::task_status, api::health),
    components(
        schemas(
            api::SearchForm,
            api::SearchRequest,
            api::SearchResponse,
            api::HealthResponse,
            performance_analyzer::queue::JobState,
            performance_analyzer::queue::JobStatus,
            performance_analyzer::analyzer::AnalysisReport,
            performance_analyzer::scoring::Recommendation,
            performance_analyzer::models::VideoScore
        )
    ),
    tags((name = "analysis", description = "Performance recommendation jobs"))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AnalyzerConfig::from_env()?;
    let youtube = YouTubeClient::new(&config.youtube_api_base, config.youtube_api_key.clone())?;
    let classifier = RemoteClassifier::new(
        &config.sidecar_url,
        &config.english_model,
        &config.multilingual_model,
    );
    let analyzer = PerformanceAnalyzer::new(
        Box::new(youtube),
        Box::new(classifier),
        config.scoring,
        config.output_dir.clone(),
    );
    let jobs = RedisJobQueue::connect(&config.redis_url).await?;

    let state = Arc::new(AppState {
        jobs: Arc::new(jobs),
        analyzer: Arc::new(analyzer),
        defaults: AnalysisOptions::from_config(&config),
    });
    tokio::spawn(worker::start_worker(state.clone()));

    let app = api::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new("static")) // Serve Dashboard
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
