//! HTTP routes for the deploy console.

pub mod api;
pub mod webhook;
pub mod websocket;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::models::build::{BuildInfo, LogQuery, StreamQuery};
use crate::models::job::{JobSummary, JobWithBuilds, ServerInfo};
use crate::services::cluster::Cluster;
use crate::services::deployment_service::{self, DeploymentStatus};
use crate::services::jenkins::{log_stream_after, JobServer, StreamOptions, DEFAULT_POLL_DELAY};
use crate::services::job_service;
use crate::services::log_relay::{relay, BodySink};

use api::{
    success, CreateJobRequest, CreateScanJobRequest, Empty, Envelope, ExistsResponse,
    JobsResponse, LogResponse, ScanAck, TriggerResponse, ValidJson, ValidPath, ValidQuery,
};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobServer>,
    pub cluster: Arc<dyn Cluster>,
    pub config: Arc<ServerConfig>,
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Routes without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Jenkins
        .route("/jenkins/info", get(jenkins_info))
        .route("/jenkins/job", post(create_job))
        .route("/jenkins/scan-job", post(create_scan_job))
        .route("/jenkins/job/{jobName}", axum::routing::delete(delete_job))
        .route("/jenkins/job/{jobName}/exists", get(job_exists))
        .route("/jenkins/job/{jobName}/build", post(trigger_build))
        .route(
            "/jenkins/job/{jobName}/build/{buildNumber}/status",
            get(build_status),
        )
        .route(
            "/jenkins/job/{jobName}/build/{buildNumber}/stop",
            post(stop_build),
        )
        .route(
            "/jenkins/job/{jobName}/build/{buildNumber}/stages",
            get(build_stages),
        )
        .route(
            "/jenkins/job/{jobName}/build/{buildNumber}/log",
            get(build_log),
        )
        .route(
            "/jenkins/job/{jobName}/build/{buildNumber}/log/stream",
            get(stream_log),
        )
        .route("/jenkins/jobs", get(list_jobs))
        .route("/jenkins/jobs-with-builds", get(jobs_with_builds))
        // Deployments
        .route("/deployment/{jobName}/status", get(deployment_status))
        // Webhook
        .route("/webhook/sonarqube", post(sonarqube_webhook))
        // Log subscriptions
        .route("/ws", get(websocket::ws_handler))
        .with_state(state)
}

/// Routes with tracing and CORS for the configured dashboard origins.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

async fn health() -> &'static str {
    "ok"
}

// ── Jenkins ──

async fn jenkins_info(State(state): State<AppState>) -> ApiResult<ServerInfo> {
    let info = state.jobs.server_info().await?;
    Ok(success(info, "Jenkins info retrieved successfully"))
}

async fn job_exists(
    State(state): State<AppState>,
    ValidPath(job_name): ValidPath<String>,
) -> ApiResult<ExistsResponse> {
    let exists = state.jobs.job_exists(&job_name).await?;
    Ok(success(
        ExistsResponse { exists },
        "Job existence checked successfully",
    ))
}

async fn create_job(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateJobRequest>,
) -> Result<(StatusCode, Json<Envelope<TriggerResponse>>), ApiError> {
    let job = req.into_job();
    let queued = job_service::create_and_trigger(
        state.jobs.as_ref(),
        &job,
        &state.config.pipeline_settings(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        success(
            TriggerResponse {
                build_result: queued,
            },
            format!("Job {} created and triggered successfully", job.job_name),
        ),
    ))
}

async fn create_scan_job(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateScanJobRequest>,
) -> Result<(StatusCode, Json<Envelope<TriggerResponse>>), ApiError> {
    let job = req.into_job();
    let queued = job_service::create_scan_and_trigger(
        state.jobs.as_ref(),
        &job,
        &state.config.pipeline_settings(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        success(
            TriggerResponse {
                build_result: queued,
            },
            format!("Job {} created and triggered successfully", job.job_name),
        ),
    ))
}

async fn trigger_build(
    State(state): State<AppState>,
    ValidPath(job_name): ValidPath<String>,
) -> Result<(StatusCode, Json<Envelope<TriggerResponse>>), ApiError> {
    let queued = job_service::trigger_existing(state.jobs.as_ref(), &job_name).await?;
    Ok((
        StatusCode::CREATED,
        success(
            TriggerResponse {
                build_result: queued,
            },
            format!("Job {job_name} triggered successfully"),
        ),
    ))
}

async fn build_status(
    State(state): State<AppState>,
    ValidPath((job_name, number)): ValidPath<(String, u64)>,
) -> ApiResult<BuildInfo> {
    let info = state.jobs.build_info(&job_name, number).await?;
    Ok(success(info, "Build status retrieved successfully"))
}

async fn stop_build(
    State(state): State<AppState>,
    ValidPath((job_name, number)): ValidPath<(String, u64)>,
) -> ApiResult<Empty> {
    state.jobs.stop_build(&job_name, number).await?;
    tracing::info!(job = %job_name, build = number, "Stopped build");
    Ok(success(Empty {}, format!("Build {number} stopped successfully")))
}

async fn build_stages(
    State(state): State<AppState>,
    ValidPath((job_name, number)): ValidPath<(String, u64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stages = state.jobs.build_stages(&job_name, number).await?;
    Ok(Json(stages))
}

async fn delete_job(
    State(state): State<AppState>,
    ValidPath(job_name): ValidPath<String>,
) -> ApiResult<Empty> {
    job_service::delete_job_and_namespace(state.jobs.as_ref(), state.cluster.as_ref(), &job_name)
        .await?;
    Ok(success(
        Empty {},
        format!("Job {job_name} and associated Kubernetes resources deleted successfully"),
    ))
}

async fn list_jobs(State(state): State<AppState>) -> ApiResult<JobsResponse<JobSummary>> {
    let jobs = state.jobs.list_jobs().await?;
    Ok(success(JobsResponse { jobs }, "Jobs listed successfully"))
}

async fn jobs_with_builds(
    State(state): State<AppState>,
) -> ApiResult<JobsResponse<JobWithBuilds>> {
    let jobs = job_service::jobs_with_builds(state.jobs.as_ref()).await?;
    Ok(success(
        JobsResponse { jobs },
        "Jobs with builds listed successfully",
    ))
}

// ── Logs ──

async fn build_log(
    State(state): State<AppState>,
    ValidPath((job_name, number)): ValidPath<(String, u64)>,
    ValidQuery(query): ValidQuery<LogQuery>,
) -> ApiResult<LogResponse> {
    let page = state
        .jobs
        .build_log(
            &job_name,
            number,
            query.start.unwrap_or(0),
            query.format.unwrap_or_default(),
        )
        .await?;
    Ok(success(
        LogResponse::new(page, query.meta.unwrap_or(false)),
        "Build log retrieved successfully",
    ))
}

/// Chunked plain-text console output that follows the build until it ends.
///
/// The first page is fetched before responding so that an unknown build
/// or an unreachable server still gets an error status.
async fn stream_log(
    State(state): State<AppState>,
    ValidPath((job_name, number)): ValidPath<(String, u64)>,
    ValidQuery(query): ValidQuery<StreamQuery>,
) -> Result<Response, ApiError> {
    let options = StreamOptions {
        format: query.format.unwrap_or_default(),
        delay: query
            .delay
            .map(std::time::Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_DELAY),
    };
    let first = match state.jobs.build_log(&job_name, number, 0, options.format).await {
        Ok(page) => page,
        Err(e) => {
            tracing::error!(job = %job_name, build = number, "Log stream failed to start: {e}");
            return Err(ApiError::Stream(
                "Error occurred while streaming log".to_string(),
            ));
        }
    };
    let chunks = log_stream_after(state.jobs.clone(), job_name.clone(), number, first, options);

    let (mut sink, body) = BodySink::channel();
    tokio::spawn(async move {
        let outcome = relay(chunks, &mut sink, &CancellationToken::new()).await;
        tracing::debug!(job = %job_name, build = number, ?outcome, "Log stream finished");
    });

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

// ── Deployments ──

async fn deployment_status(
    State(state): State<AppState>,
    ValidPath(job_name): ValidPath<String>,
) -> Result<Json<DeploymentStatus>, ApiError> {
    let status = deployment_service::deployment_status(&state.config.scratch_dir, &job_name).await?;
    Ok(Json(status))
}

// ── Webhook ──

async fn sonarqube_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ScanAck> {
    crate::metrics::webhook_received("sonarqube");
    let report = webhook::handle_sonarqube(&state.config, &headers, &body)?;
    Ok(success(ScanAck { payload: report }, "Scan Analysis Received"))
}
