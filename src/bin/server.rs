use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use cutlist_optimizer::config::{CalculationRequest, EngineConfig};
use cutlist_optimizer::error::RequestError;
use cutlist_optimizer::solution::SolutionReport;
use cutlist_optimizer::solver::CutListOptimizer;
use cutlist_optimizer::tasks::RunningTask;
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

type AppState = Arc<CutListOptimizer>;

#[derive(Serialize)]
struct ErrorResponse {
    code: u32,
    error: String,
}

#[derive(Serialize)]
struct StopResponse {
    task_id: String,
    stopped: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

impl From<RequestError> for ErrorResponse {
    fn from(e: RequestError) -> Self {
        Self {
            code: e.code(),
            error: e.to_string(),
        }
    }
}

async fn compute(
    State(optimizer): State<AppState>,
    Json(req): Json<CalculationRequest>,
) -> Result<Json<SolutionReport>, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /compute"
    );

    let solution = tokio::task::spawn_blocking(move || optimizer.compute(req))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "compute task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    code: 0,
                    error: "computation failed".to_string(),
                }),
            )
        })?
        .map_err(|e| {
            let status = match e {
                RequestError::TaskAlreadyRunning(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(ErrorResponse::from(e)))
        })?;

    Ok(Json(solution.report()))
}

async fn task_status(
    State(optimizer): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<RunningTask>, StatusCode> {
    optimizer
        .task_status(&task_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn stop_task(
    State(optimizer): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<StopResponse> {
    let stopped = optimizer.stop_task(&task_id);
    Json(StopResponse { task_id, stopped })
}

fn engine_config() -> EngineConfig {
    let defaults = EngineConfig::default();
    let worker_threads = std::env::var("WORKER_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.worker_threads);
    EngineConfig {
        worker_threads,
        ..defaults
    }
}

fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(serve());
}

async fn serve() {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let optimizer: AppState = Arc::new(CutListOptimizer::new(engine_config()));

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/compute", post(compute))
        .route("/tasks/{id}", get(task_status))
        .route("/tasks/{id}/stop", post(stop_task))
        .with_state(optimizer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
