use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub mod config;
pub mod error;
pub mod models;
pub mod runlog;
pub mod scheduler;
pub mod scrape;
pub mod store;
pub mod tunnel;

use models::Subject;
use runlog::RunLog;
use scheduler::Runner;
use store::Store;
use tunnel::TunnelWatcher;

/// Page budget for manual runs when the caller does not pass one.
pub const DEFAULT_MAX_PAGES: u32 = 5;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Serialize)]
pub struct RunResponse {
    pub ok: bool,
    pub new_matches: u64,
    pub snapshot_saved: bool,
}

#[derive(Serialize)]
pub struct RunAllResponse {
    pub subjects: usize,
    pub new_matches: u64,
    pub failures: usize,
}

#[derive(Serialize, Deserialize)]
pub struct Schedule {
    pub run_times: String,
}

#[derive(Serialize)]
pub struct LogTail {
    pub lines: Vec<String>,
}

#[derive(Serialize)]
pub struct TunnelRefreshResponse {
    pub updated: bool,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct RunRequest {
    pub user_code: String,
    pub max_pages: Option<u32>,
}

#[derive(Deserialize)]
pub struct RunAllRequest {
    pub max_pages: Option<u32>,
}

#[derive(Deserialize)]
pub struct UpsertSubjectRequest {
    pub user_code: String,
    pub player_name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct LogTailParams {
    pub n: Option<usize>,
}

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// None when scraping is unconfigured; run endpoints answer 503 and the
    /// rest of the surface keeps working.
    pub runner: Option<Arc<Runner>>,
    pub tunnel: Arc<TunnelWatcher>,
    pub log: Arc<RunLog>,
}

// ============================================================================
// Router Setup
// ============================================================================

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .route("/api/run", post(run_one))
        .route("/api/run-all", post(run_all))
        .route("/api/schedule", get(get_schedule).put(put_schedule))
        .route("/api/subjects", get(get_subjects).put(put_subject))
        .route("/api/tunnel/refresh", post(refresh_tunnel))
        .route("/api/logs", get(tail_logs))
        .layer(cors)
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn internal_error(e: impl ToString) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            error: e.to_string(),
        }),
    )
}

fn scraping_unavailable() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError {
            error: "scraping is not configured (WEBDRIVER_URL missing)".to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> &'static str {
    "SF6 Tracker API - v0.1.0"
}

async fn health_check() -> Json<Message> {
    Json(Message {
        message: "Backend is running!".to_string(),
    })
}

/// Manual single-subject run. Bypasses the schedule and runs synchronously
/// relative to the caller.
async fn run_one(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> ApiResult<RunResponse> {
    let runner = state.runner.as_ref().ok_or_else(scraping_unavailable)?;

    let subject = state
        .store
        .subject(&req.user_code)
        .await
        .map_err(internal_error)?
        .unwrap_or_else(|| Subject::unregistered(&req.user_code));

    let max_pages = req.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
    let report = runner.run_subject(&subject, max_pages).await;

    Ok(Json(RunResponse {
        ok: report.ok,
        new_matches: report.new_matches,
        snapshot_saved: report.snapshot_saved,
    }))
}

/// Fan-out run over every active subject, in registry order.
async fn run_all(
    State(state): State<AppState>,
    Json(req): Json<RunAllRequest>,
) -> ApiResult<RunAllResponse> {
    let runner = state.runner.as_ref().ok_or_else(scraping_unavailable)?;

    let max_pages = req.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
    let reports = runner.run_all(max_pages).await;

    Ok(Json(RunAllResponse {
        subjects: reports.len(),
        new_matches: reports.iter().map(|r| r.new_matches).sum(),
        failures: reports.iter().filter(|r| !r.ok).count(),
    }))
}

async fn get_schedule(State(state): State<AppState>) -> ApiResult<Schedule> {
    let run_times = state.store.run_times().await.map_err(internal_error)?;
    Ok(Json(Schedule { run_times }))
}

/// Store the raw CSV as given; the scheduler normalizes entries on every
/// tick, so edits apply without a restart.
async fn put_schedule(
    State(state): State<AppState>,
    Json(schedule): Json<Schedule>,
) -> ApiResult<Schedule> {
    state
        .store
        .set_run_times(&schedule.run_times)
        .await
        .map_err(internal_error)?;
    state
        .log
        .append(&format!("schedule updated: {}", schedule.run_times));
    Ok(Json(schedule))
}

async fn get_subjects(State(state): State<AppState>) -> ApiResult<Vec<Subject>> {
    let subjects = state.store.list_subjects().await.map_err(internal_error)?;
    Ok(Json(subjects))
}

async fn put_subject(
    State(state): State<AppState>,
    Json(req): Json<UpsertSubjectRequest>,
) -> ApiResult<Message> {
    let subject = Subject {
        user_code: req.user_code,
        player_name: req.player_name,
        note: req.note,
        is_active: req.is_active,
    };
    state
        .store
        .upsert_subject(&subject)
        .await
        .map_err(internal_error)?;
    Ok(Json(Message {
        message: format!("subject {} saved", subject.user_code),
    }))
}

async fn refresh_tunnel(State(state): State<AppState>) -> ApiResult<TunnelRefreshResponse> {
    let updated = state.tunnel.refresh(state.store.as_ref(), &state.log).await;
    Ok(Json(TunnelRefreshResponse { updated }))
}

async fn tail_logs(
    State(state): State<AppState>,
    Query(params): Query<LogTailParams>,
) -> ApiResult<LogTail> {
    let n = params.n.unwrap_or(50);
    let lines = state.log.tail(n).map_err(internal_error)?;
    Ok(Json(LogTail { lines }))
}
