//! HTTP route handlers for the probitstat server.
//!
//! Analysis endpoints live under `/v1/` and return JSON; errors are
//! `{"error": ..., "kind": ...}`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pb_core::{DoseGroup, Trial};
use pb_inference::{AnalysisConfig, ProbitAnalysis, ProbitReport};
use pb_viz::{DEFAULT_LINE_POINTS, ProbitArtifacts};
use serde::{Deserialize, Serialize};

use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/v1/health", get(health_handler))
        .route("/v1/probit", post(probit_json_handler))
        .route("/v1/probit/csv", post(probit_csv_handler))
}

async fn root_handler() -> &'static str {
    "OK"
}

// ---------------------------------------------------------------------------
// POST /v1/probit, POST /v1/probit/csv
// ---------------------------------------------------------------------------

/// Request body for `/v1/probit`.
#[derive(Debug, Deserialize)]
struct ProbitRequest {
    /// Bioassay rows `{dose, total, response}`; `dose == 0` is the control.
    rows: Vec<DoseGroup>,

    /// Confidence level for every interval (default 0.95).
    confidence_level: Option<f64>,

    /// Response levels to report (default 0.10 .. 0.99).
    levels: Option<Vec<f64>>,

    /// Include plot artifacts in the response (default: false).
    #[serde(default)]
    artifacts: bool,
}

/// Query parameters for `/v1/probit/csv`.
#[derive(Debug, Deserialize)]
struct CsvParams {
    confidence_level: Option<f64>,
    #[serde(default)]
    artifacts: bool,
}

/// Response body for both analysis endpoints.
#[derive(Debug, Serialize)]
struct ProbitResponse {
    #[serde(flatten)]
    report: ProbitReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<ProbitArtifacts>,
    wall_time_s: f64,
}

async fn probit_json_handler(
    State(state): State<SharedState>,
    body: Result<Json<ProbitRequest>, JsonRejection>,
) -> Result<Json<ProbitResponse>, AppError> {
    let _guard = RequestGuard::enter(&state.inflight, &state.total_requests);
    let Json(req) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let mut config = AnalysisConfig::default();
    if let Some(c) = req.confidence_level {
        config.confidence_level = c;
    }
    if let Some(levels) = req.levels {
        config.levels = levels;
    }
    let trial = Trial::new(req.rows)?;

    run_blocking(trial, config, req.artifacts).await.map(Json)
}

async fn probit_csv_handler(
    State(state): State<SharedState>,
    params: Result<Query<CsvParams>, QueryRejection>,
    body: String,
) -> Result<Json<ProbitResponse>, AppError> {
    let _guard = RequestGuard::enter(&state.inflight, &state.total_requests);
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;

    let mut config = AnalysisConfig::default();
    if let Some(c) = params.confidence_level {
        config.confidence_level = c;
    }
    let trial = pb_core::table::parse_csv_str(&body)?;

    run_blocking(trial, config, params.artifacts).await.map(Json)
}

/// Run the analysis on the blocking pool so the reactor stays responsive.
async fn run_blocking(
    trial: Trial,
    config: AnalysisConfig,
    with_artifacts: bool,
) -> Result<ProbitResponse, AppError> {
    tokio::task::spawn_blocking(move || {
        let t0 = Instant::now();
        let fit = ProbitAnalysis::new(config).run(&trial)?;
        let artifacts = if with_artifacts {
            Some(ProbitArtifacts::from_fit(&fit, DEFAULT_LINE_POINTS)?)
        } else {
            None
        };
        let wall_time_s = t0.elapsed().as_secs_f64();
        tracing::info!(rows = trial.groups().len(), levels = fit.effective_doses.len(), wall_time_s, "probit analysis");
        Ok(ProbitResponse { report: fit.report(), artifacts, wall_time_s })
    })
    .await
    .map_err(|e| AppError::internal("internal", format!("task panicked: {e}")))?
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_s: f64,
    inflight: u64,
    total_requests: u64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: pb_core::VERSION,
        uptime_s: state.started_at.elapsed().as_secs_f64(),
        inflight: state.inflight.load(Ordering::Relaxed),
        total_requests: state.total_requests.load(Ordering::Relaxed),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structured JSON error response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    fn bad_request(msg: String) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind: "validation", message: msg }
    }

    fn internal(kind: &'static str, msg: String) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, kind, message: msg }
    }
}

impl From<pb_core::Error> for AppError {
    fn from(e: pb_core::Error) -> Self {
        use pb_core::Error;
        let status = match &e {
            _ if e.is_input_error() => StatusCode::BAD_REQUEST,
            Error::InsufficientData { .. }
            | Error::DegenerateSlope(_)
            | Error::NonConvergentOptimization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %e, "probit analysis failed");
        }
        Self { status, kind: e.kind(), message: e.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
            "kind": self.kind,
        });
        (self.status, Json(body)).into_response()
    }
}

/// RAII accounting for one request: bumps the counters on entry and
/// decrements `inflight` on drop.
struct RequestGuard<'a>(&'a AtomicU64);

impl<'a> RequestGuard<'a> {
    fn enter(inflight: &'a AtomicU64, total: &AtomicU64) -> Self {
        inflight.fetch_add(1, Ordering::Relaxed);
        total.fetch_add(1, Ordering::Relaxed);
        Self(inflight)
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
