//! Optional HTTP surface, feature-gated behind `http`.
//!
//! Wraps the same `pipeline::run` entry point the CLI uses behind an
//! `axum` router: `POST /diff`, `GET /health`, `GET /version`. Built on
//! the `axum`/`tokio`/`tower-http` stack the pack's `openagents` backend
//! uses for its own HTTP surface.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::{self, Config};
use crate::model::Envelope;
use crate::pipeline;
use crate::utils::git_operations::{GitDriver, SubprocessGitDriver};
use crate::utils::serializer;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
struct AppState {
    driver: std::sync::Arc<dyn GitDriver + Send + Sync>,
}

/// Build the router. Exposed separately from `serve` so tests can drive
/// it in-process with `tower::ServiceExt::oneshot`.
pub fn routes() -> Router {
    let state = AppState { driver: std::sync::Arc::new(SubprocessGitDriver::new()) };
    Router::new()
        .route("/diff", post(diff))
        .route("/health", get(health))
        .route("/version", get(version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the router on `addr` until the process is killed.
pub async fn serve(addr: std::net::SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, routes()).await
}

/// Request body for `POST /diff`, mirroring every CLI-settable `Config`
/// field.
fn default_cap_total() -> u64 {
    config::DEFAULT_CAP_TOTAL
}
fn default_cap_file() -> u64 {
    config::DEFAULT_CAP_FILE
}
fn default_context_lines() -> u32 {
    config::DEFAULT_CONTEXT_LINES
}
fn default_find_renames_threshold() -> u8 {
    config::DEFAULT_FIND_RENAMES_THRESHOLD
}

#[derive(Debug, Deserialize)]
struct DiffRequest {
    repo_url: String,
    commit_good: String,
    commit_candidate: String,
    branch_name: Option<String>,
    #[serde(default = "default_cap_total")]
    cap_total: u64,
    #[serde(default = "default_cap_file")]
    cap_file: u64,
    #[serde(default = "default_context_lines")]
    context_lines: u32,
    #[serde(default = "default_find_renames_threshold")]
    find_renames_threshold: u8,
    #[serde(default)]
    keep_workdir: bool,
    #[serde(default)]
    keep_on_error: bool,
}

impl From<DiffRequest> for Config {
    fn from(req: DiffRequest) -> Config {
        let mut config = Config::new(req.repo_url, req.commit_good, req.commit_candidate);
        config.branch_name = req.branch_name;
        config.cap_total = req.cap_total;
        config.cap_file = req.cap_file;
        config.context_lines = req.context_lines;
        config.find_renames_threshold = req.find_renames_threshold;
        config.keep_workdir = req.keep_workdir;
        config.keep_on_error = req.keep_on_error;
        config
    }
}

/// Render an `Envelope` through the same canonical serializer the CLI
/// uses, rather than `axum::Json`'s declaration-order encoding. The
/// envelope bytes returned over HTTP are still the pipeline's canonical
/// output.
fn canonical_json_response(status: StatusCode, envelope: &Envelope) -> Response {
    match serializer::serialize_canonical(envelope) {
        Ok(body) => (status, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to serialize envelope: {e}"),
        )
            .into_response(),
    }
}

async fn diff(State(state): State<AppState>, Json(req): Json<DiffRequest>) -> Response {
    let config = match Config::from(req).validated() {
        Ok(c) => c,
        Err(e) => return canonical_json_response(StatusCode::BAD_REQUEST, &e.into_envelope()),
    };

    let envelope = pipeline::run_with_driver(state.driver.as_ref(), config);
    let status = if envelope.is_ok() { StatusCode::OK } else { StatusCode::UNPROCESSABLE_ENTITY };
    canonical_json_response(status, &envelope)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    git_available: bool,
    git_version: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let git_version = state.driver.detect_version().ok();
    Json(Health {
        status: "ok",
        version: VERSION,
        git_available: git_version.is_some(),
        git_version,
    })
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: &'static str,
}

async fn version() -> Json<VersionInfo> {
    Json(VersionInfo { version: VERSION })
}
