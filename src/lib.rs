pub mod config;
pub mod error;
pub mod github;
pub mod metrics;
pub mod report;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use config::{AppConfig, ConfigStore, RepoId};
use error::ReportError;
use metrics::{AuthorTally, MonthlyIssueCounts};
use report::{ActivityReport, ResponseMetrics};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Ambient configuration loaded from environment variables.
    pub config: AppConfig,
    /// The currently configured repository, set via `POST /api/config`.
    pub store: ConfigStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: ConfigStore::new(),
        }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let serve_dir = ServeDir::new("dist").not_found_service(ServeFile::new("dist/index.html"));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/reports/activity", get(get_activity_report))
        .route("/api/reports/contributions", get(get_contributions))
        .route("/api/reports/response-times", get(get_response_metrics))
        .route("/api/reports/issues/monthly", get(get_monthly_issues))
        .route("/api/reports/pulls/monthly", get(get_monthly_pulls))
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "activity-backend",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
pub struct ConfigParams {
    pub owner: String,
    pub repo: String,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub status: &'static str,
    pub repo: Option<RepoId>,
}

/// Applies a repository configuration. The request body is the credential
/// file's raw bytes; an empty body means "no credential supplied" and leaves
/// the previous configuration in place.
pub async fn set_config(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfigParams>,
    body: Bytes,
) -> Result<Json<ConfigResponse>, ReportError> {
    let owner = params.owner.trim();
    let repo = params.repo.trim();
    if owner.is_empty() || repo.is_empty() {
        return Err(ReportError::BadRequest(
            "owner and repo must be non-empty".to_string(),
        ));
    }

    let credential = (!body.is_empty()).then_some(body.as_ref());
    let applied = state
        .store
        .configure(owner, repo, credential, &state.config)?;

    let status = if applied { "configured" } else { "unchanged" };
    tracing::info!(owner, repo, status, "configuration request");

    Ok(Json(ConfigResponse {
        status,
        repo: state.store.repo(),
    }))
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Option<RepoId>> {
    Json(state.store.repo())
}

#[derive(Deserialize)]
pub struct WindowParams {
    pub window_days: Option<u32>,
}

#[derive(Deserialize)]
pub struct RangeParams {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

pub async fn get_activity_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<ActivityReport>, ReportError> {
    let configured = state.store.current()?;
    let window_days = params
        .window_days
        .unwrap_or(state.config.default_window_days);

    let report =
        report::activity_report(&configured.client, &configured.repo, window_days, Utc::now())
            .await?;

    tracing::debug!(repo = %configured.repo, "returning activity report");
    Ok(Json(report))
}

pub async fn get_contributions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<AuthorTally>>, ReportError> {
    let configured = state.store.current()?;

    let tallies = report::contribution_tally(
        &configured.client,
        &configured.repo,
        params.since,
        params.until,
    )
    .await?;

    tracing::debug!(repo = %configured.repo, authors = tallies.len(), "returning contribution tally");
    Ok(Json(tallies))
}

pub async fn get_response_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<ResponseMetrics>, ReportError> {
    let configured = state.store.current()?;
    let window_days = params
        .window_days
        .unwrap_or(state.config.default_window_days);

    let metrics =
        report::response_metrics(&configured.client, &configured.repo, window_days, Utc::now())
            .await?;

    tracing::debug!(repo = %configured.repo, "returning response metrics");
    Ok(Json(metrics))
}

pub async fn get_monthly_issues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, MonthlyIssueCounts>>, ReportError> {
    let configured = state.store.current()?;
    let summary = report::monthly_issue_summary(&configured.client, &configured.repo).await?;
    Ok(Json(summary))
}

pub async fn get_monthly_pulls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, u64>>, ReportError> {
    let configured = state.store.current()?;
    let summary = report::monthly_pr_summary(&configured.client, &configured.repo).await?;
    Ok(Json(summary))
}
