//! HTTP service surface (§6): `axum` router over the scan pipeline, kept in
//! the shape of the teacher's `api::serve` / `create_router` (CORS + trace
//! middleware via `tower_http`, a `Json<ApiResponse<T>>` envelope), narrowed
//! to the endpoints this core exposes plus the §11 supplements.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::core::orchestrator::{ScanOrchestrator, ScanOutcome};
use crate::db::{self, SqliteFixtureStore};
use crate::providers::{self, AnyFixtureProvider, FixtureProvider, FixtureStore};

/// Uniform success envelope, matching the teacher's `ApiResponse<T>` wrapper.
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_DATE" | "INVALID_FIXTURE_ID" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Rolling snapshot of the most recent scan, backing `GET /stats/summary`
/// (§11 — no new persistence requirement, a thin in-memory read).
#[derive(Debug, Clone, Default, Serialize)]
struct ScanSummary {
    fixtures_scanned: usize,
    signals_found: usize,
    avg_edge_pct: Option<f64>,
    generated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ScanSummary {
    fn from_outcome(outcome: &ScanOutcome) -> Self {
        let signalling: Vec<f64> = outcome
            .results
            .iter()
            .filter(|r| r.signal.overall)
            .filter_map(|r| r.edge_pct)
            .collect();

        Self {
            fixtures_scanned: outcome.results.len() + outcome.skips.len(),
            signals_found: outcome.results.iter().filter(|r| r.signal.overall).count(),
            avg_edge_pct: if signalling.is_empty() {
                None
            } else {
                Some(signalling.iter().sum::<f64>() / signalling.len() as f64)
            },
            generated_at: Some(chrono::Utc::now()),
        }
    }
}

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<ScanOrchestrator<AnyFixtureProvider>>,
    fixture_provider: Arc<AnyFixtureProvider>,
    fixture_store: Arc<SqliteFixtureStore>,
    pool: SqlitePool,
    last_summary: Arc<Mutex<ScanSummary>>,
}

pub async fn serve(cfg: Config, port: u16) -> anyhow::Result<()> {
    let pool = db::create_pool().await?;
    db::init_database_with_pool(&pool).await?;

    let (orchestrator, fixture_provider) = providers::build_orchestrator(&cfg)?;
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        fixture_provider,
        fixture_store: Arc::new(SqliteFixtureStore::new(pool.clone())),
        pool,
        last_summary: Arc::new(Mutex::new(ScanSummary::default())),
    };

    let app = create_router().with_state(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("FH-over-0.5 scanner listening on port {port}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/scan/today", get(scan_today_handler))
        .route("/scan/date/{date}", get(scan_date_handler))
        .route("/fixtures/{id}", get(get_fixture_handler))
        .route("/fixtures/{id}/scan", get(scan_fixture_handler))
        .route("/stats/summary", get(stats_summary_handler))
        .route("/leagues", get(leagues_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    version: &'static str,
}

// GET /health (§6): {status, timestamp, version}.
async fn health_check() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    }))
}

// GET /scan/today (§6)
async fn scan_today_handler(State(state): State<AppState>) -> Json<ApiResponse<ScanOutcome>> {
    let now = Utc::now();
    let window_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap();
    let window_end = now.date_naive().and_hms_opt(23, 59, 59).unwrap();
    persist_window(&state, Utc.from_utc_datetime(&window_start), Utc.from_utc_datetime(&window_end)).await;

    let outcome = state.orchestrator.scan_today().await;
    *state.last_summary.lock().await = ScanSummary::from_outcome(&outcome);
    Json(ApiResponse::success(outcome))
}

// GET /scan/date/{YYYY-MM-DD} (§6)
async fn scan_date_handler(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<ScanOutcome>>, ApiError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| ApiError {
        error: "INVALID_DATE",
        message: format!("expected YYYY-MM-DD, got '{date}'"),
    })?;

    let window_start = date.and_hms_opt(0, 0, 0).unwrap();
    let window_end = date.and_hms_opt(23, 59, 59).unwrap();
    persist_window(&state, Utc.from_utc_datetime(&window_start), Utc.from_utc_datetime(&window_end)).await;

    let outcome = state.orchestrator.scan_date(date).await;
    *state.last_summary.lock().await = ScanSummary::from_outcome(&outcome);
    Ok(Json(ApiResponse::success(outcome)))
}

// GET /fixtures/{id} (§6)
async fn get_fixture_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<crate::models::Fixture>>, ApiError> {
    match state.fixture_store.get(&id).await {
        Ok(Some(fixture)) => Ok(Json(ApiResponse::success(fixture))),
        Ok(None) => Err(ApiError { error: "NOT_FOUND", message: format!("no fixture '{id}' on file") }),
        Err(e) => {
            tracing::error!("fixture lookup failed for {id}: {e}");
            Err(ApiError { error: "INTERNAL_ERROR", message: e.to_string() })
        }
    }
}

// GET /fixtures/{id}/scan (§6)
async fn scan_fixture_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<crate::models::ScanResult>>, ApiError> {
    let fixture = match state.fixture_store.get(&id).await {
        Ok(Some(f)) => f,
        Ok(None) => {
            return Err(ApiError { error: "NOT_FOUND", message: format!("no fixture '{id}' on file") })
        }
        Err(e) => {
            tracing::error!("fixture lookup failed for {id}: {e}");
            return Err(ApiError { error: "INTERNAL_ERROR", message: e.to_string() });
        }
    };

    match state.orchestrator.scan_fixture(&fixture).await {
        Some(result) => Ok(Json(ApiResponse::success(result))),
        None => Err(ApiError {
            error: "INSUFFICIENT_DATA",
            message: format!("fixture '{id}' is not evaluable yet"),
        }),
    }
}

// GET /stats/summary (§11 supplement)
async fn stats_summary_handler(State(state): State<AppState>) -> Json<ApiResponse<ScanSummary>> {
    let summary = state.last_summary.lock().await.clone();
    Json(ApiResponse::success(summary))
}

// GET /leagues (§11 supplement)
async fn leagues_handler(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    db::list_leagues(&state.pool)
        .await
        .map(|leagues| Json(ApiResponse::success(leagues)))
        .map_err(|e| ApiError { error: "INTERNAL_ERROR", message: e.to_string() })
}

/// Persists every fixture in the scanned window (scheduled or finished) so
/// `GET /fixtures/{id}` and `GET /fixtures/{id}/scan` have something to
/// look up after a scan runs.
async fn persist_window(state: &AppState, window_start: DateTime<Utc>, window_end: DateTime<Utc>) {
    match state.fixture_provider.list_fixtures(window_start, window_end, None).await {
        Ok(fixtures) => {
            if let Err(e) = db::upsert_fixtures(&state.pool, &fixtures).await {
                tracing::error!("failed to persist fixtures for {window_start}..{window_end}: {e}");
            }
        }
        Err(e) => tracing::warn!("fixture discovery failed for {window_start}..{window_end}: {e}"),
    }
}
