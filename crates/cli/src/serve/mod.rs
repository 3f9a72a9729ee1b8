//! `trace serve` -- HTTP JSON API over stored recovery cases.
//!
//! Loads case files from one or more directories at startup and answers
//! read-only queries with `axum` + `tokio`. Every answer is recomputed
//! from the stored ledger on each request.
//!
//! - CORS headers on all responses (permissive, GET only)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Per-request timeout (default: 10 s, configurable)
//!
//! Endpoints:
//! - GET /                                    - Service banner
//! - GET /api/health                          - Status, rule version, case count
//! - GET /api/sla-rules                       - The active SLA rule table
//! - GET /api/cases                           - Known case ids
//! - GET /api/case/{caseId}                   - Case header and ordered ledger
//! - GET /api/case/{caseId}/responsibility    - Day attribution (ETag)
//! - GET /api/case/{caseId}/explanation       - Audit narrative (ETag)
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trace_eval::{AttributionEngine, AttributionPolicy, CaseQueries, SlaRuleTable};
use trace_storage::MemoryCaseStore;

use crate::config::ServeConfig;

use self::handlers::{
    handle_explanation, handle_get_case, handle_health, handle_list_cases, handle_not_found,
    handle_responsibility, handle_root, handle_sla_rules,
};
use self::middleware::{rate_limit_middleware, timeout_middleware};
use self::state::{AppState, RateLimiter};

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Load the rule table named by the config, or the builtin one.
pub(crate) fn load_rules(
    rules_path: Option<&std::path::Path>,
) -> Result<SlaRuleTable, trace_eval::SlaConfigError> {
    match rules_path {
        Some(path) => SlaRuleTable::from_path(path),
        None => SlaRuleTable::builtin(),
    }
}

/// Build the shared state from a store and a resolved config.
fn build_state(store: MemoryCaseStore, rules: SlaRuleTable, config: &ServeConfig) -> AppState {
    let engine = AttributionEngine::new(Arc::new(rules)).with_policy(AttributionPolicy {
        reject_unclassified_breaches: config.strict_breach_classification,
    });
    AppState {
        queries: CaseQueries::new(Arc::new(store), engine),
        rate_limiter: RateLimiter::new(config.rate_limit_per_minute),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    }
}

/// The full router with middleware applied.
fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/api/health", get(handle_health))
        .route("/api/sla-rules", get(handle_sla_rules))
        .route("/api/cases", get(handle_list_cases))
        .route("/api/case/{case_id}", get(handle_get_case))
        .route(
            "/api/case/{case_id}/responsibility",
            get(handle_responsibility),
        )
        .route("/api/case/{case_id}/explanation", get(handle_explanation))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            timeout_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with cases loaded from `case_dirs`.
pub async fn start_server(
    config: ServeConfig,
    case_dirs: Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rules = load_rules(config.rules_path.as_deref())?;
    tracing::info!(
        version = rules.version(),
        rules = rules.len(),
        "loaded SLA rule table"
    );

    let mut store = MemoryCaseStore::new();
    for dir in &case_dirs {
        let loaded = store.extend_from_dir(dir)?;
        tracing::info!(dir = %dir.display(), cases = loaded, "loaded case files");
    }
    if store.is_empty() {
        tracing::warn!("no cases loaded; every case query will return 404");
    }

    tracing::info!(
        rate_limit = config.rate_limit_per_minute,
        timeout_secs = config.request_timeout_secs,
        strict = config.strict_breach_classification,
        "service limits"
    );

    let state = Arc::new(build_state(store, rules, &config));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("TRACE listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
