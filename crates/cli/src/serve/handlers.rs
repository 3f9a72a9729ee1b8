//! Route handlers: service metadata and the three case queries.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use trace_eval::EvalError;
use trace_storage::CaseStore;

use super::json_error;
use super::state::AppState;

/// An engine error on its way out as a JSON response.
pub(crate) struct ApiError(EvalError);

impl From<EvalError> for ApiError {
    fn from(err: EvalError) -> Self {
        ApiError(err)
    }
}

/// HTTP status for each engine error.
pub(crate) fn status_for(err: &EvalError) -> StatusCode {
    match err {
        EvalError::CaseNotFound { .. } => StatusCode::NOT_FOUND,
        EvalError::MalformedLedger { .. }
        | EvalError::UnknownActor { .. }
        | EvalError::InvalidStatus { .. }
        | EvalError::UnclassifiedBreach { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EvalError::AttributionInvariantViolation { .. }
        | EvalError::DigestEncoding { .. }
        | EvalError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }
        json_error(status, &self.0.to_string()).into_response()
    }
}

/// Whether an `If-None-Match` value names `digest`.
///
/// Accepts `*`, comma-separated lists, and weak (`W/`) or bare tags.
fn if_none_match_hits(value: &str, digest: &str) -> bool {
    value.split(',').map(str::trim).any(|tag| {
        if tag == "*" {
            return true;
        }
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(tag);
        tag == digest
    })
}

/// JSON response tagged with the input digest, or 304 when the client
/// already holds it. Both carry the `ETag` header.
fn with_etag<T: Serialize>(headers: &HeaderMap, digest: &str, body: &T) -> Response {
    let etag = format!("\"{}\"", digest);

    let cached = headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| if_none_match_hits(v, digest));

    let mut response = if cached {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(body).into_response()
    };
    if let Ok(val) = etag.parse() {
        response.headers_mut().insert(header::ETAG, val);
    }
    response
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /
pub(crate) async fn handle_root() -> impl IntoResponse {
    let response = serde_json::json!({
        "service": "trace",
        "description": "Responsibility attribution and audit explanation engine",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/health",
            "/api/sla-rules",
            "/api/cases",
            "/api/case/{caseId}",
            "/api/case/{caseId}/responsibility",
            "/api/case/{caseId}/explanation",
        ],
    });
    (StatusCode::OK, Json(response))
}

/// GET /api/health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "ruleVersion": state.queries.engine().rules().version(),
        "cases": state.queries.store().len(),
    });
    (StatusCode::OK, Json(response))
}

/// GET /api/sla-rules
pub(crate) async fn handle_sla_rules(State(state): State<Arc<AppState>>) -> Response {
    match state.queries.engine().rules().to_json() {
        Ok(json) => (StatusCode::OK, Json(json)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode SLA rule table");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode SLA rule table")
                .into_response()
        }
    }
}

/// GET /api/cases
pub(crate) async fn handle_list_cases(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let ids = state
        .queries
        .store()
        .list_case_ids()
        .await
        .map_err(EvalError::from)?;
    Ok(Json(serde_json::json!({ "cases": ids })).into_response())
}

/// GET /api/case/{case_id}
pub(crate) async fn handle_get_case(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
) -> Result<Response, ApiError> {
    let view = state.queries.get_case(&case_id).await?;
    Ok(Json(view).into_response())
}

/// GET /api/case/{case_id}/responsibility
pub(crate) async fn handle_responsibility(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let attribution = state.queries.get_responsibility(&case_id).await?;
    Ok(with_etag(&headers, &attribution.input_digest, &attribution))
}

/// GET /api/case/{case_id}/explanation
pub(crate) async fn handle_explanation(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let explanation = state.queries.get_explanation(&case_id).await?;
    Ok(with_etag(&headers, &explanation.input_digest, &explanation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_eval::LedgerDefect;
    use trace_storage::StorageError;

    #[test]
    fn status_mapping() {
        let not_found = EvalError::CaseNotFound {
            case_id: "X".to_string(),
        };
        assert_eq!(status_for(&not_found), StatusCode::NOT_FOUND);

        let malformed = EvalError::MalformedLedger {
            case_id: "X".to_string(),
            defect: LedgerDefect::Empty,
        };
        assert_eq!(status_for(&malformed), StatusCode::UNPROCESSABLE_ENTITY);

        let unclassified = EvalError::UnclassifiedBreach {
            case_id: "X".to_string(),
            day: 1,
            action_type: None,
        };
        assert_eq!(status_for(&unclassified), StatusCode::UNPROCESSABLE_ENTITY);

        let unknown_actor = EvalError::UnknownActor {
            case_id: "X".to_string(),
            day: 2,
            actor: "Carrier".to_string(),
        };
        assert_eq!(status_for(&unknown_actor), StatusCode::UNPROCESSABLE_ENTITY);

        let invalid_status = EvalError::InvalidStatus {
            case_id: "X".to_string(),
            status: "pending".to_string(),
        };
        assert_eq!(status_for(&invalid_status), StatusCode::UNPROCESSABLE_ENTITY);

        let invariant = EvalError::AttributionInvariantViolation {
            case_id: "X".to_string(),
            attributed: 1,
            records: 2,
            total_days: 2,
        };
        assert_eq!(status_for(&invariant), StatusCode::INTERNAL_SERVER_ERROR);

        let encoding = EvalError::DigestEncoding {
            case_id: "X".to_string(),
            source: serde_json::from_str::<u8>("not json").unwrap_err(),
        };
        assert_eq!(status_for(&encoding), StatusCode::INTERNAL_SERVER_ERROR);

        let storage = EvalError::Storage(StorageError::Backend("down".to_string()));
        assert_eq!(status_for(&storage), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn etag_matches_quoted_and_bare_digest() {
        let body = serde_json::json!({"ok": true});

        let fresh = with_etag(&HeaderMap::new(), "abc123", &body);
        assert_eq!(fresh.status(), StatusCode::OK);
        assert_eq!(fresh.headers()[header::ETAG], "\"abc123\"");

        for inm in ["\"abc123\"", "abc123"] {
            let mut headers = HeaderMap::new();
            headers.insert(header::IF_NONE_MATCH, inm.parse().unwrap());
            let cached = with_etag(&headers, "abc123", &body);
            assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);
            assert_eq!(cached.headers()[header::ETAG], "\"abc123\"");
        }

        let mut stale = HeaderMap::new();
        stale.insert(header::IF_NONE_MATCH, "\"other\"".parse().unwrap());
        assert_eq!(with_etag(&stale, "abc123", &body).status(), StatusCode::OK);
    }

    #[test]
    fn if_none_match_accepts_lists_wildcards_and_weak_tags() {
        assert!(if_none_match_hits("*", "abc123"));
        assert!(if_none_match_hits("\"old\", \"abc123\"", "abc123"));
        assert!(if_none_match_hits("W/\"abc123\"", "abc123"));
        assert!(if_none_match_hits("\"old\",W/\"abc123\"", "abc123"));
        assert!(!if_none_match_hits("\"old\", \"older\"", "abc123"));
        assert!(!if_none_match_hits("W/\"abc\"", "abc123"));
        assert!(!if_none_match_hits("", "abc123"));
    }

    #[test]
    fn not_modified_for_listed_etag() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            "\"stale\", W/\"abc123\"".parse().unwrap(),
        );
        let response = with_etag(&headers, "abc123", &serde_json::json!({}));
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[header::ETAG], "\"abc123\"");
    }
}
