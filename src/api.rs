//! HTTP endpoints for fetching and analyzing emails.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::debug;
use uuid::Uuid;

use crate::digest::{CategorizedResult, DigestService, ResolutionWarning};
use crate::error::DigestError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DigestService>,
    /// Used when a request gives no `limit`.
    pub default_limit: usize,
    pub max_limit: usize,
}

/// Build the Axum router with the digest routes.
pub fn digest_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/emails", post(fetch_emails))
        .route("/analyse", get(analyse))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Failure surfaced to HTTP callers as `{"error", "message", "retryable"}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Digest(DigestError),
}

impl From<DigestError> for ApiError {
    fn from(e: DigestError) -> Self {
        Self::Digest(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Digest(DigestError::Ingestion(_)) => StatusCode::BAD_GATEWAY,
            Self::Digest(DigestError::Generation { .. } | DigestError::Timeout { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Digest(DigestError::SchemaViolation { .. }) => StatusCode::BAD_GATEWAY,
            Self::Digest(DigestError::EmptyBatch) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::BadRequest(message) => serde_json::json!({
                "error": "bad_request",
                "message": message,
                "retryable": false,
            }),
            Self::Digest(e) => serde_json::json!({
                "error": e.kind(),
                "message": e.to_string(),
                "retryable": e.is_retryable(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl AppState {
    fn limit(&self, query: Result<Query<LimitQuery>, QueryRejection>) -> Result<usize, ApiError> {
        let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let limit = query.limit.unwrap_or(self.default_limit);
        if limit == 0 || limit > self.max_limit {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}, got {limit}",
                self.max_limit
            )));
        }
        Ok(limit)
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-digest"
    }))
}

// ── Digest ──────────────────────────────────────────────────────────────

async fn fetch_emails(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state.limit(query)?;
    debug!(limit, "POST /emails");
    let batch = state.service.fetch_emails(limit).await?;
    Ok(Json(serde_json::json!({ "emails": batch.records() })))
}

async fn analyse(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state.limit(query)?;
    debug!(limit, "GET /analyse");
    let analysis = state.service.analyze(limit).await?;
    Ok(Json(AnalysisResponse {
        analysis_id: analysis.id,
        analysis: analysis.result,
        warnings: analysis.warnings,
    }))
}

/// Serialized directly, not through `serde_json::Value`, so category order
/// survives.
#[derive(Debug, Serialize)]
struct AnalysisResponse {
    analysis_id: Uuid,
    analysis: CategorizedResult,
    warnings: Vec<ResolutionWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailError;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                ApiError::Digest(DigestError::Ingestion(MailError::Protocol("x".into()))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Digest(DigestError::Generation { reason: "x".into() }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Digest(DigestError::Timeout {
                    after: std::time::Duration::from_secs(1),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Digest(DigestError::schema_violation("x")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Digest(DigestError::EmptyBatch),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err:?}");
        }
    }
}
