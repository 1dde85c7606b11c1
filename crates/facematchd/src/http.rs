//! HTTP surface: `/health`, `/compare`, and the response mapping.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facematch_core::{Confidence, MATCH_THRESHOLD};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::acquire::ImageSource;
use crate::engine::{CompareError, ComparisonOutcome};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let body_limit = config.max_body_bytes;
    let request_timeout = config.timeouts.request;

    Router::new()
        .route("/health", get(health))
        .route("/compare", post(compare))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(request_timeout, limit_request_time))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    base64_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchBody {
    success: bool,
    #[serde(rename = "match")]
    is_match: bool,
    distance: f64,
    similarity: f64,
    threshold: f64,
    confidence: Confidence,
    processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoFaceBody {
    success: bool,
    #[serde(rename = "match")]
    is_match: bool,
    message: String,
    processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: String,
    uptime: f64,
}

#[derive(Debug, Serialize)]
struct NotFoundBody {
    error: &'static str,
    message: String,
}

/// Every non-success response `/compare` can produce.
#[derive(Debug)]
enum ApiError {
    Validation { error: &'static str, message: String },
    Body(JsonRejection),
    NotReady,
    Comparison { source: CompareError, elapsed: Duration },
    RequestTimeout(Duration),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, elapsed) = match self {
            ApiError::Validation { error, message } => (StatusCode::BAD_REQUEST, error, message, None),
            ApiError::Body(rejection) => {
                let status = match rejection.status() {
                    StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, "Invalid request body", rejection.body_text(), None)
            }
            ApiError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service not ready",
                "Face recognition models are still loading, please retry shortly".to_string(),
                None,
            ),
            ApiError::Comparison { source, elapsed } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Comparison failed",
                source.to_string(),
                Some(elapsed),
            ),
            ApiError::RequestTimeout(limit) => (
                StatusCode::REQUEST_TIMEOUT,
                "Request timeout",
                format!("request did not complete within {limit:?}"),
                None,
            ),
        };

        let body = ErrorBody {
            success: false,
            error,
            message,
            processing_time_ms: elapsed.map(millis),
        };
        (status, Json(body)).into_response()
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: if state.is_ready() { "ready" } else { "loading" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: state.uptime().as_secs_f64(),
    })
}

async fn compare(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!("compare", request_id = %Uuid::new_v4());

    async move {
        let Some(comparator) = state.comparator() else {
            tracing::warn!("rejecting comparison: models not loaded");
            return Err(ApiError::NotReady);
        };

        let Json(request) = payload.map_err(|rejection| {
            tracing::info!(error = %rejection, "rejecting unparsable body");
            ApiError::Body(rejection)
        })?;
        let (url, inline) = validate(request)?;

        tracing::info!(url = %url, inline_chars = inline.len(), "comparison started");
        let result = comparator
            .compare(ImageSource::Remote(url), ImageSource::Inline(inline))
            .await;
        let elapsed = started.elapsed();

        match result {
            Ok(outcome) => Ok(outcome_response(outcome, elapsed)),
            Err(source) => {
                tracing::warn!(
                    error = %source,
                    side = ?source.side(),
                    elapsed_ms = millis(elapsed),
                    "comparison failed"
                );
                Err(ApiError::Comparison { source, elapsed })
            }
        }
    }
    .instrument(span)
    .await
}

/// Both fields present and non-empty; the URL must be http(s).
fn validate(request: CompareRequest) -> Result<(String, String), ApiError> {
    let url = request.image_url.filter(|s| !s.trim().is_empty());
    let inline = request.base64_image.filter(|s| !s.trim().is_empty());

    let (Some(url), Some(inline)) = (url, inline) else {
        return Err(ApiError::Validation {
            error: "Missing required fields",
            message: "Both imageUrl and base64Image are required".into(),
        });
    };

    let url = url.trim().to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::Validation {
            error: "Invalid URL",
            message: "imageUrl must start with http:// or https://".into(),
        });
    }

    Ok((url, inline))
}

fn outcome_response(outcome: ComparisonOutcome, elapsed: Duration) -> Response {
    let processing_time_ms = millis(elapsed);
    match outcome {
        ComparisonOutcome::Verdict(verdict) => {
            tracing::info!(
                is_match = verdict.is_match,
                distance = verdict.distance,
                confidence = ?verdict.confidence,
                elapsed_ms = processing_time_ms,
                "comparison complete"
            );
            Json(MatchBody {
                success: true,
                is_match: verdict.is_match,
                distance: round_to(verdict.distance, 4),
                similarity: round_to(verdict.similarity, 2),
                threshold: MATCH_THRESHOLD,
                confidence: verdict.confidence,
                processing_time_ms,
            })
            .into_response()
        }
        ComparisonOutcome::NoFace { missing, message } => {
            tracing::info!(?missing, elapsed_ms = processing_time_ms, "no face detected");
            Json(NoFaceBody {
                success: false,
                is_match: false,
                message,
                processing_time_ms,
            })
            .into_response()
        }
    }
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<NotFoundBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundBody {
            error: "Not found",
            message: format!("Cannot {method} {}", uri.path()),
        }),
    )
}

/// Connection-level budget: answer 408 if the handler has not responded in time.
async fn limit_request_time(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(limit_ms = millis(limit), "request timed out");
            ApiError::RequestTimeout(limit).into_response()
        }
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "handler panicked");

    let body = ErrorBody {
        success: false,
        error: "Internal server error",
        message: "unexpected failure while handling the request".into(),
        processing_time_ms: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
