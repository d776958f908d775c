//! Axum routes for the forensics service.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::attribution::AttributionSummary;
use crate::diff::{semantic_diff, DiffChunk, render_html};
use crate::policy::AttributionPolicyV1;
use crate::store::MessageStore;
use crate::types::{Atom, BatchReport, MessagePayload, ProcessOutcome, ProcessStatus};
use crate::verification::{CacheStats, CachedVerification};
use crate::SCHEMA_VERSION;

use super::middleware::{record_atomize_metrics, record_quote_verification};
use super::state::{PolicyRef, ServiceState};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to atomize and attribute a message body without persisting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomizeRequest {
    /// Message id used to derive atom ids (default: `preview`).
    #[serde(default)]
    pub message_id: Option<String>,
    /// HTML body.
    #[serde(default)]
    pub html: Option<String>,
    /// Plain-text body.
    #[serde(default)]
    pub plain: Option<String>,
    /// Sender address.
    #[serde(default)]
    pub sender: Option<String>,
    /// Thread participants for quoted-party resolution.
    #[serde(default)]
    pub participants: Option<Vec<String>>,
}

/// Atoms and attribution counts for one body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomizeResponse {
    /// Atoms in document order.
    pub atoms: Vec<Atom>,
    /// Attribution counts.
    pub summary: AttributionSummary,
    /// Policy used.
    pub policy_ref: PolicyRef,
}

/// Request to verify a claimed quotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyQuoteRequest {
    /// Claimed quotation.
    pub quote: String,
    /// Original text.
    pub original: String,
}

/// Request to diff two texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRequest {
    /// Before.
    pub a: String,
    /// After.
    pub b: String,
}

/// Diff as chunks and rendered HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    /// Cleaned-up edit chunks.
    pub chunks: Vec<DiffChunk>,
    /// HTML rendering of `chunks`.
    pub html: String,
}

/// Batch of messages to process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProcessRequest {
    /// Messages in processing order.
    pub messages: Vec<MessagePayload>,
}

/// Active policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    /// Policy reference.
    pub policy_ref: PolicyRef,
    /// Full rule table.
    pub policy: AttributionPolicyV1,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub policy_ref: PolicyRef,
    pub store_connected: bool,
    pub classifier_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_cache: Option<CacheStats>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: bool,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(code = %self.code, error = %self.error, "Request error");
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Atomize and attribute a body. Nothing is persisted or classified.
async fn atomize_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Json(request): Json<AtomizeRequest>,
) -> Result<Json<AtomizeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let start = Instant::now();
    let pipeline = &state.pipeline;
    let message_id = request.message_id.as_deref().unwrap_or("preview");
    let sender = request.sender.as_deref().unwrap_or(crate::pipeline::UNKNOWN_SENDER);

    let mut atoms = pipeline
        .atomizer()
        .atomize(
            message_id,
            request.html.as_deref().unwrap_or(""),
            request.plain.as_deref().unwrap_or(""),
            Some(sender),
        )
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("ATOMIZE_FAILED", e.to_string()).with_details(message_id)),
            )
        })?;
    let summary = pipeline
        .engine()
        .attribute_atoms(&mut atoms, sender, request.participants.as_deref());

    record_atomize_metrics(atoms.len(), start.elapsed().as_millis() as u64);
    Ok(Json(AtomizeResponse {
        atoms,
        summary,
        policy_ref: state.policy_ref(),
    }))
}

/// Verify a claimed quotation against an original.
async fn verify_quote_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Json(request): Json<VerifyQuoteRequest>,
) -> Json<CachedVerification> {
    let verification = state.verifier.verify(&request.quote, &request.original);
    record_quote_verification(verification.result.matched, verification.cache_hit);
    Json(verification)
}

/// Semantic diff between two texts.
async fn diff_handler(Json(request): Json<DiffRequest>) -> Json<DiffResponse> {
    let chunks = semantic_diff(&request.a, &request.b);
    let html = render_html(&chunks);
    Json(DiffResponse { chunks, html })
}

/// Run one message through the pipeline.
///
/// Returns 200 for `success` and `skipped`, 500 for `error`, always with
/// the outcome as body.
async fn process_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Json(payload): Json<MessagePayload>,
) -> (StatusCode, Json<ProcessOutcome>) {
    let outcome = state.pipeline.process_message(&payload).await;
    let status = match outcome.status {
        ProcessStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    (status, Json(outcome))
}

/// Run many messages through the pipeline.
async fn batch_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Json(request): Json<BatchProcessRequest>,
) -> Json<BatchReport> {
    Json(state.pipeline.process_batch(request.messages).await)
}

/// Active attribution policy.
async fn policy_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<PolicyResponse> {
    Json(PolicyResponse {
        policy_ref: state.policy_ref(),
        policy: state.pipeline.engine().policy().clone(),
    })
}

/// Health check endpoint (detailed).
async fn health_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let store_connected = state.pipeline.store().is_healthy().await;

    Json(HealthResponse {
        status: if store_connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        policy_ref: state.policy_ref(),
        store_connected,
        classifier_enabled: state.pipeline.has_classifier(),
        verification_cache: state.verifier.cache_stats(),
        checked_at: chrono::Utc::now(),
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store is reachable, 503 otherwise.
async fn readiness_handler<S: MessageStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.pipeline.store().is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            store: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                store: false,
                details: Some("Message store unreachable".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the forensics service.
pub fn create_router<S: MessageStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Stateless analysis
        .route("/api/atomize", post(atomize_handler::<S>))
        .route("/api/verify_quote", post(verify_quote_handler::<S>))
        .route("/api/diff", post(diff_handler))
        // Pipeline
        .route("/api/messages/process", post(process_handler::<S>))
        .route("/api/messages/batch", post(batch_handler::<S>))
        .route("/api/policy", get(policy_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::store::InMemoryMessageStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> (Router, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        let pipeline = Pipeline::new(Arc::clone(&store));
        (create_router(ServiceState::new(pipeline)), store)
    }

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_atomize_route() {
        let (router, store) = router();
        let (status, body) = call(
            router,
            "POST",
            "/api/atomize",
            Some(json!({
                "html": "<p>Hi.</p><blockquote>Old.</blockquote>",
                "sender": "me@x.com"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["atoms"].as_array().unwrap().len(), 2);
        assert_eq!(body["atoms"][0]["attributedTo"], "me@x.com");
        assert_eq!(body["atoms"][1]["attributionMethod"], "QUOTE_DEPTH");
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_quote_route() {
        let (router, _) = router();
        let (status, body) = call(
            router,
            "POST",
            "/api/verify_quote",
            Some(json!({ "quote": "we paid", "original": "We  PAID" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["match"], true);
        assert_eq!(body["cache_hit"], false);
    }

    #[tokio::test]
    async fn test_diff_route() {
        let (router, _) = router();
        let (_, body) = call(router, "POST", "/api/diff", Some(json!({ "a": "abc", "b": "abd" }))).await;
        assert!(body["html"].as_str().unwrap().contains("<del"));
        assert!(!body["chunks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_route_is_idempotent() {
        let (router, store) = router();
        let message = json!({ "messageId": "m1", "body": "Hello there." });

        let (status, first) = call(router.clone(), "POST", "/api/messages/process", Some(message.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["status"], "success");

        let (_, second) = call(router, "POST", "/api/messages/process", Some(message)).await;
        assert_eq!(second["status"], "skipped");
        assert_eq!(store.transcript_write_count(), 1);
    }

    #[tokio::test]
    async fn test_process_route_reports_error_status() {
        let (router, store) = router();
        store.fail_transcripts(true);
        let (status, body) = call(
            router,
            "POST",
            "/api/messages/process",
            Some(json!({ "messageId": "m1", "body": "Hello." })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_batch_route() {
        let (router, _) = router();
        let (_, body) = call(
            router,
            "POST",
            "/api/messages/batch",
            Some(json!({ "messages": [
                { "messageId": "a", "body": "One." },
                { "messageId": "a", "body": "One." },
                { "messageId": "b", "body": "Two." }
            ]})),
        )
        .await;
        assert_eq!(body["processed"], 2);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["outcomes"][2]["messageId"], "b");
    }

    #[tokio::test]
    async fn test_policy_and_health_routes() {
        let (router, _) = router();
        let (_, policy) = call(router.clone(), "GET", "/api/policy", None).await;
        assert_eq!(policy["policy_ref"]["policy_id"], "attribution_policy_v1");

        let (status, health) = call(router.clone(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");

        let (status, _) = call(router.clone(), "GET", "/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, live) = call(router, "GET", "/health/live", None).await;
        assert_eq!(live["status"], "alive");
    }
}
