//! Service middleware for request metrics.
//!
//! ## Metrics Emitted (as tracing events)
//!
//! - `request` - path, method, status and latency of every request
//! - `atomize` - atoms produced per analysed message
//! - `quote_verification` - match outcome and cache hit per verification

use axum::{extract::Request, middleware::Next, response::Response};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "thread_forensics::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Replace UUIDs in a path with `:id` to keep cardinality low.
fn normalize_path(path: &str) -> String {
    static UUID: OnceLock<regex_lite::Regex> = OnceLock::new();
    let uuid = UUID.get_or_init(|| {
        regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("uuid pattern is valid")
    });
    uuid.replace_all(path, ":id").to_string()
}

/// Record atomization metrics.
pub fn record_atomize_metrics(atom_count: usize, latency_ms: u64) {
    info!(
        target: "thread_forensics::metrics",
        metric_type = "atomize",
        atom_count = atom_count,
        latency_ms = latency_ms,
        "atomize_metric"
    );
}

/// Record a quote verification.
pub fn record_quote_verification(matched: bool, cache_hit: bool) {
    let result = if matched { "match" } else { "mismatch" };
    info!(
        target: "thread_forensics::metrics",
        metric_type = "quote_verification",
        result = result,
        cache_hit = cache_hit,
        "quote_verification_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/messages/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/messages/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
