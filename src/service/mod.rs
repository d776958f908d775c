//! Forensics REST Service
//!
//! Exposes atomization, quote verification and the message pipeline over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /api/atomize` - Atomize and attribute a body (no persistence)
//! - `POST /api/verify_quote` - Verify a claimed quotation against an original
//! - `POST /api/diff` - Semantic diff of two texts
//! - `POST /api/messages/process` - Run one message through the pipeline
//! - `POST /api/messages/batch` - Run many messages with bounded concurrency
//! - `GET /api/policy` - Active attribution policy
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_atomize_metrics, record_quote_verification};
pub use routes::{create_router, ErrorResponse};
pub use state::{PolicyRef, ServiceState};
