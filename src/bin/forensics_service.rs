//! Forensics Service Binary
//!
//! Runs the forensic pipeline as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string; when set, messages are
//!   persisted in PostgreSQL
//! - `WORKER_URL`: remote worker; used for classification, and for
//!   persistence when `DATABASE_URL` is unset
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! Pipeline settings (`FORENSICS_*`) are described in `PipelineConfig`.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run --bin forensics_service --features service
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use thread_forensics::atomizer::{Atomizer, AtomizerConfig};
use thread_forensics::remote::WorkerClient;
use thread_forensics::segment::RuleSegmenter;
use thread_forensics::service::{create_router, metrics_middleware, ServiceState};
use thread_forensics::{
    InMemoryMessageStore, MessageStore, Pipeline, PipelineConfig, PostgresMessageStore,
};

type BoxError = Box<dyn std::error::Error>;

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "forensics_service=info,thread_forensics=info,tower_http=info,sqlx=warn".into()
    });

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds correlation ID and timing
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let trace_id = request
        .headers()
        .get("X-Cloud-Trace-Context")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split('/').next().unwrap_or(s).to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "forensics_service::access",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// Attach shared collaborators and serve until shutdown.
async fn serve<S: MessageStore + 'static>(
    store: S,
    worker: Option<WorkerClient>,
    addr: SocketAddr,
) -> Result<(), BoxError> {
    let config = PipelineConfig::from_env();
    let atomizer = Atomizer::with_config(Arc::new(RuleSegmenter::new()), AtomizerConfig::from_env());
    info!(
        classify_enabled = config.classify_enabled,
        batch_concurrency = config.batch_concurrency,
        engagement_id = %config.engagement_id,
        "Pipeline configured"
    );

    let mut pipeline = Pipeline::new(Arc::new(store))
        .with_atomizer(atomizer)
        .with_config(config);
    match worker {
        Some(worker) => pipeline = pipeline.with_classifier(Arc::new(worker)),
        None => warn!("WORKER_URL not set, classification disabled"),
    }

    let state = ServiceState::new(pipeline);
    info!(
        policy_id = %state.policy_ref().policy_id,
        params_hash = %state.policy_ref().params_hash,
        "Attribution policy loaded"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!(address = %addr, version = env!("CARGO_PKG_VERSION"), "Forensics Service listening");
    let listener = TcpListener::bind(addr).await?;

    info!("Ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");
    info!(version = version, build_sha = build_sha, "Starting Forensics Service");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8002);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let worker = WorkerClient::from_env().transpose()?;

    if std::env::var("DATABASE_URL").is_ok() {
        info!("Connecting to PostgreSQL...");
        let connect_start = Instant::now();

        let store = match tokio::time::timeout(
            Duration::from_secs(30),
            PostgresMessageStore::from_env(),
        )
        .await
        {
            Ok(Ok(store)) => store,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!("PostgreSQL connection timeout after 30s");
                return Err("Database connection timeout".into());
            }
        };
        store.run_migrations().await?;
        info!(
            latency_ms = connect_start.elapsed().as_millis() as u64,
            "PostgreSQL connection established"
        );
        serve(store, worker, addr).await?;
    } else if let Some(worker) = worker {
        info!(base_url = %worker.base_url(), "Persisting through remote worker");
        serve(worker.clone(), Some(worker), addr).await?;
    } else {
        warn!("Neither DATABASE_URL nor WORKER_URL set, using in-memory store");
        serve(InMemoryMessageStore::new(), None, addr).await?;
    }

    info!("Forensics Service shutdown complete");
    Ok(())
}
