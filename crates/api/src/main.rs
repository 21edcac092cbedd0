//! # Experimentation Engine API Server
//!
//! The HTTP edge of the server-side A/B optimization engine (spec.md §1),
//! built with Axum. Serves the six public, CORS-open ingestion endpoints
//! (spec.md §6) a storefront embed script and the merchant platform's
//! webhooks call directly — there is no authenticated surface here, every
//! endpoint is scoped by an explicit `shop` parameter instead of a
//! session/tenant header.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │  Storefront │    │ API Server   │    │ Experimentation │
//! │  embed /    │────│              │────│ Engine          │
//! │  platform   │    │ - Axum HTTP  │    │ - C3 Assignment │
//! │  webhooks   │    │ - Middleware │    │ - C4 Lifecycle  │
//! └─────────────┘    └──────────────┘    │ - C5 Attribution│
//!                                        └─────────────────┘
//! ```
//!
//! ## Middleware Stack
//!
//! 1. **Security headers** — HSTS, CSP, X-Frame-Options
//! 2. **Request ID** — generated/propagated for tracing
//! 3. **Shop context** — best-effort `shop` enrichment for logging
//! 4. **Tracing** — structured request/response spans
//! 5. **Compression**
//! 6. **CORS** — open, per spec.md §6
//!
//! ## Background work
//!
//! A `JobExecutor` backed by `RedisJobQueue` runs alongside the HTTP
//! server and processes `RecomputeAllocationJob`s enqueued by the order
//! webhook, per spec.md §9's work-queue redesign flag.

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use engine_core::jobs::JobHandler;
use engine_core::{Config, CorsConfig, DatabasePool};
use redis::aio::ConnectionManager;
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use axum::http::{HeaderName, HeaderValue, Method};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api_middleware;
mod catalog;
mod error;
mod error_handler;
mod handlers;
mod health;
mod state;

use crate::{
    handlers::{assign, assignments, impression, optimizations, webhooks},
    state::AppState,
};

/// Builds a CORS layer from configuration settings.
///
/// Every endpoint this server exposes is public and read by a storefront
/// embed script running on arbitrary merchant domains, so CORS is
/// deliberately open (spec.md §6) rather than restricted to a known
/// origin list the way an authenticated admin surface would be.
fn build_cors_layer(cors_config: &CorsConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let mut cors = CorsLayer::new();

    if cors_config.allowed_origins.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Result<Vec<HeaderValue>, _> = cors_config.allowed_origins.iter().map(|origin| origin.parse()).collect();
        cors = cors.allow_origin(origins?);
    }

    if cors_config.allowed_methods.contains(&"*".to_string()) {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Result<Vec<Method>, _> = cors_config.allowed_methods.iter().map(|method| method.parse()).collect();
        cors = cors.allow_methods(methods?);
    }

    if cors_config.allowed_headers.contains(&"*".to_string()) {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Result<Vec<HeaderName>, _> = cors_config.allowed_headers.iter().map(|header| header.parse()).collect();
        cors = cors.allow_headers(headers?);
    }

    if !cors_config.expose_headers.is_empty() {
        let expose_headers: Result<Vec<HeaderName>, _> =
            cors_config.expose_headers.iter().map(|header| header.parse()).collect();
        cors = cors.expose_headers(expose_headers?);
    }

    cors = cors.allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting experimentation engine server...");

    let config = Config::load()?;
    info!("Configuration loaded and validated");

    let db = DatabasePool::new(config.database.clone()).await?;
    info!("Database pool initialized");

    db.run_migrations().await?;
    info!("Database migrations completed");

    let redis = init_redis(&config.redis.url).await?;
    info!("Redis connection established");

    let job_queue = state::build_job_queue(redis.clone()).await;
    let app_state = AppState::new(config.clone(), db, redis, job_queue.clone())?;

    let mut executor = state::new_job_executor(job_queue);
    let handler = Arc::new(engine_domain::RecomputeAllocationHandler::new(
        app_state.lifecycle(),
        Arc::new(app_state.evolution_recorder()),
    ));
    info!(job_type = handler.job_type(), "registering job handler");
    executor.register_handler(handler).await;
    executor.start().await?;
    info!("Job executor started");

    let app = create_app(app_state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    executor.stop().await?;
    info!("Server shutdown complete");
    Ok(())
}

fn create_app(state: AppState) -> Result<Router, Box<dyn std::error::Error>> {
    #[derive(OpenApi)]
    #[openapi(
        paths(health::health_check, health::readiness_check,),
        components(schemas()),
        tags(
            (name = "health", description = "Health check endpoints"),
            (name = "optimizations", description = "Active optimization listing for a shop"),
            (name = "ingestion", description = "Assignment and impression ingestion"),
            (name = "webhooks", description = "Order attribution and shop-data redaction webhooks"),
        )
    )]
    struct ApiDoc;

    let router = Router::new()
        .nest("/", create_api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(api_middleware::security_headers::security_headers_middleware))
                .layer(axum::middleware::from_fn(api_middleware::request_id::request_id_middleware))
                .layer(axum::middleware::from_fn(api_middleware::shop_context_middleware))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(build_cors_layer(&state.config.cors)?),
        )
        .with_state(state)
        .fallback(handler_404);

    Ok(router)
}

/// The six public endpoints from spec.md §6, un-nested (no `/api/v1`
/// prefix, no auth-gated subtree — the embed script and the platform's
/// webhook dispatcher expect these paths verbatim).
fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/optimizations", axum::routing::get(optimizations::list_optimizations))
        .route("/assign", axum::routing::post(assign::assign))
        .route("/impression", axum::routing::post(impression::record_impression))
        .route("/assignments/:session_id", axum::routing::get(assignments::list_assignments))
        .route("/webhooks/orders/create", axum::routing::post(webhooks::orders_create))
        .route("/webhooks/shop/redact", axum::routing::post(webhooks::shop_redact))
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "Resource not found" })))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engine_api=debug,engine_domain=debug,engine_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn init_redis(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
