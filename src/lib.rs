//! FoodEase API library
//!
//! Campus food ordering: cart pricing, manual UPI payment verification,
//! promocodes and the kitchen order workflow.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod common;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use std::{sync::Arc, time::Instant};

use axum::{
    extract::{FromRef, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::auth::AuthService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        event_sender: events::EventSender,
        services: handlers::AppServices,
    ) -> Self {
        let auth = Arc::new(AuthService::new(&config.jwt_secret, config.jwt_expiration));
        Self {
            config,
            auth,
            event_sender,
            services,
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/order", handlers::orders::routes())
        .nest("/promocode", handlers::promocodes::routes())
}

/// Full application router with tracing and request-id layers.
///
/// CORS is left to the binary because it depends on deployment config.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "foodease-api up" }))
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(openapi::routes())
        .nest("/api", api_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "foodease-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let events = if state.event_sender.is_closed() {
        "unhealthy"
    } else {
        "healthy"
    };

    let health_data = json!({
        "status": events,
        "checks": {
            "storage": "healthy",
            "events": events,
        },
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
