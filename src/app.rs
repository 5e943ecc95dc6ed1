use crate::assets;
use crate::config;
use crate::state;
use crate::store::MemoryStore;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use serde::Serialize;

mod push;
mod rides;

pub fn app(config: config::AppConfig) -> Router {
    let store = MemoryStore::with_log_retention(config.log_retention);
    router(state::AppState::new(config, store))
}

pub fn router(state: state::AppState) -> Router {
    let service_worker_path = state.config.service_worker_path.clone();
    Router::new()
        .route("/api/push/public-key", get(push::push_public_key))
        .route(
            "/api/push/subscriptions",
            post(push::push_register).delete(push::push_unregister),
        )
        .route("/api/push/send", post(push::push_send))
        .route("/api/push/events", post(push::push_event))
        .route("/api/push/logs", get(push::push_logs))
        .route("/api/push/stats", get(push::push_stats))
        .route("/api/extra-rides", post(rides::ride_request))
        .route("/api/extra-rides/{id}/review", post(rides::ride_review))
        .route(&service_worker_path, get(assets::service_worker))
        .route("/static/push_register.js", get(assets::push_register_script))
        .route("/health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();
    if status.is_server_error() {
        tracing::error!(%method, %path, status = status.as_u16(), "request failed");
    } else {
        tracing::debug!(%method, %path, status = status.as_u16(), "request handled");
    }
    response
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    pub(crate) code: &'static str,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, code: &'static str, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code,
        }),
    )
}
