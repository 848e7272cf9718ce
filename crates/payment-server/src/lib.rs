//! Subasa payment server.
//!
//! Signs and forwards payment requests to MoMo, VNPay and Stripe on behalf
//! of the storefront, receives provider notifications, and sends order
//! confirmation mail. The storefront never holds provider secrets.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod providers;
pub mod routes;
pub mod state;

use axum::{Router, routing::get};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub use config::{ConfigError, PaymentServerConfig};
pub use error::AppError;
pub use state::{AppState, StateError};

/// Build the application router.
///
/// Sentry layers are added by the binary so tests do not need a client.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
