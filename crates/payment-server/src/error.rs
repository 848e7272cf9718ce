//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the response is built. Clients get a JSON body
//! `{"error": "..."}` without internal details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::mailer::MailError;
use crate::providers::ProviderError;

/// Application-level error type for the payment server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A payment provider call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider is not configured on this server.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// A provider notification failed signature verification.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Sending mail failed.
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::Mail(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Provider(_) | Self::Mail(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Provider(_) => "Payment provider error".to_string(),
            Self::Mail(_) => "Failed to send email".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_bad_request_keeps_message() {
        let (status, body) = body(AppError::BadRequest("Missing email".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing email");
    }

    #[tokio::test]
    async fn test_provider_error_is_hidden() {
        let err = AppError::Provider(ProviderError::Api {
            status: 401,
            message: "bad key sk_live_123".to_string(),
        });
        let (status, body) = body(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Payment provider error");
    }

    #[tokio::test]
    async fn test_not_configured_is_unavailable() {
        let (status, body) = body(AppError::NotConfigured("Stripe")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Stripe is not configured");
    }
}
