//! HTTP route handlers for the payment server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//!
//! # Payments
//! POST /api/payment/momo           - Create a MoMo payment, returns {payUrl}
//! POST /api/payment/momo/ipn       - MoMo instant payment notification
//! GET  /api/payment/vnpay          - Signed VNPay payment URL, returns {payUrl}
//! GET  /api/payment/vnpay/ipn      - VNPay instant payment notification
//! POST /api/payment/stripe         - Create a Checkout Session, returns {checkoutUrl, sessionId}
//! GET  /api/payment/stripe/status  - Whether a Checkout Session is paid
//!
//! # Orders
//! POST /api/order/send-email       - Send the order confirmation mail
//! ```

pub mod email;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/momo", post(payment::momo_create))
        .route("/momo/ipn", post(payment::momo_ipn))
        .route("/vnpay", get(payment::vnpay_create))
        .route("/vnpay/ipn", get(payment::vnpay_ipn))
        .route("/stripe", post(payment::stripe_create))
        .route("/stripe/status", get(payment::stripe_status))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new().route("/send-email", post(email::send_email))
}

/// All API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/payment", payment_routes())
        .nest("/api/order", order_routes())
}
