//! Boundary to the companion payment server.
//!
//! The server brokers provider redirects (MoMo, VNPay, Stripe) and sends the
//! order confirmation mail. The storefront only ever needs the redirect URL,
//! an optional provider session id, and Stripe's paid flag.

use std::future::Future;

use thiserror::Error;
use url::Url;

use subasa_core::{OrderConfirmation, PaymentMethod};

pub mod http;

pub use http::HttpPaymentGateway;

/// Errors from the payment server boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Cash on delivery has no provider.
    #[error("payment method {0} has no online provider")]
    UnsupportedMethod(PaymentMethod),
}

/// Where to send the shopper to pay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentRedirect {
    /// Provider payment page. `None` when the provider did not return one.
    pub url: Option<Url>,
    /// Provider-side session id (Stripe), used to ask for the paid flag later.
    pub session_id: Option<String>,
}

/// Payment server operations used by checkout.
pub trait PaymentGateway: Send + Sync {
    /// Ask the server to open a provider payment for `amount` dong.
    fn create_payment(
        &self,
        method: PaymentMethod,
        order_id: &str,
        amount: i64,
    ) -> impl Future<Output = Result<PaymentRedirect, GatewayError>> + Send;

    /// Whether a Stripe checkout session has been paid.
    fn payment_status(&self, session_id: &str) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// Request the order confirmation mail.
    fn send_order_email(
        &self,
        confirmation: &OrderConfirmation,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
