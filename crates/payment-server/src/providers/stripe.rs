//! Stripe Checkout client.
//!
//! Stripe does not settle in dong, so orders are priced in US cents at a
//! configured rate. The session's `success_url` carries
//! `session_id={CHECKOUT_SESSION_ID}`, which Stripe fills in on redirect.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::StripeConfig;

use super::{ProviderError, read_json};

/// Placeholder Stripe replaces with the session id.
pub const SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

/// A created Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

impl CheckoutSession {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: Url,
    vnd_per_usd: Decimal,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| ProviderError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        let mut api_base = config.api_base.clone();
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        Ok(Self {
            client,
            api_base,
            vnd_per_usd: config.vnd_per_usd,
        })
    }

    /// Convert dong to US cents: `round(amount / rate × 100)`.
    #[must_use]
    pub fn usd_cents(&self, amount_vnd: i64) -> i64 {
        let cents = (Decimal::from(amount_vnd) / self.vnd_per_usd * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64().unwrap_or(i64::MAX)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.api_base
            .join(path)
            .map_err(|e| ProviderError::Parse(format!("invalid endpoint {path}: {e}")))
    }

    /// Create a one-line-item Checkout Session for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[instrument(skip(self, success_url, cancel_url))]
    pub async fn create_session(
        &self,
        order_id: &str,
        amount_vnd: i64,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        let unit_amount = self.usd_cents(amount_vnd).to_string();
        let product_name = format!("Thanh toan don hang {order_id}");
        let form = [
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("client_reference_id", order_id),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", "usd"),
            ("line_items[0][price_data][unit_amount]", unit_amount.as_str()),
            ("line_items[0][price_data][product_data][name]", product_name.as_str()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let response = self
            .client
            .post(self.endpoint("v1/checkout/sessions")?)
            .form(&form)
            .send()
            .await?;
        let session: CheckoutSession = read_json(response).await?;
        debug!(session_id = %session.id, "Stripe session created");
        Ok(session)
    }

    /// Fetch a Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the session does not exist.
    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> Result<CheckoutSession, ProviderError> {
        let mut url = self.endpoint("v1/checkout/sessions/")?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Parse("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(session_id);
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }
}
