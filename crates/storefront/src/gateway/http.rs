//! HTTP client for the payment server.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use subasa_core::{OrderConfirmation, PaymentMethod};

use super::{GatewayError, PaymentGateway, PaymentRedirect};

/// Payment server client over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayUrlResponse {
    pay_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StripeSessionResponse {
    checkout_url: Option<String>,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeStatusResponse {
    paid: bool,
}

impl HttpPaymentGateway {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: Url) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Parse(format!("invalid endpoint {path}: {e}")))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

/// Parse a provider URL; empty means "no URL".
fn redirect_url(raw: Option<String>) -> Result<Option<Url>, GatewayError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Url::parse(s.trim())
            .map(Some)
            .map_err(|e| GatewayError::Parse(format!("invalid payment URL {s:?}: {e}"))),
        _ => Ok(None),
    }
}

impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self), fields(method = %method))]
    async fn create_payment(
        &self,
        method: PaymentMethod,
        order_id: &str,
        amount: i64,
    ) -> Result<PaymentRedirect, GatewayError> {
        let body = json!({ "orderId": order_id, "amount": amount });

        let redirect = match method {
            PaymentMethod::Cod => return Err(GatewayError::UnsupportedMethod(method)),
            PaymentMethod::Momo => {
                let url = self.endpoint("api/payment/momo")?;
                let response = self.client.post(url).json(&body).send().await?;
                let data: PayUrlResponse = Self::read_json(response).await?;
                PaymentRedirect {
                    url: redirect_url(data.pay_url)?,
                    session_id: None,
                }
            }
            PaymentMethod::Vnpay => {
                let mut url = self.endpoint("api/payment/vnpay")?;
                url.query_pairs_mut()
                    .append_pair("orderId", order_id)
                    .append_pair("amount", &amount.to_string());
                let response = self.client.get(url).send().await?;
                let data: PayUrlResponse = Self::read_json(response).await?;
                PaymentRedirect {
                    url: redirect_url(data.pay_url)?,
                    session_id: None,
                }
            }
            PaymentMethod::Stripe => {
                let url = self.endpoint("api/payment/stripe")?;
                let response = self.client.post(url).json(&body).send().await?;
                let data: StripeSessionResponse = Self::read_json(response).await?;
                PaymentRedirect {
                    url: redirect_url(data.checkout_url)?,
                    session_id: data.session_id.filter(|s| !s.is_empty()),
                }
            }
        };

        debug!(has_url = redirect.url.is_some(), "Payment created");
        Ok(redirect)
    }

    #[instrument(skip(self))]
    async fn payment_status(&self, session_id: &str) -> Result<bool, GatewayError> {
        let mut url = self.endpoint("api/payment/stripe/status")?;
        url.query_pairs_mut().append_pair("sessionId", session_id);
        let response = self.client.get(url).send().await?;
        let data: StripeStatusResponse = Self::read_json(response).await?;
        Ok(data.paid)
    }

    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id))]
    async fn send_order_email(&self, confirmation: &OrderConfirmation) -> Result<(), GatewayError> {
        let url = self.endpoint("api/order/send-email")?;
        let response = self.client.post(url).json(confirmation).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
