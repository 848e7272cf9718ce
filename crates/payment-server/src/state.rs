//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::PaymentServerConfig;
use crate::mailer::Mailer;
use crate::providers::{MomoClient, ProviderError, StripeClient, VnpayClient};

/// Path MoMo posts instant payment notifications to.
pub const MOMO_IPN_PATH: &str = "api/payment/momo/ipn";

/// Error building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid public_url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("provider client: {0}")]
    Provider(#[from] ProviderError),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Providers without configuration are `None`
/// and their routes answer 503.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PaymentServerConfig,
    momo: Option<MomoClient>,
    vnpay: Option<VnpayClient>,
    stripe: Option<StripeClient>,
    mailer: Option<Mailer>,
}

impl AppState {
    /// Build provider clients for every configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built from its configuration.
    pub fn new(config: PaymentServerConfig) -> Result<Self, StateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(ProviderError::from)?;

        let momo = match &config.momo {
            Some(momo) => Some(MomoClient::new(
                client,
                momo.clone(),
                config.client_return_url.clone(),
                config.public_url.join(MOMO_IPN_PATH)?,
            )),
            None => None,
        };
        let vnpay = config
            .vnpay
            .clone()
            .map(|vnpay| VnpayClient::new(vnpay, config.client_return_url.clone()));
        let stripe = config.stripe.as_ref().map(StripeClient::new).transpose()?;
        let mailer = config.smtp.as_ref().map(Mailer::new).transpose()?;

        tracing::info!(
            momo = momo.is_some(),
            vnpay = vnpay.is_some(),
            stripe = stripe.is_some(),
            smtp = mailer.is_some(),
            "Payment providers configured"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                momo,
                vnpay,
                stripe,
                mailer,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PaymentServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn momo(&self) -> Option<&MomoClient> {
        self.inner.momo.as_ref()
    }

    #[must_use]
    pub fn vnpay(&self) -> Option<&VnpayClient> {
        self.inner.vnpay.as_ref()
    }

    #[must_use]
    pub fn stripe(&self) -> Option<&StripeClient> {
        self.inner.stripe.as_ref()
    }

    /// SMTP mailer; `None` means confirmations are only logged.
    #[must_use]
    pub fn mailer(&self) -> Option<&Mailer> {
        self.inner.mailer.as_ref()
    }

    /// Where the shopper lands after paying on a provider page.
    #[must_use]
    pub fn client_return_url(&self) -> &Url {
        &self.inner.config.client_return_url
    }
}
