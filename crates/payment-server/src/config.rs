//! Payment server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PAYMENT_HOST` - Bind address (default: 127.0.0.1)
//! - `PAYMENT_PORT` - Listen port (default: 3001)
//! - `PAYMENT_PUBLIC_URL` - URL providers use to reach this server
//!   (default: <http://localhost:3001>)
//! - `CLIENT_RETURN_URL` - Storefront checkout page shoppers return to
//!   (default: <http://localhost:5173/checkout>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! ## MoMo (enabled when `MOMO_SECRET_KEY` is set)
//! - `MOMO_PARTNER_CODE` - Partner code (default: MOMO)
//! - `MOMO_ACCESS_KEY` - Access key
//! - `MOMO_SECRET_KEY` - HMAC-SHA256 signing key
//! - `MOMO_ENDPOINT` - Create endpoint (default: sandbox)
//!
//! ## VNPay (enabled when `VNPAY_HASH_SECRET` is set)
//! - `VNPAY_TMN_CODE` - Terminal code
//! - `VNPAY_HASH_SECRET` - HMAC-SHA512 signing key
//! - `VNPAY_PAY_URL` - Payment page (default: sandbox)
//!
//! ## Stripe (enabled when `STRIPE_SECRET_KEY` is set)
//! - `STRIPE_SECRET_KEY` - Secret API key
//! - `STRIPE_API_BASE` - API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_VND_PER_USD` - Conversion rate (default: 25000)
//!
//! ## SMTP (mail is logged instead of sent when `SMTP_HOST` is unset)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `SMTP_FROM` - Sender address (default: Subasa Shop <subasasport@gmail.com>)

use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_MOMO_ENDPOINT: &str = "https://test-payment.momo.vn/v2/gateway/api/create";
const DEFAULT_VNPAY_PAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_SMTP_FROM: &str = "Subasa Shop <subasasport@gmail.com>";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Payment server configuration.
#[derive(Debug, Clone)]
pub struct PaymentServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of this server, used for provider notification URLs
    pub public_url: Url,
    /// Storefront checkout page shoppers are sent back to
    pub client_return_url: Url,
    pub momo: Option<MomoConfig>,
    pub vnpay: Option<VnpayConfig>,
    pub stripe: Option<StripeConfig>,
    pub smtp: Option<SmtpConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// MoMo wallet configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: SecretString,
    pub endpoint: Url,
}

impl std::fmt::Debug for MomoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MomoConfig")
            .field("partner_code", &self.partner_code)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

/// VNPay configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: SecretString,
    pub pay_url: Url,
}

impl std::fmt::Debug for VnpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnpayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"[REDACTED]")
            .field("pay_url", &self.pay_url.as_str())
            .finish()
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub api_base: Url,
    /// Dong per US dollar used to price the session.
    pub vnd_per_usd: Decimal,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("vnd_per_usd", &self.vnd_per_usd)
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Sender address
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl PaymentServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env
            .or_default("PAYMENT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_HOST".to_string(), e.to_string()))?;
        let port = env
            .or_default("PAYMENT_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            host,
            port,
            public_url: env.url("PAYMENT_PUBLIC_URL", "http://localhost:3001")?,
            client_return_url: env.url("CLIENT_RETURN_URL", "http://localhost:5173/checkout")?,
            momo: MomoConfig::from_env(&env)?,
            vnpay: VnpayConfig::from_env(&env)?,
            stripe: StripeConfig::from_env(&env)?,
            smtp: SmtpConfig::from_env(&env)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MomoConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env.optional("MOMO_SECRET_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            partner_code: env.or_default("MOMO_PARTNER_CODE", "MOMO"),
            access_key: env.required("MOMO_ACCESS_KEY")?,
            secret_key: SecretString::from(secret_key),
            endpoint: env.url("MOMO_ENDPOINT", DEFAULT_MOMO_ENDPOINT)?,
        }))
    }
}

impl VnpayConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Option<Self>, ConfigError> {
        let Some(hash_secret) = env.optional("VNPAY_HASH_SECRET") else {
            return Ok(None);
        };
        Ok(Some(Self {
            tmn_code: env.required("VNPAY_TMN_CODE")?,
            hash_secret: SecretString::from(hash_secret),
            pay_url: env.url("VNPAY_PAY_URL", DEFAULT_VNPAY_PAY_URL)?,
        }))
    }
}

impl StripeConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env.optional("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };
        let vnd_per_usd = env
            .or_default("STRIPE_VND_PER_USD", "25000")
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar("STRIPE_VND_PER_USD".to_string(), e.to_string()))?;
        if vnd_per_usd <= Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "STRIPE_VND_PER_USD".to_string(),
                "must be positive".to_string(),
            ));
        }
        Ok(Some(Self {
            secret_key: SecretString::from(secret_key),
            api_base: env.url("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)?,
            vnd_per_usd,
        }))
    }
}

impl SmtpConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = env.optional("SMTP_HOST") else {
            return Ok(None);
        };
        let smtp_port = env
            .or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;
        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: env.required("SMTP_USERNAME")?,
            smtp_password: SecretString::from(env.required("SMTP_PASSWORD")?),
            from_address: env.or_default("SMTP_FROM", DEFAULT_SMTP_FROM),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn url(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        Url::parse(self.or_default(key, default).trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}
