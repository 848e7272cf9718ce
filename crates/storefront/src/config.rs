//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUBASA_GATEWAY_URL` - Base URL of the payment server
//!
//! ## Optional
//! - `SUBASA_DATA_DIR` - Directory for the shopper's local state (default: .subasa)
//! - `SUBASA_RETURN_URL` - Checkout page the providers send the shopper back to
//!   (default: <http://localhost:5173/checkout>)
//! - `SUBASA_CATALOG_PATH` - JSON snapshot of the document store
//!   (default: `<data dir>/catalog.json`)
//! - `SUBASA_CATALOG_TTL_SECS` - Product cache lifetime in seconds (default: 60)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::catalog::DEFAULT_TTL;

const DEFAULT_DATA_DIR: &str = ".subasa";
const DEFAULT_RETURN_URL: &str = "http://localhost:5173/checkout";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Payment server base URL
    pub gateway_url: Url,
    /// Local state directory (carts, identity, resume keys)
    pub data_dir: PathBuf,
    /// Checkout page the shopper returns to after paying
    pub return_url: Url,
    /// Document store snapshot file
    pub catalog_path: PathBuf,
    /// Product cache lifetime
    pub catalog_ttl: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let gateway_url = parse_url("SUBASA_GATEWAY_URL", &env.required("SUBASA_GATEWAY_URL")?)?;
        let data_dir = PathBuf::from(env.or_default("SUBASA_DATA_DIR", DEFAULT_DATA_DIR));
        let return_url = parse_url(
            "SUBASA_RETURN_URL",
            &env.or_default("SUBASA_RETURN_URL", DEFAULT_RETURN_URL),
        )?;
        let catalog_path = env
            .optional("SUBASA_CATALOG_PATH")
            .map_or_else(|| data_dir.join("catalog.json"), PathBuf::from);
        let catalog_ttl = match env.optional("SUBASA_CATALOG_TTL_SECS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                ConfigError::InvalidEnvVar("SUBASA_CATALOG_TTL_SECS".to_string(), e.to_string())
            })?,
            None => DEFAULT_TTL,
        };

        Ok(Self {
            gateway_url,
            data_dir,
            return_url,
            catalog_path,
            catalog_ttl,
        })
    }

    /// Directory holding the shopper's local storage files.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
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
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
