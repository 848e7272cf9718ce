//! Payment provider clients.
//!
//! Each provider signs its requests and notifications with an HMAC over a
//! provider-specific canonical string. Signatures are hex encoded and
//! compared in constant time.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use thiserror::Error;

pub mod momo;
pub mod stripe;
pub mod vnpay;

pub use momo::MomoClient;
pub use stripe::StripeClient;
pub use vnpay::VnpayClient;

/// Errors that can occur when talking to a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The signing key was rejected by the MAC.
    #[error("invalid signing key")]
    InvalidKey,
}

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Hex HMAC-SHA256 of `data`.
///
/// # Errors
///
/// Returns `ProviderError::InvalidKey` if the key is rejected.
pub fn sign_sha256(key: &[u8], data: &str) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| ProviderError::InvalidKey)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Hex HMAC-SHA512 of `data`.
///
/// # Errors
///
/// Returns `ProviderError::InvalidKey` if the key is rejected.
pub fn sign_sha512(key: &[u8], data: &str) -> Result<String, ProviderError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| ProviderError::InvalidKey)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex HMAC-SHA256 signature. Case-insensitive hex.
#[must_use]
pub fn verify_sha256(key: &[u8], data: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    HmacSha256::new_from_slice(key).is_ok_and(|mut mac| {
        mac.update(data.as_bytes());
        mac.verify_slice(&expected).is_ok()
    })
}

/// Check a hex HMAC-SHA512 signature. Case-insensitive hex.
#[must_use]
pub fn verify_sha512(key: &[u8], data: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    HmacSha512::new_from_slice(key).is_ok_and(|mut mac| {
        mac.update(data.as_bytes());
        mac.verify_slice(&expected).is_ok()
    })
}

/// Read a JSON body, turning non-2xx statuses into `ProviderError::Api`.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // RFC 4231 test case 2
        let sig = sign_sha256(b"Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_roundtrip_and_tamper() {
        let sig = sign_sha512(b"secret", "vnp_Amount=100").unwrap();
        assert!(verify_sha512(b"secret", "vnp_Amount=100", &sig));
        assert!(verify_sha512(b"secret", "vnp_Amount=100", &sig.to_uppercase()));
        assert!(!verify_sha512(b"secret", "vnp_Amount=101", &sig));
        assert!(!verify_sha512(b"other", "vnp_Amount=100", &sig));
        assert!(!verify_sha256(b"secret", "x", "not-hex"));
    }
}
