//! VNPay (version 2.1.0) payment URL signing.
//!
//! VNPay has no create call: the server builds the payment page URL itself.
//! The `vnp_*` parameters are sorted by key, form-url-encoded, and signed
//! with HMAC-SHA512 into `vnp_SecureHash`. Returns and IPN calls carry the
//! same kind of signature over the parameters they bring back.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use secrecy::ExposeSecret;
use url::{Url, form_urlencoded};

use crate::config::VnpayConfig;

use super::{ProviderError, sign_sha512, verify_sha512};

pub const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
const VERSION: &str = "2.1.0";
/// Vietnam has no DST; GMT+7 all year.
const VIETNAM_OFFSET_SECS: i32 = 7 * 3600;
const PAYMENT_WINDOW_MINUTES: i64 = 15;

/// VNPay URL builder and signature checker.
#[derive(Clone)]
pub struct VnpayClient {
    config: VnpayConfig,
    return_url: Url,
}

impl VnpayClient {
    #[must_use]
    pub const fn new(config: VnpayConfig, return_url: Url) -> Self {
        Self { config, return_url }
    }

    /// Payment page URL for `amount` dong.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::InvalidKey` if the hash secret is rejected.
    pub fn payment_url(
        &self,
        order_id: &str,
        amount: i64,
        ip_addr: &str,
        now: DateTime<Utc>,
    ) -> Result<Url, ProviderError> {
        let local = |at: DateTime<Utc>| {
            FixedOffset::east_opt(VIETNAM_OFFSET_SECS)
                .map_or_else(|| at.naive_utc(), |tz| at.with_timezone(&tz).naive_local())
                .format("%Y%m%d%H%M%S")
                .to_string()
        };

        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("vnp_Version", VERSION.to_owned());
        params.insert("vnp_Command", "pay".to_owned());
        params.insert("vnp_TmnCode", self.config.tmn_code.clone());
        params.insert("vnp_Amount", amount.saturating_mul(100).to_string());
        params.insert("vnp_CreateDate", local(now));
        params.insert(
            "vnp_ExpireDate",
            local(now + Duration::minutes(PAYMENT_WINDOW_MINUTES)),
        );
        params.insert("vnp_CurrCode", "VND".to_owned());
        params.insert("vnp_IpAddr", ip_addr.to_owned());
        params.insert("vnp_Locale", "vn".to_owned());
        params.insert("vnp_OrderInfo", format!("Thanh toan don hang {order_id}"));
        params.insert("vnp_OrderType", "other".to_owned());
        params.insert("vnp_ReturnUrl", self.return_url.to_string());
        params.insert("vnp_TxnRef", order_id.to_owned());

        let sign_data = canonical(params.iter().map(|(k, v)| (*k, v.as_str())));
        let hash = sign_sha512(self.config.hash_secret.expose_secret().as_bytes(), &sign_data)?;

        let mut url = self.config.pay_url.clone();
        url.set_query(Some(&format!("{sign_data}&{SECURE_HASH}={hash}")));
        Ok(url)
    }

    /// Whether the `vnp_*` parameters of a return or IPN call are signed
    /// with our secret.
    #[must_use]
    pub fn verify(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(hash) = params.get(SECURE_HASH) else {
            return false;
        };
        let sign_data = canonical(
            params
                .iter()
                .filter(|(k, v)| {
                    k.starts_with("vnp_") && *k != SECURE_HASH && *k != SECURE_HASH_TYPE && !v.is_empty()
                })
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        verify_sha512(self.config.hash_secret.expose_secret().as_bytes(), &sign_data, hash)
    }
}

/// Form-url-encode already sorted pairs.
fn canonical<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::SecretString;

    pub(crate) fn client() -> VnpayClient {
        VnpayClient::new(
            VnpayConfig {
                tmn_code: "2QXUI4J4".to_string(),
                hash_secret: SecretString::from("SECRETKEY123"),
                pay_url: Url::parse("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html").unwrap(),
            },
            Url::parse("http://localhost:5173/checkout").unwrap(),
        )
    }

    fn query(url: &Url) -> BTreeMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_payment_url_params() {
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 17, 30, 0).unwrap();
        let url = client().payment_url("ORDER1", 150_000, "127.0.0.1", now).unwrap();
        let params = query(&url);

        assert_eq!(params["vnp_Amount"], "15000000");
        assert_eq!(params["vnp_TxnRef"], "ORDER1");
        assert_eq!(params["vnp_TmnCode"], "2QXUI4J4");
        // 17:30 UTC is 00:30 the next day in Vietnam.
        assert_eq!(params["vnp_CreateDate"], "20250201003000");
        assert_eq!(params["vnp_ExpireDate"], "20250201004500");
        assert_eq!(params["vnp_ReturnUrl"], "http://localhost:5173/checkout");
        assert!(url.query().unwrap().ends_with(&format!("{SECURE_HASH}={}", params[SECURE_HASH])));
    }

    #[test]
    fn test_payment_url_verifies() {
        let client = client();
        let url = client.payment_url("ORDER1", 150_000, "127.0.0.1", Utc::now()).unwrap();
        let mut params = query(&url);
        assert!(client.verify(&params));

        params.insert("vnp_Amount".to_string(), "1".to_string());
        assert!(!client.verify(&params));
    }

    #[test]
    fn test_missing_hash_fails() {
        let mut params = BTreeMap::new();
        params.insert("vnp_TxnRef".to_string(), "ORDER1".to_string());
        assert!(!client().verify(&params));
    }
}
