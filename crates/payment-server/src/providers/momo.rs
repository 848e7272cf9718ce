//! MoMo e-wallet (`captureWallet`) client.
//!
//! The create call returns a `payUrl` the shopper is redirected to. When the
//! shopper is done MoMo redirects them to `redirectUrl` with `resultCode`
//! and `orderId` appended, and separately posts the result to `ipnUrl`.

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::config::MomoConfig;

use super::{ProviderError, read_json, sign_sha256, verify_sha256};

const REQUEST_TYPE: &str = "captureWallet";

/// Body of the MoMo create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub partner_code: String,
    pub access_key: String,
    pub request_id: String,
    pub amount: i64,
    pub order_id: String,
    pub order_info: String,
    pub redirect_url: String,
    pub ipn_url: String,
    pub request_type: String,
    pub extra_data: String,
    pub lang: String,
    pub signature: String,
}

/// MoMo's answer to a create request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    #[serde(default)]
    pub pay_url: Option<String>,
    #[serde(default)]
    pub result_code: i64,
    #[serde(default)]
    pub message: String,
}

/// Instant payment notification posted by MoMo.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpnPayload {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    #[serde(default)]
    pub order_info: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub trans_id: i64,
    pub result_code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pay_type: String,
    #[serde(default)]
    pub response_time: i64,
    #[serde(default)]
    pub extra_data: String,
    pub signature: String,
}

/// MoMo API client.
#[derive(Clone)]
pub struct MomoClient {
    client: reqwest::Client,
    config: MomoConfig,
    redirect_url: Url,
    ipn_url: Url,
}

impl MomoClient {
    #[must_use]
    pub const fn new(client: reqwest::Client, config: MomoConfig, redirect_url: Url, ipn_url: Url) -> Self {
        Self {
            client,
            config,
            redirect_url,
            ipn_url,
        }
    }

    /// Build and sign the create request for an order.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::InvalidKey` if the secret key is rejected.
    pub fn create_request(&self, order_id: &str, amount: i64) -> Result<CreateRequest, ProviderError> {
        let request_id = format!("{order_id}_{}", Utc::now().timestamp_millis());
        let order_info = format!("Thanh toan don hang {order_id}");
        let extra_data = String::new();

        let raw = format!(
            "accessKey={}&amount={amount}&extraData={extra_data}&ipnUrl={}&orderId={order_id}&orderInfo={order_info}&partnerCode={}&redirectUrl={}&requestId={request_id}&requestType={REQUEST_TYPE}",
            self.config.access_key,
            self.ipn_url,
            self.config.partner_code,
            self.redirect_url,
        );
        let signature = sign_sha256(self.config.secret_key.expose_secret().as_bytes(), &raw)?;

        Ok(CreateRequest {
            partner_code: self.config.partner_code.clone(),
            access_key: self.config.access_key.clone(),
            request_id,
            amount,
            order_id: order_id.to_owned(),
            order_info,
            redirect_url: self.redirect_url.to_string(),
            ipn_url: self.ipn_url.to_string(),
            request_type: REQUEST_TYPE.to_owned(),
            extra_data,
            lang: "vi".to_owned(),
            signature,
        })
    }

    /// Open a MoMo payment for `amount` dong.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or MoMo answers with a non-2xx
    /// status.
    #[instrument(skip(self))]
    pub async fn create_payment(&self, order_id: &str, amount: i64) -> Result<CreateResponse, ProviderError> {
        let request = self.create_request(order_id, amount)?;
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let data: CreateResponse = read_json(response).await?;
        debug!(result_code = data.result_code, has_url = data.pay_url.is_some(), "MoMo payment created");
        Ok(data)
    }

    /// The canonical string MoMo signs an IPN with.
    #[must_use]
    pub fn ipn_raw_signature(&self, ipn: &IpnPayload) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            self.config.access_key,
            ipn.amount,
            ipn.extra_data,
            ipn.message,
            ipn.order_id,
            ipn.order_info,
            ipn.order_type,
            ipn.partner_code,
            ipn.pay_type,
            ipn.request_id,
            ipn.response_time,
            ipn.result_code,
            ipn.trans_id,
        )
    }

    /// Whether an IPN carries a valid signature.
    #[must_use]
    pub fn verify_ipn(&self, ipn: &IpnPayload) -> bool {
        verify_sha256(
            self.config.secret_key.expose_secret().as_bytes(),
            &self.ipn_raw_signature(ipn),
            &ipn.signature,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use secrecy::SecretString;

    pub(crate) fn client(endpoint: &str) -> MomoClient {
        MomoClient::new(
            reqwest::Client::new(),
            MomoConfig {
                partner_code: "MOMO".to_string(),
                access_key: "F8BBA842ECF85".to_string(),
                secret_key: SecretString::from("K951B6PE1waDMi640xX08PD3vg6EkVlz"),
                endpoint: Url::parse(endpoint).unwrap(),
            },
            Url::parse("http://localhost:5173/checkout").unwrap(),
            Url::parse("http://localhost:3001/api/payment/momo/ipn").unwrap(),
        )
    }

    pub(crate) fn signed_ipn(client: &MomoClient, result_code: i64) -> IpnPayload {
        let mut ipn = IpnPayload {
            partner_code: "MOMO".to_string(),
            order_id: "ORDER1".to_string(),
            request_id: "ORDER1_1".to_string(),
            amount: 150_000,
            order_info: "Thanh toan don hang ORDER1".to_string(),
            order_type: "momo_wallet".to_string(),
            trans_id: 4_088_878_653,
            result_code,
            message: "Successful.".to_string(),
            pay_type: "qr".to_string(),
            response_time: 1_700_000_000_000,
            extra_data: String::new(),
            signature: String::new(),
        };
        ipn.signature = sign_sha256(b"K951B6PE1waDMi640xX08PD3vg6EkVlz", &client.ipn_raw_signature(&ipn)).unwrap();
        ipn
    }

    #[test]
    fn test_create_request_signature() {
        let client = client("https://test-payment.momo.vn/v2/gateway/api/create");
        let request = client.create_request("ORDER1", 150_000).unwrap();

        assert!(request.request_id.starts_with("ORDER1_"));
        assert_eq!(request.request_type, "captureWallet");
        let raw = format!(
            "accessKey=F8BBA842ECF85&amount=150000&extraData=&ipnUrl=http://localhost:3001/api/payment/momo/ipn&orderId=ORDER1&orderInfo=Thanh toan don hang ORDER1&partnerCode=MOMO&redirectUrl=http://localhost:5173/checkout&requestId={}&requestType=captureWallet",
            request.request_id
        );
        assert!(verify_sha256(
            b"K951B6PE1waDMi640xX08PD3vg6EkVlz",
            &raw,
            &request.signature
        ));
    }

    #[test]
    fn test_ipn_verification() {
        let client = client("https://test-payment.momo.vn/v2/gateway/api/create");
        let mut ipn = signed_ipn(&client, 0);
        assert!(client.verify_ipn(&ipn));

        ipn.amount = 1;
        assert!(!client.verify_ipn(&ipn));
    }
}
