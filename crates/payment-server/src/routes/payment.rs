//! Payment creation and provider notification handlers.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use crate::error::{AppError, Result};
use crate::providers::momo::{CreateResponse, IpnPayload};
use crate::providers::stripe::SESSION_ID_TEMPLATE;
use crate::state::AppState;

/// Used when the request carries no forwarding header.
const FALLBACK_IP: &str = "127.0.0.1";

// =============================================================================
// Request / response bodies
// =============================================================================

/// `{orderId, amount}` as sent by the storefront. Amount is whole dong.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub amount: i64,
}

impl PaymentRequest {
    fn validate(&self) -> Result<(&str, i64)> {
        let order_id = self.order_id.trim();
        if order_id.is_empty() {
            return Err(AppError::BadRequest("Missing orderId".to_string()));
        }
        if self.amount <= 0 {
            return Err(AppError::BadRequest("Amount must be positive".to_string()));
        }
        Ok((order_id, self.amount))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayUrlResponse {
    pub pay_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSessionResponse {
    pub checkout_url: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeStatusQuery {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StripeStatusResponse {
    pub paid: bool,
}

/// VNPay's expected IPN acknowledgement.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct VnpayAck {
    pub rsp_code: String,
    pub message: String,
}

impl VnpayAck {
    fn new(code: &str, message: &str) -> Self {
        Self {
            rsp_code: code.to_owned(),
            message: message.to_owned(),
        }
    }
}

// =============================================================================
// MoMo
// =============================================================================

/// Create a MoMo payment and pass MoMo's answer through.
#[instrument(skip(state, body), fields(order_id = %body.order_id))]
pub async fn momo_create(
    State(state): State<AppState>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<CreateResponse>> {
    let momo = state.momo().ok_or(AppError::NotConfigured("MoMo"))?;
    let (order_id, amount) = body.validate()?;

    let response = momo.create_payment(order_id, amount).await?;
    if response.pay_url.is_none() {
        warn!(result_code = response.result_code, message = %response.message, "MoMo returned no payUrl");
    }
    Ok(Json(response))
}

/// Receive a MoMo IPN. Only signed notifications are accepted.
#[instrument(skip(state, ipn), fields(order_id = %ipn.order_id, result_code = ipn.result_code))]
pub async fn momo_ipn(State(state): State<AppState>, Json(ipn): Json<IpnPayload>) -> Result<StatusCode> {
    let momo = state.momo().ok_or(AppError::NotConfigured("MoMo"))?;
    if !momo.verify_ipn(&ipn) {
        warn!("MoMo IPN signature mismatch");
        return Err(AppError::InvalidSignature);
    }

    if ipn.result_code == 0 {
        info!(trans_id = ipn.trans_id, amount = ipn.amount, "MoMo payment succeeded");
    } else {
        info!(message = %ipn.message, "MoMo payment not completed");
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// VNPay
// =============================================================================

/// Client address for VNPay: first `x-forwarded-for` hop, else loopback.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(FALLBACK_IP)
        .to_owned()
}

/// Build a signed VNPay payment URL.
#[instrument(skip(state, headers, query), fields(order_id = %query.order_id))]
pub async fn vnpay_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PaymentRequest>,
) -> Result<Json<PayUrlResponse>> {
    let vnpay = state.vnpay().ok_or(AppError::NotConfigured("VNPay"))?;
    let (order_id, amount) = query.validate()?;

    let url = vnpay.payment_url(order_id, amount, &client_ip(&headers), Utc::now())?;
    Ok(Json(PayUrlResponse {
        pay_url: url.to_string(),
    }))
}

/// Receive a VNPay IPN. VNPay reads the body, so failures are answered 200
/// with a non-`00` code.
#[instrument(skip_all)]
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<VnpayAck>> {
    let vnpay = state.vnpay().ok_or(AppError::NotConfigured("VNPay"))?;

    let Some(txn_ref) = params.get("vnp_TxnRef").filter(|v| !v.is_empty()) else {
        return Ok(Json(VnpayAck::new("99", "Input data required")));
    };
    if !vnpay.verify(&params) {
        warn!(order_id = %txn_ref, "VNPay IPN signature mismatch");
        return Ok(Json(VnpayAck::new("97", "Invalid signature")));
    }

    let code = params.get("vnp_ResponseCode").map_or("", String::as_str);
    info!(order_id = %txn_ref, response_code = %code, "VNPay IPN received");
    Ok(Json(VnpayAck::new("00", "Confirm Success")))
}

// =============================================================================
// Stripe
// =============================================================================

/// Success URL with Stripe's session id placeholder. Built by hand since
/// `Url` would percent-encode the braces.
fn stripe_success_url(return_url: &Url) -> String {
    let mut base = return_url.clone();
    base.set_fragment(None);
    let sep = if base.query().is_some_and(|q| !q.is_empty()) {
        '&'
    } else {
        base.set_query(None);
        '?'
    };
    format!("{base}{sep}session_id={SESSION_ID_TEMPLATE}")
}

/// Create a Stripe Checkout Session.
#[instrument(skip(state, body), fields(order_id = %body.order_id))]
pub async fn stripe_create(
    State(state): State<AppState>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<StripeSessionResponse>> {
    let stripe = state.stripe().ok_or(AppError::NotConfigured("Stripe"))?;
    let (order_id, amount) = body.validate()?;

    let return_url = state.client_return_url();
    let session = stripe
        .create_session(order_id, amount, &stripe_success_url(return_url), return_url.as_str())
        .await?;
    Ok(Json(StripeSessionResponse {
        checkout_url: session.url,
        session_id: session.id,
    }))
}

/// Report whether a Checkout Session has been paid.
#[instrument(skip(state))]
pub async fn stripe_status(
    State(state): State<AppState>,
    Query(query): Query<StripeStatusQuery>,
) -> Result<Json<StripeStatusResponse>> {
    let stripe = state.stripe().ok_or(AppError::NotConfigured("Stripe"))?;
    let session_id = query.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest("Missing sessionId".to_string()));
    }

    let session = stripe.get_session(session_id).await?;
    Ok(Json(StripeStatusResponse {
        paid: session.is_paid(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::providers::momo::tests::signed_ipn;
    use crate::providers::vnpay;
    use crate::test_support::{call, get, post_json, serve, state_with};
    use axum::{Form, Router, extract::Path, routing};
    use serde_json::{Value, json};

    // =========================================================================
    // Helpers
    // =========================================================================

    const MOMO_SECRET: &str = "K951B6PE1waDMi640xX08PD3vg6EkVlz";

    fn momo_vars(endpoint: &str) -> Vec<(&'static str, String)> {
        vec![
            ("MOMO_SECRET_KEY", MOMO_SECRET.to_string()),
            ("MOMO_ACCESS_KEY", "F8BBA842ECF85".to_string()),
            ("MOMO_ENDPOINT", endpoint.to_string()),
        ]
    }

    fn vnpay_vars() -> Vec<(&'static str, String)> {
        vec![
            ("VNPAY_HASH_SECRET", "SECRETKEY123".to_string()),
            ("VNPAY_TMN_CODE", "2QXUI4J4".to_string()),
        ]
    }

    async fn momo_stub() -> String {
        let router = Router::new().route(
            "/v2/gateway/api/create",
            routing::post(|Json(body): Json<Value>| async move {
                assert_eq!(body["requestType"], "captureWallet");
                assert!(!body["signature"].as_str().unwrap().is_empty());
                Json(json!({
                    "payUrl": format!("https://momo.test/pay/{}", body["orderId"].as_str().unwrap()),
                    "resultCode": 0,
                    "message": "Thành công."
                }))
            }),
        );
        format!("{}v2/gateway/api/create", serve(router).await)
    }

    async fn stripe_stub() -> String {
        let router = Router::new()
            .route(
                "/v1/checkout/sessions",
                routing::post(|Form(form): Form<BTreeMap<String, String>>| async move {
                    assert_eq!(form["mode"], "payment");
                    assert_eq!(form["line_items[0][price_data][unit_amount]"], "600");
                    assert!(form["success_url"].ends_with("?session_id={CHECKOUT_SESSION_ID}"));
                    Json(json!({ "id": "cs_test_1", "url": "https://checkout.stripe.test/cs_test_1" }))
                }),
            )
            .route(
                "/v1/checkout/sessions/{id}",
                routing::get(|Path(id): Path<String>| async move {
                    let status = if id == "cs_paid" { "paid" } else { "unpaid" };
                    Json(json!({ "id": id, "payment_status": status }))
                }),
            );
        serve(router).await
    }

    // =========================================================================
    // MoMo
    // =========================================================================

    #[tokio::test]
    async fn test_momo_create_returns_pay_url() {
        let state = state_with(&momo_vars(&momo_stub().await));
        let (status, body) = call(state, post_json("/api/payment/momo", &json!({ "orderId": "ORDER1", "amount": 150_000 }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payUrl"], "https://momo.test/pay/ORDER1");
    }

    #[tokio::test]
    async fn test_momo_create_validates_body() {
        let state = state_with(&momo_vars("http://127.0.0.1:9/unused"));
        let (status, body) = call(state.clone(), post_json("/api/payment/momo", &json!({ "orderId": "", "amount": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing orderId");

        let (status, _) = call(state, post_json("/api/payment/momo", &json!({ "orderId": "ORDER1", "amount": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_unavailable() {
        let state = state_with(&[]);
        let (status, body) = call(state.clone(), post_json("/api/payment/momo", &json!({ "orderId": "ORDER1", "amount": 1 }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "MoMo is not configured");

        let (status, _) = call(state, get("/api/payment/stripe/status?sessionId=cs_1")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_momo_ipn_checks_signature() {
        let state = state_with(&momo_vars("http://127.0.0.1:9/unused"));
        let momo = state.momo().unwrap().clone();
        let mut ipn = signed_ipn(&momo, 0);

        let (status, _) = call(state.clone(), post_json("/api/payment/momo/ipn", &ipn)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        ipn.amount += 1;
        let (status, body) = call(state, post_json("/api/payment/momo/ipn", &ipn)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid signature");
    }

    // =========================================================================
    // VNPay
    // =========================================================================

    #[tokio::test]
    async fn test_vnpay_create_signs_url() {
        let state = state_with(&vnpay_vars());
        let (status, body) = call(state, get("/api/payment/vnpay?orderId=ORDER1&amount=150000")).await;
        assert_eq!(status, StatusCode::OK);

        let url = Url::parse(body["payUrl"].as_str().unwrap()).unwrap();
        let params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["vnp_Amount"], "15000000");
        assert_eq!(params["vnp_IpAddr"], "127.0.0.1");
        assert!(vnpay::tests::client().verify(&params));
    }

    #[tokio::test]
    async fn test_vnpay_ipn_codes() {
        let state = state_with(&vnpay_vars());
        let url = vnpay::tests::client()
            .payment_url("ORDER1", 150_000, "127.0.0.1", Utc::now())
            .unwrap();

        let (_, body) = call(state.clone(), get(&format!("/api/payment/vnpay/ipn?{}", url.query().unwrap()))).await;
        assert_eq!(body, json!({ "RspCode": "00", "Message": "Confirm Success" }));

        let tampered = url.query().unwrap().replace("vnp_Amount=15000000", "vnp_Amount=100");
        let (_, body) = call(state.clone(), get(&format!("/api/payment/vnpay/ipn?{tampered}"))).await;
        assert_eq!(body["RspCode"], "97");

        let (_, body) = call(state, get("/api/payment/vnpay/ipn")).await;
        assert_eq!(body["RspCode"], "99");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "127.0.0.1");
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    // =========================================================================
    // Stripe
    // =========================================================================

    #[test]
    fn test_stripe_success_url_keeps_placeholder() {
        let url = Url::parse("http://localhost:5173/checkout").unwrap();
        assert_eq!(
            stripe_success_url(&url),
            "http://localhost:5173/checkout?session_id={CHECKOUT_SESSION_ID}"
        );
        let url = Url::parse("http://localhost:5173/checkout?step=pay#top").unwrap();
        assert_eq!(
            stripe_success_url(&url),
            "http://localhost:5173/checkout?step=pay&session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[tokio::test]
    async fn test_stripe_create_and_status() {
        let api_base = stripe_stub().await;
        let state = state_with(&[
            ("STRIPE_SECRET_KEY", "sk_test_123".to_string()),
            ("STRIPE_API_BASE", api_base),
        ]);

        let (status, body) = call(state.clone(), post_json("/api/payment/stripe", &json!({ "orderId": "ORDER1", "amount": 150_000 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionId"], "cs_test_1");
        assert_eq!(body["checkoutUrl"], "https://checkout.stripe.test/cs_test_1");

        let (_, body) = call(state.clone(), get("/api/payment/stripe/status?sessionId=cs_paid")).await;
        assert_eq!(body["paid"], true);
        let (_, body) = call(state.clone(), get("/api/payment/stripe/status?sessionId=cs_open")).await;
        assert_eq!(body["paid"], false);

        let (status, _) = call(state, get("/api/payment/stripe/status")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
