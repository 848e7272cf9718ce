//! Reading what the provider appended to the return URL.
//!
//! Stripe comes back with `session_id`. MoMo comes back with `resultCode`
//! and `orderId`; VNPay with `vnp_ResponseCode` and `vnp_TxnRef`. Every
//! provider parameter is stripped from the URL handed back to the caller so
//! a reload cannot replay the return.

use url::Url;

/// Provider parameters found on a return URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnParams {
    /// Stripe checkout session.
    Stripe { session_id: String },
    /// MoMo or VNPay redirect with a result code.
    Callback { result_code: String, order_id: String },
}

impl ReturnParams {
    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Stripe { .. } => None,
            Self::Callback { order_id, .. } => Some(order_id),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Stripe { session_id } => Some(session_id),
            Self::Callback { .. } => None,
        }
    }
}

/// Outcome reported by a callback-style provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
    Paid,
    /// The shopper backed out on the provider page.
    Cancelled,
    /// Any other non-zero code.
    Declined(String),
}

impl PaymentResult {
    /// `0`/`00` is success for both MoMo and VNPay. MoMo `1006` and VNPay
    /// `24` are shopper cancellations.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" | "00" => Self::Paid,
            "1006" | "24" => Self::Cancelled,
            other => Self::Declined(other.to_owned()),
        }
    }
}

const MOMO_PARAMS: &[&str] = &[
    "partnerCode",
    "orderId",
    "requestId",
    "amount",
    "orderInfo",
    "orderType",
    "transId",
    "resultCode",
    "message",
    "payType",
    "responseTime",
    "extraData",
    "signature",
];

fn is_provider_param(key: &str) -> bool {
    key == "session_id" || key.starts_with("vnp_") || MOMO_PARAMS.contains(&key)
}

/// Split `url` into the provider parameters it carries and the URL without
/// them.
///
/// Unrelated query parameters are preserved in order. An empty query is
/// removed entirely.
#[must_use]
pub fn parse_return_url(url: &Url) -> (Option<ReturnParams>, Url) {
    let mut session_id = None;
    let mut result_code = None;
    let mut order_id = None;
    let mut kept: Vec<(String, String)> = Vec::new();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "session_id" => session_id = Some(value.into_owned()),
            "resultCode" | "vnp_ResponseCode" => result_code = Some(value.into_owned()),
            "orderId" | "vnp_TxnRef" => order_id = Some(value.into_owned()),
            k if is_provider_param(k) => {}
            _ => kept.push((key.into_owned(), value.into_owned())),
        }
    }

    let params = match (session_id, result_code, order_id) {
        (Some(session_id), _, _) if !session_id.is_empty() => {
            Some(ReturnParams::Stripe { session_id })
        }
        (_, Some(result_code), Some(order_id)) if !order_id.is_empty() => {
            Some(ReturnParams::Callback {
                result_code,
                order_id,
            })
        }
        _ => None,
    };

    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }

    (params, cleaned)
}
