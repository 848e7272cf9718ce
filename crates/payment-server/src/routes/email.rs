//! Order confirmation mail handler.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use subasa_core::{Email, OrderConfirmation, OrderItem};

use crate::error::{AppError, Result};
use crate::mailer::render_confirmation;
use crate::state::AppState;

/// Loose form of [`OrderConfirmation`] so a missing recipient gets a 400
/// with a useful message instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

impl SendEmailRequest {
    fn into_confirmation(self) -> Result<OrderConfirmation> {
        if self.email.trim().is_empty() {
            return Err(AppError::BadRequest("Missing email".to_string()));
        }
        let email = Email::parse(&self.email)
            .map_err(|e| AppError::BadRequest(format!("Invalid email: {e}")))?;
        if self.order_id.trim().is_empty() {
            return Err(AppError::BadRequest("Missing orderId".to_string()));
        }

        Ok(OrderConfirmation {
            email: email.into_inner(),
            customer_name: self.customer_name,
            order_id: self.order_id,
            items: self.items,
            total: self.total,
            address: self.address,
            phone: self.phone,
        })
    }
}

/// Send the confirmation, or log it when SMTP is not configured.
#[instrument(skip(state, body), fields(order_id = %body.order_id))]
pub async fn send_email(State(state): State<AppState>, Json(body): Json<SendEmailRequest>) -> Result<Json<Value>> {
    let order = body.into_confirmation()?;

    let Some(mailer) = state.mailer() else {
        let mail = render_confirmation(&order);
        info!(to = %order.email, subject = %mail.subject, body = %mail.body, "SMTP not configured, confirmation logged");
        return Ok(Json(json!({ "message": "Email logged" })));
    };

    mailer.send_confirmation(&order).await?;
    Ok(Json(json!({ "message": "Email sent successfully" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{call, post_json, state_with};
    use axum::http::StatusCode;

    fn payload() -> Value {
        json!({
            "email": "an@subasa.vn",
            "customerName": "An",
            "orderId": "ORDER1",
            "items": [{
                "productId": "p1",
                "name": "Giay chay bo",
                "ownerEmail": "s1@x.vn",
                "price": 625000,
                "quantity": 2,
                "size": "42"
            }],
            "total": 1250000,
            "address": "1 Le Loi, HCM",
            "phone": "0901234567"
        })
    }

    #[tokio::test]
    async fn test_without_smtp_mail_is_logged() {
        let (status, body) = call(state_with(&[]), post_json("/api/order/send-email", &payload())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Email logged");
    }

    #[tokio::test]
    async fn test_missing_email_is_rejected() {
        let mut payload = payload();
        payload.as_object_mut().unwrap().remove("email");
        let (status, body) = call(state_with(&[]), post_json("/api/order/send-email", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing email");
    }

    #[tokio::test]
    async fn test_malformed_email_is_rejected() {
        let mut payload = payload();
        payload["email"] = json!("not-an-address");
        let (status, body) = call(state_with(&[]), post_json("/api/order/send-email", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid email"));
    }
}
