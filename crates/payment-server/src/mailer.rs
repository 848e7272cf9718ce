//! Order confirmation mail.
//!
//! Uses SMTP via lettre. Without SMTP configuration the mail is rendered and
//! logged instead, so local checkouts still go through.

use core::fmt::Write as _;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use subasa_core::{OrderConfirmation, Price};

use crate::config::SmtpConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Subject and plain-text body of a confirmation mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMail {
    pub subject: String,
    pub body: String,
}

/// Render the confirmation for an order.
#[must_use]
pub fn render_confirmation(order: &OrderConfirmation) -> RenderedMail {
    let mut body = String::new();
    let _ = writeln!(body, "Xin chao {},", order.customer_name);
    let _ = writeln!(body);
    let _ = writeln!(body, "Cam on ban da mua hang tai Subasa Shop!");
    let _ = writeln!(body, "Ma don hang: {}", order.order_id);
    let _ = writeln!(body);
    let _ = writeln!(body, "Chi tiet don hang:");
    for item in &order.items {
        let mut variant = Vec::new();
        if !item.size.is_empty() {
            variant.push(format!("size {}", item.size));
        }
        if !item.color.is_empty() {
            variant.push(format!("mau {}", item.color));
        }
        let variant = if variant.is_empty() {
            String::new()
        } else {
            format!(" ({})", variant.join(", "))
        };
        let _ = writeln!(
            body,
            "- {}{variant}: {} x {} = {}",
            item.name,
            item.quantity,
            Price::vnd(item.price),
            Price::vnd(item.subtotal()),
        );
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "Tong cong: {}", Price::vnd(order.total));
    let _ = writeln!(body);
    let _ = writeln!(body, "Thong tin giao hang");
    let _ = writeln!(body, "Dia chi: {}", order.address);
    let _ = writeln!(body, "So dien thoai: {}", order.phone);

    RenderedMail {
        subject: format!("Order Confirmation #{}", order.order_id),
        body,
    }
}

/// Sends confirmation mail over SMTP.
#[derive(Clone)]
pub struct Mailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    /// Create a new mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the confirmation for `order` to `order.email`.
    ///
    /// # Errors
    ///
    /// Returns error if an address is invalid or SMTP delivery fails.
    pub async fn send_confirmation(&self, order: &OrderConfirmation) -> Result<(), MailError> {
        let mail = render_confirmation(order);
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(order
                .email
                .parse()
                .map_err(|_| MailError::InvalidAddress(order.email.clone()))?)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)?;

        self.mailer.send(message).await?;

        info!(order_id = %order.order_id, "Confirmation email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use subasa_core::{OrderItem, ProductId};

    #[test]
    fn test_render_lists_items_and_total() {
        let order = OrderConfirmation {
            email: "an@subasa.vn".to_string(),
            customer_name: "An".to_string(),
            order_id: "ORDER1".to_string(),
            items: vec![OrderItem {
                product_id: ProductId::new("p1"),
                name: "Giay chay bo".to_string(),
                owner_email: "s1@x.vn".to_string(),
                price: Decimal::from(625_000),
                quantity: 2,
                size: "42".to_string(),
                color: String::new(),
                image_url: None,
            }],
            total: Decimal::from(1_250_000),
            address: "1 Le Loi, HCM".to_string(),
            phone: "0901234567".to_string(),
        };

        let mail = render_confirmation(&order);
        assert_eq!(mail.subject, "Order Confirmation #ORDER1");
        assert!(mail.body.contains("Xin chao An,"));
        assert!(mail.body.contains("- Giay chay bo (size 42): 2 x 625.000₫ = 1.250.000₫"));
        assert!(mail.body.contains("Tong cong: 1.250.000₫"));
        assert!(mail.body.contains("Dia chi: 1 Le Loi, HCM"));
    }
}
