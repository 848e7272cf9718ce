//! Order documents (`orders` collection).
//!
//! One order is written per distinct seller in a checkout. Orders are owned by
//! the remote store after creation; the storefront only creates, reads and (on
//! a failed stock reservation) cancels them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartLine;
use super::id::{OrderId, ProductId, UserId};
use super::status::{OrderStatus, PaymentMethod};

/// Seller bucket for products without an `ownerEmail`.
pub const UNKNOWN_SELLER: &str = "unknown";

/// Delivery details entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(rename = "customerName")]
    pub name: String,
    #[serde(rename = "customerPhone")]
    pub phone: String,
    #[serde(rename = "customerAddress")]
    pub address: String,
}

impl CustomerInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            address: address.into(),
        }
    }

    /// Names of the fields that are blank after trimming.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// A purchased line inside an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub owner_email: String,
    /// Unit sale price at the time of purchase.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn from_line(line: &CartLine) -> Self {
        Self {
            product_id: line.product.id.clone(),
            name: line.product.product_name.clone(),
            owner_email: line.seller().to_owned(),
            price: line.product.sale_price(),
            quantity: line.quantity,
            size: line.selected_size.clone(),
            color: line.selected_color.clone(),
            image_url: line.product.primary_image().map(str::to_owned),
        }
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// An order for a single seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// `<baseOrderId>-<sellerEmail>`.
    pub order_id: OrderId,
    pub seller_email: String,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub payment_method: PaymentMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build the `pending` order for one seller's lines.
    #[must_use]
    pub fn for_seller<'a>(
        base_order_id: &str,
        seller_email: &str,
        lines: impl IntoIterator<Item = &'a CartLine>,
        customer: &CustomerInfo,
        user_id: Option<&UserId>,
        payment_method: PaymentMethod,
        created_at: DateTime<Utc>,
    ) -> Self {
        let items: Vec<OrderItem> = lines.into_iter().map(OrderItem::from_line).collect();
        let total_price = items.iter().map(OrderItem::subtotal).sum();
        Self {
            order_id: seller_order_id(base_order_id, seller_email),
            seller_email: seller_email.to_owned(),
            customer: customer.clone(),
            user_id: user_id.cloned(),
            payment_method,
            total_price,
            status: OrderStatus::Pending,
            items,
            created_at,
        }
    }
}

/// Body of the order confirmation mail request sent to the payment server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    /// Recipient, taken from the shopper's profile.
    pub email: String,
    pub customer_name: String,
    /// Base order id shared by all seller orders of the checkout.
    pub order_id: String,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub address: String,
    pub phone: String,
}

/// Per-seller order number derived from the checkout's base id.
#[must_use]
pub fn seller_order_id(base_order_id: &str, seller_email: &str) -> OrderId {
    OrderId::new(format!("{base_order_id}-{seller_email}"))
}
