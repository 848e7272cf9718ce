//! Cart line types.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::Product;

/// Uniqueness key of a cart line: `<productId>-<color>-<size>`.
///
/// Two additions with the same product, color and size merge into one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineKey(String);

impl LineKey {
    #[must_use]
    pub fn derive(product: &ProductId, color: &str, size: &str) -> Self {
        Self(format!("{product}-{color}-{size}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One line of the cart.
///
/// Carries a copy of the product as it was when added; stock checks on the
/// line use that snapshot until it is refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: Product,
    #[serde(default)]
    pub selected_color: String,
    #[serde(default)]
    pub selected_size: String,
    pub quantity: u32,
    #[serde(rename = "uniqueId", alias = "lineKey")]
    pub line_key: LineKey,
}

impl CartLine {
    #[must_use]
    pub fn new(product: Product, color: impl Into<String>, size: impl Into<String>, quantity: u32) -> Self {
        let selected_color = color.into();
        let selected_size = size.into();
        let line_key = LineKey::derive(&product.id, &selected_color, &selected_size);
        Self {
            product,
            selected_color,
            selected_size,
            quantity,
            line_key,
        }
    }

    /// Stock of this line's bucket according to the product snapshot.
    #[must_use]
    pub fn available_stock(&self) -> u32 {
        self.product.available_stock(&self.selected_size)
    }

    /// `sale_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.product.sale_price() * Decimal::from(self.quantity)
    }

    #[must_use]
    pub fn seller(&self) -> &str {
        self.product.seller()
    }
}

/// Derived totals published alongside the line list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub total_items: u64,
    pub total_price: Decimal,
}

impl CartSummary {
    #[must_use]
    pub fn of<'a>(lines: impl IntoIterator<Item = &'a CartLine>) -> Self {
        lines.into_iter().fold(Self::default(), |acc, line| Self {
            total_items: acc.total_items + u64::from(line.quantity),
            total_price: acc.total_price + line.subtotal(),
        })
    }
}
