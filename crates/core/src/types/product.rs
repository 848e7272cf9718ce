//! Catalog product documents (`products/{id}`).
//!
//! Products are owned by the seller/admin workflows; the storefront only reads
//! them and adjusts stock at checkout. Stock lives in exactly one place,
//! selected by `has_size`: the flat `quantity` or the per-size `sizes` list.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::cart::{CartLine, LineKey};
use super::id::ProductId;
use super::order::UNKNOWN_SELLER;
use super::price::Price;
use super::status::ProductStatus;

/// A size label as stored by the seller form: either a number (`42`) or free
/// text (`"XL"`).
///
/// Comparison with a selected size goes through the string form, so `42` and
/// `"42"` select the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeLabel {
    Number(serde_json::Number),
    Text(String),
}

impl SizeLabel {
    /// Whether this label selects `size`.
    #[must_use]
    pub fn matches(&self, size: &str) -> bool {
        match self {
            Self::Number(n) => n.to_string() == size,
            Self::Text(t) => t == size,
        }
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<&str> for SizeLabel {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<u32> for SizeLabel {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

/// Stock held for a single size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub size: SizeLabel,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quantity: u32,
}

/// A color swatch offered for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductColor {
    pub hex_code: String,
    #[serde(default)]
    pub is_selected: bool,
}

/// Returned by [`Product::take_stock`] when the bucket cannot cover a request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("insufficient stock for size {size:?}: requested {requested}, available {available}")]
pub struct InsufficientStock {
    pub size: String,
    pub requested: u32,
    pub available: u32,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Document key. Not part of the stored document body.
    #[serde(default, skip_serializing_if = "is_blank_id")]
    pub id: ProductId,
    pub product_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Discount percent, `0..=100`.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "one_or_many")]
    pub product_image: Vec<String>,
    #[serde(default)]
    pub colors: Vec<ProductColor>,
    #[serde(default)]
    pub has_size: bool,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quantity: u32,
    #[serde(default)]
    pub sizes: Vec<SizeStock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_rating: Option<f64>,
    #[serde(default)]
    pub sold_count: u32,
}

impl Product {
    /// Stock available for `size`.
    ///
    /// Sized products read the matching bucket (0 if the size is unknown);
    /// sizeless products read the flat quantity and ignore `size`.
    #[must_use]
    pub fn available_stock(&self, size: &str) -> u32 {
        if self.has_size {
            self.sizes
                .iter()
                .find(|s| s.size.matches(size))
                .map_or(0, |s| s.quantity)
        } else {
            self.quantity
        }
    }

    /// Sizes that still have stock, in catalog order.
    #[must_use]
    pub fn available_sizes(&self) -> Vec<&SizeStock> {
        if !self.has_size {
            return Vec::new();
        }
        self.sizes.iter().filter(|s| s.quantity > 0).collect()
    }

    /// How many more units of `(color, size)` can go into a cart holding `lines`.
    #[must_use]
    pub fn headroom(&self, color: &str, size: &str, lines: &[CartLine]) -> u32 {
        let key = LineKey::derive(&self.id, color, size);
        let in_cart = lines
            .iter()
            .find(|l| l.line_key == key)
            .map_or(0, |l| l.quantity);
        self.available_stock(size).saturating_sub(in_cart)
    }

    /// Unit price after discount, rounded to whole dong.
    #[must_use]
    pub fn sale_price(&self) -> Decimal {
        Price::vnd(self.price).discounted(self.discount).amount
    }

    /// Seller identity used for order grouping.
    #[must_use]
    pub fn seller(&self) -> &str {
        match self.owner_email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email,
            _ => UNKNOWN_SELLER,
        }
    }

    /// First image, used as the order item thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.product_image.first().map(String::as_str)
    }

    /// Remove `qty` units from the authoritative bucket for `size`.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientStock`] and leaves the product untouched if the
    /// bucket holds fewer than `qty` units or the size does not exist.
    pub fn take_stock(&mut self, size: &str, qty: u32) -> Result<(), InsufficientStock> {
        let insufficient = |available| InsufficientStock {
            size: size.to_owned(),
            requested: qty,
            available,
        };

        let bucket = if self.has_size {
            match self.sizes.iter_mut().find(|s| s.size.matches(size)) {
                Some(entry) => &mut entry.quantity,
                None => return Err(insufficient(0)),
            }
        } else {
            &mut self.quantity
        };

        match bucket.checked_sub(qty) {
            Some(left) => {
                *bucket = left;
                Ok(())
            }
            None => Err(insufficient(*bucket)),
        }
    }

    /// Put `qty` units back into the bucket for `size`.
    ///
    /// Unknown sizes are ignored.
    pub fn restore_stock(&mut self, size: &str, qty: u32) {
        if self.has_size {
            if let Some(entry) = self.sizes.iter_mut().find(|s| s.size.matches(size)) {
                entry.quantity = entry.quantity.saturating_add(qty);
            }
        } else {
            self.quantity = self.quantity.saturating_add(qty);
        }
    }
}

fn is_blank_id(id: &ProductId) -> bool {
    id.as_str().is_empty()
}

/// Accept a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Missing(()) => Vec::new(),
    })
}

/// Stock counts written by hand can be negative, fractional or null; treat
/// anything that is not a positive number as the floor of its value, min 0.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if !value.is_finite() || value <= 0.0 {
        return Ok(0);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value.min(f64::from(u32::MAX)).floor() as u32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sized() -> Product {
        serde_json::from_value(json!({
            "id": "p1",
            "productName": "Giày Đá Bóng Mizuno",
            "price": 1_000_000,
            "discount": 15,
            "productImage": ["a.png", "b.png"],
            "colors": [{ "hexCode": "#000", "isSelected": true }],
            "hasSize": true,
            "sizes": [{ "size": 40, "quantity": 3 }, { "size": "41", "quantity": 0 }],
            "ownerEmail": "s1@shop.vn",
            "status": "approved"
        }))
        .unwrap()
    }

    fn flat() -> Product {
        serde_json::from_value(json!({
            "id": "p2",
            "productName": "Bình nước",
            "price": 99_999,
            "productImage": "bottle.png",
            "quantity": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_available_stock_reads_authoritative_bucket() {
        let p = sized();
        assert_eq!(p.available_stock("40"), 3);
        assert_eq!(p.available_stock("41"), 0);
        assert_eq!(p.available_stock("99"), 0);

        let f = flat();
        assert_eq!(f.available_stock(""), 2);
        assert_eq!(f.available_stock("40"), 2);
    }

    #[test]
    fn test_available_sizes_skips_sold_out() {
        let p = sized();
        let sizes: Vec<String> = p.available_sizes().iter().map(|s| s.size.to_string()).collect();
        assert_eq!(sizes, vec!["40"]);
        assert!(flat().available_sizes().is_empty());
    }

    #[test]
    fn test_sale_price() {
        assert_eq!(sized().sale_price(), Decimal::from(850_000));
        assert_eq!(flat().sale_price(), Decimal::from(99_999));
    }

    #[test]
    fn test_image_accepts_string_or_list() {
        assert_eq!(sized().primary_image(), Some("a.png"));
        assert_eq!(flat().product_image, vec!["bottle.png".to_string()]);
    }

    #[test]
    fn test_seller_defaults_to_unknown() {
        assert_eq!(sized().seller(), "s1@shop.vn");
        assert_eq!(flat().seller(), UNKNOWN_SELLER);
    }

    #[test]
    fn test_take_stock_never_goes_negative() {
        let mut p = sized();
        p.take_stock("40", 2).unwrap();
        assert_eq!(p.available_stock("40"), 1);

        let err = p.take_stock("40", 2).unwrap_err();
        assert_eq!(err.available, 1);
        assert_eq!(p.available_stock("40"), 1);

        assert!(p.take_stock("39", 1).is_err());
    }

    #[test]
    fn test_take_stock_sizeless_touches_flat_quantity_only() {
        let mut p = flat();
        p.take_stock("", 2).unwrap();
        assert_eq!(p.quantity, 0);
        p.restore_stock("", 1);
        assert_eq!(p.quantity, 1);
    }

    #[test]
    fn test_lenient_counts() {
        let p: Product = serde_json::from_value(json!({
            "productName": "x",
            "price": 1,
            "quantity": -4,
            "sizes": [{ "size": "M", "quantity": 2.7 }]
        }))
        .unwrap();
        assert_eq!(p.quantity, 0);
        assert_eq!(p.sizes[0].quantity, 2);
    }
}
