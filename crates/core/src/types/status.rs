//! Status enums for orders, payments and catalog entries.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// Wire values match the stored order documents (`pending`, `shipping`,
/// `delivered`, `cancel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipping,
    Delivered,
    Cancel,
}

impl OrderStatus {
    /// Whether the order may move to `next`.
    ///
    /// `pending → shipping → delivered`; `cancel` only from `pending` or
    /// `shipping`. Delivered and cancelled orders are terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Shipping | Self::Cancel)
                | (Self::Shipping, Self::Delivered | Self::Cancel)
        )
    }

    /// Whether the order can still be cancelled.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        self.can_transition_to(Self::Cancel)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shipping => "shipping",
            Self::Delivered => "delivered",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the shopper pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery. Completes without leaving the storefront.
    #[default]
    Cod,
    Momo,
    Vnpay,
    Stripe,
}

impl PaymentMethod {
    /// All methods, in the order they are offered at checkout.
    pub const ALL: [Self; 4] = [Self::Cod, Self::Momo, Self::Vnpay, Self::Stripe];

    /// Online methods redirect to a third-party payment page.
    #[must_use]
    pub const fn is_online(self) -> bool {
        !matches!(self, Self::Cod)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Momo => "momo",
            Self::Vnpay => "vnpay",
            Self::Stripe => "stripe",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a payment method name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| UnknownPaymentMethod(s.to_owned()))
    }
}

/// Catalog approval status set by the admin workflow.
///
/// Unknown values deserialize as [`ProductStatus::Other`] so a new admin
/// state never breaks catalog reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Other,
}

impl ProductStatus {
    /// Only approved products are listed to shoppers.
    #[must_use]
    pub const fn is_listed(self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_transitions() {
        use OrderStatus::{Cancel, Delivered, Pending, Shipping};

        assert!(Pending.can_transition_to(Shipping));
        assert!(Shipping.can_transition_to(Delivered));
        assert!(Pending.can_cancel());
        assert!(Shipping.can_cancel());

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Delivered.can_cancel());
        assert!(!Cancel.can_transition_to(Pending));
        assert!(!Shipping.can_transition_to(Pending));
    }

    #[test]
    fn test_order_status_wire_names() {
        assert_eq!(serde_json::to_string(&OrderStatus::Cancel).unwrap(), "\"cancel\"");
        let status: OrderStatus = serde_json::from_str("\"shipping\"").unwrap();
        assert_eq!(status, OrderStatus::Shipping);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("MoMo".parse::<PaymentMethod>().unwrap(), PaymentMethod::Momo);
        assert_eq!(" cod ".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_is_online() {
        assert!(!PaymentMethod::Cod.is_online());
        assert!(PaymentMethod::Momo.is_online());
        assert!(PaymentMethod::Vnpay.is_online());
        assert!(PaymentMethod::Stripe.is_online());
    }

    #[test]
    fn test_product_status_tolerates_unknown_values() {
        let status: ProductStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, ProductStatus::Other);
        assert!(!status.is_listed());
    }
}
