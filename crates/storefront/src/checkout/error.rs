//! Checkout failures.
//!
//! Every variant names the step that failed. A failed checkout never touches
//! the cart or the selection; what it may leave behind remotely is stated on
//! each variant.

use thiserror::Error;

use subasa_core::{PaymentMethod, ProductId};

use crate::cart::CartError;
use crate::db::{RepositoryError, StockError};
use crate::gateway::GatewayError;
use crate::storage::StorageError;

use super::phase::CheckoutPhase;

/// Input rejected before anything was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no items selected for checkout")]
    NothingSelected,

    #[error("missing customer details: {}", .0.join(", "))]
    MissingCustomerFields(Vec<&'static str>),
}

/// The payment provider could not be used.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The server answered without a payment page.
    #[error("{0} did not return a payment URL")]
    NoRedirectUrl(PaymentMethod),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The return URL belongs to a different checkout.
    #[error("return URL is for order {got}, expected {expected}")]
    OrderMismatch { expected: String, got: String },
}

/// Errors from [`super::CheckoutReconciler`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Bad input; nothing was written.
    #[error("invalid checkout: {0}")]
    Validation(#[from] ValidationError),

    /// An order or stock write failed. Writes that already succeeded are
    /// not rolled back; no redirect happened.
    #[error("could not save the order: {0}")]
    Persistence(#[source] RepositoryError),

    /// The provider could not start or confirm the payment. Orders and
    /// stock written before the call stay as they are.
    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Stock ran out between cart and checkout. Stock taken by this attempt
    /// was put back and its orders were cancelled; safe to retry after
    /// refreshing the cart.
    #[error("stock changed for product {product}: {source}")]
    StockConflict {
        product: ProductId,
        #[source]
        source: StockError,
    },

    /// Local resume state could not be read or written.
    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Cart(#[from] CartError),

    /// A step was attempted out of order.
    #[error("checkout cannot move from {from} to {to}")]
    InvalidTransition {
        from: CheckoutPhase,
        to: CheckoutPhase,
    },
}

impl CheckoutError {
    /// Whether retrying the same checkout can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StockConflict { .. })
    }

    /// Message shown to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::NothingSelected) => {
                "Please select at least one item to check out.".to_string()
            }
            Self::Validation(ValidationError::MissingCustomerFields(fields)) => {
                format!("Please fill in your {}.", fields.join(", "))
            }
            Self::Persistence(_) => {
                "We could not save your order. Please try again.".to_string()
            }
            Self::Provider(ProviderError::NoRedirectUrl(method)) => {
                format!("Could not open the {method} payment page. Please try another method.")
            }
            Self::Provider(_) => {
                "The payment provider is not responding. Please try again later.".to_string()
            }
            Self::StockConflict { .. } => {
                "Some items just sold out. Your cart was updated, please review and try again."
                    .to_string()
            }
            Self::Storage(_) | Self::Cart(_) => {
                "Your device storage is unavailable. Please try again.".to_string()
            }
            Self::InvalidTransition { .. } => {
                "A checkout is already in progress.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stock_conflict_is_retryable() {
        let conflict = CheckoutError::StockConflict {
            product: ProductId::new("p1"),
            source: StockError::Missing(ProductId::new("p1")),
        };
        assert!(conflict.is_retryable());
        assert!(!CheckoutError::Validation(ValidationError::NothingSelected).is_retryable());
    }

    #[test]
    fn test_user_message_names_missing_fields() {
        let err = CheckoutError::Validation(ValidationError::MissingCustomerFields(vec![
            "phone", "address",
        ]));
        assert_eq!(err.user_message(), "Please fill in your phone, address.");
    }

    #[test]
    fn test_user_message_names_provider() {
        let err = CheckoutError::Provider(ProviderError::NoRedirectUrl(PaymentMethod::Vnpay));
        assert!(err.user_message().contains("vnpay"));
    }
}
