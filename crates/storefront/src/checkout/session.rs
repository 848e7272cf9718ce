//! Checkout state that has to survive the provider redirect.
//!
//! The shopper leaves for the provider page and comes back through a return
//! URL, possibly in a new process. Everything needed to finish the checkout
//! is written under four resume keys before the redirect. A fifth key marks
//! the last finalized checkout so a replayed return URL is recognised.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use subasa_core::{CartLine, CustomerInfo, DocumentId, PaymentMethod, UserId};

use crate::storage::{LocalStorage, StorageError};

/// `"true"` while a redirect is outstanding.
pub const PAYMENT_IN_PROGRESS_KEY: &str = "payment_in_progress";
/// Method of the outstanding payment.
pub const PAYMENT_METHOD_KEY: &str = "payment_method";
/// Provider reference: the Stripe session id, or the base order id.
pub const PAYMENT_REF_KEY: &str = "payment_ref";
/// The serialized [`PaymentSession`].
pub const CHECKOUT_SESSION_KEY: &str = "checkout_session";
/// The last checkout consumed by a return URL.
pub const LAST_FINALIZED_KEY: &str = "last_finalized_payment";

/// A checkout waiting for the shopper to come back from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub method: PaymentMethod,
    pub base_order_id: String,
    /// Stripe checkout session id. `None` for callback-style providers.
    #[serde(default)]
    pub provider_ref: Option<String>,
    /// The selected lines at submit time.
    pub cart_snapshot: Vec<CartLine>,
    /// Cart namespace the lines were taken from.
    pub cart_namespace: String,
    pub customer: CustomerInfo,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub order_doc_ids: Vec<DocumentId>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PaymentSession {
    /// The value stored under [`PAYMENT_REF_KEY`].
    #[must_use]
    pub fn reference(&self) -> &str {
        self.provider_ref.as_deref().unwrap_or(&self.base_order_id)
    }
}

/// Marker left behind once a return URL has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedMarker {
    pub base_order_id: String,
    #[serde(default)]
    pub provider_ref: Option<String>,
}

impl FinalizedMarker {
    /// Whether a return URL carrying `order_id` or `session_id` refers to
    /// this checkout.
    #[must_use]
    pub fn matches(&self, order_id: Option<&str>, session_id: Option<&str>) -> bool {
        order_id.is_some_and(|id| id == self.base_order_id)
            || session_id.is_some_and(|id| self.provider_ref.as_deref() == Some(id))
    }
}

/// Typed access to the resume keys.
pub struct SessionStore<'a, S> {
    storage: &'a S,
}

impl<'a, S: LocalStorage> SessionStore<'a, S> {
    #[must_use]
    pub const fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Persist `session` and raise the in-progress flag.
    ///
    /// The flag is written last; a partially written session is never
    /// picked up.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn save(&self, session: &PaymentSession) -> Result<(), StorageError> {
        self.storage.set_json(CHECKOUT_SESSION_KEY, session)?;
        self.storage
            .set_item(PAYMENT_METHOD_KEY, session.method.as_str())?;
        self.storage.set_item(PAYMENT_REF_KEY, session.reference())?;
        self.storage.set_item(PAYMENT_IN_PROGRESS_KEY, "true")?;
        debug!(base_order_id = %session.base_order_id, "Payment session saved");
        Ok(())
    }

    /// Whether a redirect is outstanding.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn in_progress(&self) -> Result<bool, StorageError> {
        Ok(self.storage.get_item(PAYMENT_IN_PROGRESS_KEY)?.as_deref() == Some("true"))
    }

    /// The outstanding session, if the in-progress flag is set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupt` if the session does not decode.
    pub fn load(&self) -> Result<Option<PaymentSession>, StorageError> {
        if !self.in_progress()? {
            return Ok(None);
        }
        self.storage.get_json(CHECKOUT_SESSION_KEY)
    }

    /// Drop every resume key.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(PAYMENT_IN_PROGRESS_KEY)?;
        self.storage.remove_item(PAYMENT_METHOD_KEY)?;
        self.storage.remove_item(PAYMENT_REF_KEY)?;
        self.storage.remove_item(CHECKOUT_SESSION_KEY)
    }

    /// Clear the resume keys and remember `session` as finalized.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn consume(&self, session: &PaymentSession) -> Result<(), StorageError> {
        self.clear()?;
        self.storage.set_json(
            LAST_FINALIZED_KEY,
            &FinalizedMarker {
                base_order_id: session.base_order_id.clone(),
                provider_ref: session.provider_ref.clone(),
            },
        )
    }

    /// The marker of the last consumed checkout.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupt` if the marker does not decode.
    pub fn last_finalized(&self) -> Result<Option<FinalizedMarker>, StorageError> {
        self.storage.get_json(LAST_FINALIZED_KEY)
    }
}
