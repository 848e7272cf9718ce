//! Signed-in identity as seen by the cart.
//!
//! Authentication itself is done by the external identity provider; this
//! module only tracks who is signed in and derives the cart namespace from
//! it. Changes are broadcast so the cart store can reload the right bucket.

use tokio::sync::watch;

use subasa_core::UserId;

use crate::storage::{LocalStorage, StorageError};

/// Storage key holding the signed-in user id between sessions.
pub const USER_ID_KEY: &str = "userId";

/// Cart namespace for shoppers who are not signed in.
///
/// User carts live under `cart_<id>`, which can never equal this key, so no
/// user id (not even `guest`) shares the guest's lines.
pub const GUEST_CART_KEY: &str = "cart";

/// Who is using the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Guest,
    User(UserId),
}

impl Identity {
    /// Storage key of this identity's cart.
    #[must_use]
    pub fn cart_key(&self) -> String {
        match self {
            Self::Guest => GUEST_CART_KEY.to_owned(),
            Self::User(id) => format!("cart_{id}"),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }

    /// Read the persisted identity.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn load<S: LocalStorage>(storage: &S) -> Result<Self, StorageError> {
        Ok(match storage.get_item(USER_ID_KEY)? {
            Some(id) if !id.trim().is_empty() => Self::User(UserId::new(id.trim())),
            _ => Self::Guest,
        })
    }

    /// Persist this identity.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn save<S: LocalStorage>(&self, storage: &S) -> Result<(), StorageError> {
        match self {
            Self::Guest => storage.remove_item(USER_ID_KEY),
            Self::User(id) => storage.set_item(USER_ID_KEY, id.as_str()),
        }
    }
}

/// Shared, observable authentication state.
#[derive(Debug, Clone)]
pub struct AuthState {
    tx: watch::Sender<Identity>,
}

impl AuthState {
    #[must_use]
    pub fn new(initial: Identity) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    #[must_use]
    pub fn current(&self) -> Identity {
        self.tx.borrow().clone()
    }

    pub fn sign_in(&self, user: UserId) {
        self.tx.send_replace(Identity::User(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(Identity::Guest);
    }

    /// Receive identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new(Identity::Guest)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_cart_keys() {
        assert_eq!(Identity::Guest.cart_key(), "cart");
        assert_eq!(Identity::User(UserId::new("u42")).cart_key(), "cart_u42");
    }

    #[test]
    fn test_user_named_guest_has_own_key() {
        let user = Identity::User(UserId::new("guest"));
        assert_eq!(user.cart_key(), "cart_guest");
        assert_ne!(user.cart_key(), Identity::Guest.cart_key());
        assert_ne!(Identity::User(UserId::new("")).cart_key(), Identity::Guest.cart_key());
    }

    #[test]
    fn test_load_and_save() {
        let storage = MemoryStorage::new();
        assert_eq!(Identity::load(&storage).unwrap(), Identity::Guest);

        Identity::User(UserId::new("u1")).save(&storage).unwrap();
        assert_eq!(
            Identity::load(&storage).unwrap(),
            Identity::User(UserId::new("u1"))
        );

        Identity::Guest.save(&storage).unwrap();
        assert!(storage.get_item(USER_ID_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let auth = AuthState::default();
        let mut rx = auth.subscribe();

        auth.sign_in(UserId::new("u1"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Identity::User(UserId::new("u1")));

        auth.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Identity::Guest);
    }
}
