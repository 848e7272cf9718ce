//! User profile repository.
//!
//! Profiles are written by the identity provider's sign-up flow; the
//! storefront only reads the email address for order confirmations.

use subasa_core::{DocumentId, Email, UserId};

use super::{DocumentStore, RepositoryError, USERS};

/// Repository for `users/{id}`.
pub struct UserRepository<'a, D> {
    store: &'a D,
}

impl<'a, D: DocumentStore> UserRepository<'a, D> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(store: &'a D) -> Self {
        Self { store }
    }

    /// Get the email address on a user's profile.
    ///
    /// Returns `None` when the profile does not exist or has no email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_email(&self, id: &UserId) -> Result<Option<Email>, RepositoryError> {
        let Some(doc) = self.store.get(USERS, &DocumentId::new(id.as_str())).await? else {
            return Ok(None);
        };

        match doc.data.get("email").and_then(|v| v.as_str()) {
            Some(raw) if !raw.trim().is_empty() => Email::parse(raw).map(Some).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email on users/{id}: {e}"))
            }),
            _ => Ok(None),
        }
    }
}
