//! Sign in and out.
//!
//! Signing in only records which user is active; authentication belongs to
//! the identity provider. The cart follows the switch and reports what the
//! newly active namespace holds.

use tracing::info;

use subasa_core::UserId;
use subasa_storefront::CartStore;
use subasa_storefront::identity::{AuthState, Identity};
use subasa_storefront::storage::LocalStorage;

use crate::context::{CliError, Context};

/// Switch to `user_id`'s cart.
///
/// # Errors
///
/// Returns an error if the id is blank or storage cannot be written.
pub fn login(ctx: &Context, user_id: &str) -> Result<(), CliError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(CliError::Usage("user id cannot be empty".to_string()));
    }
    switch(&ctx.storage, Identity::User(UserId::new(user_id))).map(|_| ())
}

/// Switch to the guest cart.
///
/// # Errors
///
/// Returns an error if storage cannot be written.
pub fn logout(ctx: &Context) -> Result<(), CliError> {
    switch(&ctx.storage, Identity::Guest).map(|_| ())
}

fn switch<S: LocalStorage + Clone>(storage: &S, identity: Identity) -> Result<usize, CliError> {
    let auth = AuthState::new(Identity::load(storage)?);
    let mut cart = CartStore::open(storage.clone(), auth.current())?;
    let mut changes = auth.subscribe();

    match identity.user_id() {
        Some(id) => auth.sign_in(id.clone()),
        None => auth.sign_out(),
    }
    cart.follow_identity(&mut changes)?;
    auth.current().save(storage)?;

    let lines = cart.lines().len();
    match identity.user_id() {
        Some(id) => info!("Signed in as {id} (cart {}, {lines} line(s))", cart.namespace()),
        None => info!("Signed out (cart {}, {lines} line(s))", cart.namespace()),
    }
    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use subasa_storefront::storage::MemoryStorage;

    fn flat_product() -> subasa_core::Product {
        serde_json::from_value(serde_json::json!({
            "id": "ball",
            "productName": "Bóng",
            "price": 100_000,
            "quantity": 5
        }))
        .unwrap()
    }

    #[test]
    fn test_switch_persists_identity() {
        let storage = MemoryStorage::new();
        switch(&storage, Identity::User(UserId::new("u1"))).unwrap();
        assert_eq!(Identity::load(&storage).unwrap(), Identity::User(UserId::new("u1")));

        switch(&storage, Identity::Guest).unwrap();
        assert_eq!(Identity::load(&storage).unwrap(), Identity::Guest);
    }

    #[test]
    fn test_switch_reports_the_followed_cart() {
        let storage = MemoryStorage::new();
        let mut guest = CartStore::open(storage.clone(), Identity::Guest).unwrap();
        guest.add_to_cart(&flat_product(), "", "", 1).unwrap();

        assert_eq!(switch(&storage, Identity::User(UserId::new("u1"))).unwrap(), 0);
        assert_eq!(switch(&storage, Identity::Guest).unwrap(), 1);
    }
}
