//! Cart behavior across the store, the catalog and device storage.

use subasa_core::{LineKey, UserId};
use subasa_storefront::catalog::{CatalogService, DEFAULT_TTL};
use subasa_storefront::identity::Identity;
use subasa_storefront::storage::{FileStorage, LocalStorage, MemoryStorage};
use subasa_storefront::{CartStore, LineUpdate};

use subasa_integration_tests::{product, sized, store_with, user_cart};

// =============================================================================
// Stock clamping
// =============================================================================

#[test]
fn test_add_clamps_to_remaining_stock() {
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let mut cart = user_cart("u1");

    assert_eq!(cart.add_to_cart(&p1, "", "", 3).unwrap(), 3);
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].quantity, 3);
    assert_eq!(p1.headroom("", "", cart.lines()), 2);

    // only 5 - 3 = 2 more fit
    assert_eq!(cart.add_to_cart(&p1, "", "", 4).unwrap(), 2);
    assert_eq!(cart.lines()[0].quantity, 5);

    assert_eq!(cart.add_to_cart(&p1, "", "", 1).unwrap(), 0);
    assert_eq!(cart.lines()[0].quantity, 5);
}

#[test]
fn test_same_variant_merges_into_one_line() {
    let shoe = sized("shoe", "a@x.com", 500_000, "42", 10);
    let mut cart = user_cart("u1");

    cart.add_to_cart(&shoe, "", "42", 1).unwrap();
    cart.add_to_cart(&shoe, "", "42", 2).unwrap();
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].quantity, 3);
    assert_eq!(cart.lines()[0].line_key, LineKey::from("shoe--42"));
}

#[test]
fn test_update_quantity_zero_keeps_line_at_one() {
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 3).unwrap();
    let key = cart.lines()[0].line_key.clone();

    assert_eq!(cart.update_quantity(&key, 0).unwrap(), LineUpdate::Quantity(1));
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.update_quantity(&key, 99).unwrap(), LineUpdate::Quantity(5));
}

#[test]
fn test_decrease_removes_at_one() {
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 2).unwrap();
    let key = cart.lines()[0].line_key.clone();

    assert_eq!(cart.decrease_quantity(&key).unwrap(), LineUpdate::Quantity(1));
    assert_eq!(cart.decrease_quantity(&key).unwrap(), LineUpdate::Removed);
    assert!(cart.lines().is_empty());
    assert_eq!(cart.decrease_quantity(&key).unwrap(), LineUpdate::NotInCart);
}

// =============================================================================
// Namespaces and persistence
// =============================================================================

#[test]
fn test_login_switches_namespace() {
    let storage = MemoryStorage::new();
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let p2 = product("p2", "b@y.com", 200_000, 5);

    let mut cart = CartStore::open(storage.clone(), Identity::Guest).unwrap();
    cart.add_to_cart(&p1, "", "", 1).unwrap();

    cart.load_user_cart(Identity::User(UserId::new("u1"))).unwrap();
    assert!(cart.lines().is_empty());
    cart.add_to_cart(&p2, "", "", 2).unwrap();

    cart.load_user_cart(Identity::Guest).unwrap();
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].product.id.as_str(), "p1");

    assert!(storage.get_item("cart").unwrap().is_some());
    assert!(storage.get_item("cart_u1").unwrap().is_some());
}

#[test]
fn test_cart_survives_reopen_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let identity = Identity::User(UserId::new("u1"));

    {
        let storage = FileStorage::open(dir.path()).unwrap();
        let mut cart = CartStore::open(storage, identity.clone()).unwrap();
        cart.add_to_cart(&p1, "", "", 4).unwrap();
    }

    let storage = FileStorage::open(dir.path()).unwrap();
    let cart = CartStore::open(storage, identity).unwrap();
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].quantity, 4);
    assert_eq!(cart.summary().total_items, 4);
}

#[test]
fn test_corrupt_cart_loads_empty() {
    let storage = MemoryStorage::new();
    storage.set_item("cart", "{not json").unwrap();
    let cart = CartStore::open(storage, Identity::Guest).unwrap();
    assert!(cart.lines().is_empty());
}

// =============================================================================
// Catalog refresh
// =============================================================================

#[tokio::test]
async fn test_fresh_stock_clamps_existing_line() {
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let store = store_with(&[&p1]).await;
    let catalog = CatalogService::new(store, DEFAULT_TTL);

    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 5).unwrap();

    // someone else bought 3
    let mut sold = p1.clone();
    sold.quantity = 2;
    catalog.seed(&[sold]).await.unwrap();

    let fresh = catalog.fresh_product(&p1.id).await.unwrap().unwrap();
    assert_eq!(cart.sync_product(&fresh).unwrap(), 1);
    assert_eq!(cart.lines()[0].quantity, 2);
}
