//! Subasa Sports storefront library.
//!
//! Client-side core of the shop: the cart store (stock-bounded lines,
//! persisted per identity) and the checkout reconciler (per-seller orders,
//! conditional stock decrement, payment redirect and resume).
//!
//! Remote collaborators sit behind traits so the CLI and the tests can swap
//! them:
//!
//! - [`db::DocumentStore`] - hosted document database (`products`, `orders`, `users`)
//! - [`storage::LocalStorage`] - persisted key/value state on the shopper's device
//! - [`gateway::PaymentGateway`] - companion payment/email server

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod db;
pub mod gateway;
pub mod hold;
pub mod identity;
pub mod storage;

pub use cart::{CartError, CartStore, LineUpdate};
pub use checkout::{CheckoutError, CheckoutReconciler};
pub use config::{ConfigError, StorefrontConfig};
