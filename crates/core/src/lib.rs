//! Subasa Core - Shared domain types.
//!
//! This crate provides the types used across all Subasa Sports components:
//! - `storefront` - Cart store and checkout reconciler (client side)
//! - `payment-server` - Companion server that brokers payment-provider redirects
//! - `cli` - Command-line front-end over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure business rules - no I/O, no
//! document store access, no HTTP clients. This keeps it lightweight and allows
//! it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Document ids, prices, emails, statuses, products, cart lines and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
