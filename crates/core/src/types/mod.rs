//! Domain types shared by the storefront, the payment server and the CLI.

pub mod cart;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;

pub use cart::{CartLine, CartSummary, LineKey};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{
    CustomerInfo, Order, OrderConfirmation, OrderItem, UNKNOWN_SELLER, seller_order_id,
};
pub use price::{CurrencyCode, Price, round_whole, whole_units};
pub use product::{InsufficientStock, Product, ProductColor, SizeLabel, SizeStock};
pub use status::*;
