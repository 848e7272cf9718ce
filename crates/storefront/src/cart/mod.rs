//! Client-local shopping cart.
//!
//! The cart is an ordered list of [`CartLine`]s persisted under the current
//! identity's namespace (`cart_<userId>`, or `cart` for guests). Every line
//! satisfies `0 < quantity <= available stock` as of the product snapshot it
//! carries; operations never push a line past that bound.
//!
//! Mutations are applied to a copy, persisted, and only then made visible
//! and broadcast to subscribers. A storage failure leaves the cart as it was.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use subasa_core::{CartLine, CartSummary, LineKey, Product};

use crate::identity::Identity;
use crate::storage::{LocalStorage, StorageError};

pub mod selection;

pub use selection::CheckoutSelection;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The product has sizes but none was chosen.
    #[error("please choose a size")]
    SizeRequired,

    /// The product has colors but none was chosen.
    #[error("please choose a color")]
    ColorRequired,
}

/// Result of a quantity edit on an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineUpdate {
    /// The line now holds this quantity.
    Quantity(u32),
    /// The line was removed.
    Removed,
    /// No line with that key.
    NotInCart,
    /// The line's bucket has no stock; the line was left untouched.
    Unavailable,
}

/// What subscribers receive after every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub summary: CartSummary,
}

impl CartView {
    fn of(lines: &[CartLine]) -> Self {
        Self {
            lines: lines.to_vec(),
            summary: CartSummary::of(lines),
        }
    }
}

/// The cart of the current identity.
pub struct CartStore<S> {
    storage: S,
    identity: Identity,
    lines: Vec<CartLine>,
    tx: watch::Sender<CartView>,
}

impl<S: LocalStorage> CartStore<S> {
    /// Open the cart of `identity`, loading whatever was persisted for it.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn open(storage: S, identity: Identity) -> Result<Self, CartError> {
        let lines = read_lines(&storage, &identity.cart_key())?;
        let tx = watch::Sender::new(CartView::of(&lines));
        Ok(Self {
            storage,
            identity,
            lines,
            tx,
        })
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Storage key of the active cart.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.identity.cart_key()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.line_key == key)
    }

    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::of(&self.lines)
    }

    /// Receive the line list and totals after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.tx.subscribe()
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Add up to `requested` units of `(product, color, size)`.
    ///
    /// Adds `min(requested, stock - already_in_line)` and returns that
    /// amount. Returns 0 without touching the cart when nothing more fits.
    /// The line's product snapshot is replaced with `product`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::SizeRequired` / `CartError::ColorRequired` when a
    /// required variant was not chosen, or `CartError::Storage` if the cart
    /// cannot be persisted.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_to_cart(
        &mut self,
        product: &Product,
        color: &str,
        size: &str,
        requested: u32,
    ) -> Result<u32, CartError> {
        if !product.colors.is_empty() && color.trim().is_empty() {
            return Err(CartError::ColorRequired);
        }
        if product.has_size && size.trim().is_empty() {
            return Err(CartError::SizeRequired);
        }

        let room = product.headroom(color, size, &self.lines);
        if room == 0 {
            warn!(color, size, "Maximum quantity already in cart, nothing added");
            return Ok(0);
        }

        let added = requested.min(room);
        if added == 0 {
            return Ok(0);
        }

        let key = LineKey::derive(&product.id, color, size);
        let mut lines = self.lines.clone();
        if let Some(line) = lines.iter_mut().find(|l| l.line_key == key) {
            line.quantity += added;
            line.product = product.clone();
        } else {
            lines.push(CartLine::new(product.clone(), color, size, added));
        }

        self.commit(lines)?;
        debug!(line_key = %key, added, "Added to cart");
        Ok(added)
    }

    /// Add one unit to a line, up to its stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the cart cannot be persisted.
    pub fn increase_quantity(&mut self, key: &LineKey) -> Result<LineUpdate, CartError> {
        self.edit(key, |quantity, available| {
            let next = quantity.saturating_add(1).min(available);
            if next == quantity {
                warn!(line_key = %key, quantity, "Line already at available stock");
            }
            Some(next)
        })
    }

    /// Remove one unit from a line. A line at quantity 1 is removed.
    ///
    /// Decrementing never needs stock, so it works on sold-out lines too.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the cart cannot be persisted.
    pub fn decrease_quantity(&mut self, key: &LineKey) -> Result<LineUpdate, CartError> {
        let Some(line) = self.line(key) else {
            return Ok(LineUpdate::NotInCart);
        };
        if line.quantity <= 1 {
            return self.remove_from_cart(key).map(|_| LineUpdate::Removed);
        }

        let quantity = line.quantity - 1;
        let mut lines = self.lines.clone();
        if let Some(line) = lines.iter_mut().find(|l| &l.line_key == key) {
            line.quantity = quantity;
        }
        self.commit(lines)?;
        Ok(LineUpdate::Quantity(quantity))
    }

    /// Set a line's quantity, clamped into `[1, stock]`.
    ///
    /// Values `<= 0` become 1; setting never removes a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the cart cannot be persisted.
    pub fn update_quantity(&mut self, key: &LineKey, requested: i64) -> Result<LineUpdate, CartError> {
        self.edit(key, |_, available| {
            let wanted = u32::try_from(requested.max(1)).unwrap_or(u32::MAX);
            if wanted > available {
                warn!(line_key = %key, requested, available, "Requested quantity exceeds stock, clamped");
            }
            Some(wanted.min(available))
        })
    }

    /// Remove a line. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the cart cannot be persisted.
    pub fn remove_from_cart(&mut self, key: &LineKey) -> Result<bool, CartError> {
        self.remove_lines(std::slice::from_ref(key)).map(|n| n > 0)
    }

    /// Remove several lines at once. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the cart cannot be persisted.
    pub fn remove_lines(&mut self, keys: &[LineKey]) -> Result<usize, CartError> {
        let lines: Vec<CartLine> = self
            .lines
            .iter()
            .filter(|l| !keys.contains(&l.line_key))
            .cloned()
            .collect();
        let removed = self.lines.len() - lines.len();
        if removed > 0 {
            self.commit(lines)?;
        }
        Ok(removed)
    }

    /// Empty the cart and delete its namespace from storage.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the namespace cannot be deleted.
    pub fn clear_cart(&mut self) -> Result<(), CartError> {
        self.storage.remove_item(&self.namespace())?;
        self.lines.clear();
        self.publish();
        Ok(())
    }

    /// Switch to `identity`'s namespace and load its lines.
    ///
    /// Nothing from the previous identity's cart carries over.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if storage cannot be read.
    #[instrument(skip(self), fields(namespace = %identity.cart_key()))]
    pub fn load_user_cart(&mut self, identity: Identity) -> Result<(), CartError> {
        let lines = read_lines(&self.storage, &identity.cart_key())?;
        self.identity = identity;
        self.lines = lines;
        self.publish();
        Ok(())
    }

    /// Catch up with the signed-in identity published by
    /// [`AuthState`](crate::identity::AuthState).
    ///
    /// Reloads through [`Self::load_user_cart`] when the latest identity
    /// differs from the cart's. Returns whether a reload happened.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if storage cannot be read.
    pub fn follow_identity(&mut self, changes: &mut watch::Receiver<Identity>) -> Result<bool, CartError> {
        let latest = changes.borrow_and_update().clone();
        if latest == self.identity {
            return Ok(false);
        }
        debug!(from = %self.namespace(), to = %latest.cart_key(), "Identity changed, reloading cart");
        self.load_user_cart(latest)?;
        Ok(true)
    }

    /// Replace the snapshot of `product` in every matching line and clamp
    /// those lines to the fresh stock. Lines whose bucket is now empty are
    /// removed. Returns how many lines changed quantity or were removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the cart cannot be persisted.
    pub fn sync_product(&mut self, product: &Product) -> Result<usize, CartError> {
        let mut changed = 0;
        let mut lines = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.product.id != product.id {
                lines.push(line.clone());
                continue;
            }

            let available = product.available_stock(&line.selected_size);
            let quantity = line.quantity.min(available);
            if quantity != line.quantity {
                changed += 1;
                debug!(line_key = %line.line_key, from = line.quantity, to = quantity, "Line clamped to fresh stock");
            }
            if quantity > 0 {
                let mut line = line.clone();
                line.product = product.clone();
                line.quantity = quantity;
                lines.push(line);
            }
        }

        if lines != self.lines {
            self.commit(lines)?;
        }
        Ok(changed)
    }

    /// Apply `f(quantity, available) -> new quantity` to one line.
    fn edit<F>(&mut self, key: &LineKey, f: F) -> Result<LineUpdate, CartError>
    where
        F: FnOnce(u32, u32) -> Option<u32>,
    {
        let Some(index) = self.lines.iter().position(|l| &l.line_key == key) else {
            return Ok(LineUpdate::NotInCart);
        };
        let mut lines = self.lines.clone();
        let Some(line) = lines.get_mut(index) else {
            return Ok(LineUpdate::NotInCart);
        };

        let available = line.available_stock();
        if available == 0 {
            warn!(line_key = %key, "Line has no stock left, left unchanged");
            return Ok(LineUpdate::Unavailable);
        }

        let Some(next) = f(line.quantity, available) else {
            return Ok(LineUpdate::Quantity(line.quantity));
        };
        let next = next.clamp(1, available);
        if next == line.quantity {
            return Ok(LineUpdate::Quantity(next));
        }

        line.quantity = next;
        self.commit(lines)?;
        Ok(LineUpdate::Quantity(next))
    }

    fn commit(&mut self, lines: Vec<CartLine>) -> Result<(), CartError> {
        self.storage.set_json(&self.namespace(), &lines)?;
        self.lines = lines;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.tx.send_replace(CartView::of(&self.lines));
    }
}

/// Read a namespace. A corrupt entry is treated as an empty cart.
fn read_lines<S: LocalStorage>(storage: &S, key: &str) -> Result<Vec<CartLine>, CartError> {
    match storage.get_json::<Vec<CartLine>>(key) {
        Ok(lines) => Ok(lines
            .unwrap_or_default()
            .into_iter()
            .filter(|l| l.quantity > 0)
            .collect()),
        Err(StorageError::Corrupt { key, source }) => {
            warn!(%key, error = %source, "Discarding unreadable cart");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
