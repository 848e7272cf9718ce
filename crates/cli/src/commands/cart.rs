//! Cart commands.

use std::time::Duration;

use tracing::{debug, info, warn};

use subasa_core::{LineKey, Price};
use subasa_storefront::hold::{HoldRepeater, HoldTiming};
use subasa_storefront::storage::LocalStorage;
use subasa_storefront::{CartError, CartStore, LineUpdate};

use crate::context::{CliError, Context};

/// Direction of a quantity button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

/// Print the lines and totals of the active cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be read.
pub fn show(ctx: &Context) -> Result<(), CliError> {
    let cart = ctx.cart()?;
    info!("Cart {}", cart.namespace());
    if cart.lines().is_empty() {
        info!("  (empty)");
        return Ok(());
    }
    for line in cart.lines() {
        info!(
            "  {:<28} {} [{} / {}] x{} = {} (stock {})",
            line.line_key,
            line.product.product_name,
            if line.selected_color.is_empty() { "-" } else { line.selected_color.as_str() },
            if line.selected_size.is_empty() { "-" } else { line.selected_size.as_str() },
            line.quantity,
            Price::vnd(line.subtotal()),
            line.available_stock(),
        );
    }
    let summary = cart.summary();
    info!("  {} items, total {}", summary.total_items, Price::vnd(summary.total_price));
    Ok(())
}

/// Add a product read fresh from the catalog.
///
/// # Errors
///
/// Returns an error if the product does not exist, a required variant is
/// missing, or storage fails.
pub async fn add(ctx: &Context, product_id: &str, color: &str, size: &str, quantity: u32) -> Result<(), CliError> {
    let product = super::catalog::find(ctx, product_id)
        .await?
        .ok_or_else(|| CliError::ProductNotFound(product_id.to_owned()))?;

    let mut cart = ctx.cart()?;
    let added = cart.add_to_cart(&product, color, size, quantity)?;
    if added == 0 {
        warn!("{} is already at the available stock in your cart", product.product_name);
    } else if added < quantity {
        info!("Added {added} of {quantity} (limited by stock) {}", product.product_name);
    } else {
        info!("Added {added} x {}", product.product_name);
    }
    Ok(())
}

/// Press a quantity button once, or hold it for `hold_ms`.
///
/// # Errors
///
/// Returns an error if the line does not exist or storage fails.
pub async fn step(ctx: &Context, line_key: &str, direction: Step, hold_ms: Option<u64>) -> Result<(), CliError> {
    let mut cart = ctx.cart()?;
    let key = LineKey::from(line_key);

    let last = match hold_ms {
        None => apply(&mut cart, &key, direction)?,
        Some(ms) => hold(&mut cart, &key, direction, Duration::from_millis(ms)).await?,
    };
    report(line_key, last)
}

/// Repeat `direction` while the button is held.
///
/// Stops early once the line can no longer change.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn hold<S: LocalStorage>(
    cart: &mut CartStore<S>,
    key: &LineKey,
    direction: Step,
    held_for: Duration,
) -> Result<LineUpdate, CartError> {
    let (repeater, mut ticks) = HoldRepeater::press(HoldTiming::default());
    let release = tokio::time::sleep(held_for);
    tokio::pin!(release);

    let mut last = cart.line(key).map_or(LineUpdate::NotInCart, |l| LineUpdate::Quantity(l.quantity));
    loop {
        tokio::select! {
            () = &mut release => break,
            tick = ticks.recv() => {
                let Some(step) = tick else { break };
                let update = apply(cart, key, direction)?;
                debug!(step, ?update, "Hold step");
                let stuck = update == last;
                last = update;
                if stuck || !matches!(update, LineUpdate::Quantity(_)) {
                    break;
                }
            }
        }
    }
    repeater.release();
    Ok(last)
}

fn apply<S: LocalStorage>(cart: &mut CartStore<S>, key: &LineKey, direction: Step) -> Result<LineUpdate, CartError> {
    match direction {
        Step::Up => cart.increase_quantity(key),
        Step::Down => cart.decrease_quantity(key),
    }
}

fn report(line_key: &str, update: LineUpdate) -> Result<(), CliError> {
    match update {
        LineUpdate::Quantity(q) => info!("{line_key}: quantity {q}"),
        LineUpdate::Removed => info!("{line_key}: removed"),
        LineUpdate::Unavailable => warn!("{line_key}: out of stock, left unchanged"),
        LineUpdate::NotInCart => return Err(CliError::UnknownLine(line_key.to_owned())),
    }
    Ok(())
}

/// Set a line's quantity. Values below 1 become 1.
///
/// # Errors
///
/// Returns an error if the line does not exist or storage fails.
pub fn set(ctx: &Context, line_key: &str, quantity: i64) -> Result<(), CliError> {
    let mut cart = ctx.cart()?;
    let update = cart.update_quantity(&LineKey::from(line_key), quantity)?;
    report(line_key, update)
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the line does not exist or storage fails.
pub fn remove(ctx: &Context, line_key: &str) -> Result<(), CliError> {
    let mut cart = ctx.cart()?;
    if !cart.remove_from_cart(&LineKey::from(line_key))? {
        return Err(CliError::UnknownLine(line_key.to_owned()));
    }
    info!("{line_key}: removed");
    Ok(())
}

/// Empty the active cart.
///
/// # Errors
///
/// Returns an error if storage fails.
pub fn clear(ctx: &Context) -> Result<(), CliError> {
    let mut cart = ctx.cart()?;
    cart.clear_cart()?;
    info!("Cart {} cleared", cart.namespace());
    Ok(())
}
