//! Checkout and payment return.
//!
//! The document snapshot is written back after every attempt, successful or
//! not, so orders and stock changes already made are never lost.

use tracing::{info, warn};
use url::Url;

use subasa_core::{CustomerInfo, LineKey, PaymentMethod, Price};
use subasa_storefront::cart::CheckoutSelection;
use subasa_storefront::checkout::{CheckoutOutcome, CheckoutRequest, ResumeOutcome};
use subasa_storefront::gateway::HttpPaymentGateway;
use subasa_storefront::CheckoutReconciler;

use crate::context::{CliError, Context};

/// Check out the whole cart, or only the `only` line keys.
///
/// # Errors
///
/// Returns an error if a selected key is not in the cart, or the checkout
/// fails. Retryable failures say so.
pub async fn submit(ctx: &Context, customer: CustomerInfo, method: PaymentMethod, only: &[String]) -> Result<(), CliError> {
    let mut cart = ctx.cart()?;

    let mut selection = CheckoutSelection::new(cart.lines());
    if !only.is_empty() {
        selection.select_all(false);
        for key in only {
            if !selection.set_selected(&LineKey::from(key.as_str()), true) {
                return Err(CliError::UnknownLine(key.clone()));
            }
        }
    }
    info!(
        "Checking out {} line(s), {} by {method}",
        selection.selected_lines().len(),
        Price::vnd(selection.selected_total())
    );

    let store = ctx.documents().await?;
    let gateway = HttpPaymentGateway::new(ctx.config.gateway_url.clone())?;
    let mut reconciler = CheckoutReconciler::new(store, gateway);

    let request = CheckoutRequest {
        lines: selection.selected_lines(),
        customer,
        method,
    };
    let result = reconciler.submit(request, &mut cart).await;
    ctx.save_documents(reconciler.store()).await?;

    match result {
        Ok(CheckoutOutcome::Completed { base_order_id, order_ids }) => {
            info!("Order {base_order_id} placed ({} seller order(s))", order_ids.len());
            for id in order_ids {
                info!("  {id}");
            }
        }
        Ok(CheckoutOutcome::Redirect { base_order_id, url }) => {
            info!("Order {base_order_id} awaits payment. Pay here:");
            info!("  {url}");
            info!("Then run `subasa resume <return url>`.");
        }
        Err(e) => {
            if e.is_retryable() {
                warn!("Stock changed while checking out; try again.");
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Resolve a return URL, or the configured return page when none is given.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the payment cannot be resolved.
pub async fn resume(ctx: &Context, url: Option<&str>) -> Result<(), CliError> {
    let url = match url {
        Some(raw) => Url::parse(raw)?,
        None => ctx.config.return_url.clone(),
    };

    let mut cart = ctx.cart()?;
    let store = ctx.documents().await?;
    let gateway = HttpPaymentGateway::new(ctx.config.gateway_url.clone())?;
    let mut reconciler = CheckoutReconciler::new(store, gateway);

    let result = reconciler.resume(&url, &mut cart).await;
    ctx.save_documents(reconciler.store()).await?;
    let resume = result?;

    match resume.outcome {
        ResumeOutcome::NotApplicable => info!("No payment in progress."),
        ResumeOutcome::AlreadyHandled => info!("This payment was already handled."),
        ResumeOutcome::AwaitingProvider { base_order_id } => {
            info!("Order {base_order_id}: the provider has not confirmed payment yet.");
        }
        ResumeOutcome::Completed { base_order_id, order_ids } => {
            info!("Order {base_order_id} paid ({} seller order(s)).", order_ids.len());
        }
        ResumeOutcome::Failed { base_order_id, reason } => {
            warn!("Order {base_order_id}: {}", reason.user_message());
        }
    }
    info!("Return page: {}", resume.clean_url);
    Ok(())
}
