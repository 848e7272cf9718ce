//! Checkout reconciler.
//!
//! Turns the selected cart lines into one `pending` order per seller, takes
//! the stock, and either finishes on the spot (cash on delivery) or sends the
//! shopper to the payment provider and finishes when the return URL comes
//! back.
//!
//! Remote calls run strictly in sequence: order writes, stock decrement,
//! payment creation or confirmation email, cart cleanup. Nothing is undone
//! once the first order is written, except on a stock conflict: decrements
//! already applied are put back and the attempt's orders are cancelled.

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use subasa_core::{
    CartLine, CartSummary, CustomerInfo, DocumentId, LineKey, OrderConfirmation, OrderId, OrderItem,
    OrderStatus, PaymentMethod, UserId, seller_order_id, whole_units,
};

use crate::cart::CartStore;
use crate::db::{DocumentStore, OrderRepository, ProductRepository, StockError, UserRepository};
use crate::gateway::PaymentGateway;
use crate::storage::LocalStorage;

pub mod error;
pub mod grouping;
pub mod phase;
pub mod return_url;
pub mod session;

pub use error::{CheckoutError, ProviderError, ValidationError};
pub use grouping::{SellerGroup, build_orders, group_by_seller};
pub use phase::CheckoutPhase;
pub use return_url::{PaymentResult, ReturnParams, parse_return_url};
pub use session::{PaymentSession, SessionStore};

/// What the shopper submitted from the checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// The selected lines, snapshotted at submit time.
    pub lines: Vec<CartLine>,
    pub customer: CustomerInfo,
    pub method: PaymentMethod,
}

/// Result of [`CheckoutReconciler::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Cash on delivery: orders placed, purchased lines removed.
    Completed {
        base_order_id: String,
        order_ids: Vec<OrderId>,
    },
    /// Online payment: send the shopper to `url`.
    Redirect { base_order_id: String, url: Url },
}

/// Why a returning payment did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFailure {
    /// The shopper cancelled on the provider page.
    Cancelled,
    /// The provider reported this result code.
    Declined(String),
    /// Stripe reports the session as not paid.
    Unpaid,
}

impl PaymentFailure {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Cancelled => "Payment cancelled.".to_string(),
            Self::Declined(code) => format!("Payment failed (code {code})."),
            Self::Unpaid => "Payment has not been completed.".to_string(),
        }
    }
}

/// What a return URL resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No payment is outstanding and the URL carries nothing for us.
    NotApplicable,
    /// The URL was already consumed by an earlier resume.
    AlreadyHandled,
    /// A payment is outstanding but the provider has not settled it yet.
    AwaitingProvider { base_order_id: String },
    /// Paid: confirmation requested, purchased lines removed.
    Completed {
        base_order_id: String,
        order_ids: Vec<OrderId>,
    },
    /// Not paid; the orders stay `pending`.
    Failed {
        base_order_id: String,
        reason: PaymentFailure,
    },
}

/// Result of [`CheckoutReconciler::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resume {
    pub outcome: ResumeOutcome,
    /// The return URL without provider parameters. Replace the current URL
    /// with it.
    pub clean_url: Url,
}

/// The lines being paid for and who pays for them.
struct Purchase<'p> {
    base_order_id: &'p str,
    lines: &'p [CartLine],
    customer: &'p CustomerInfo,
    user_id: Option<&'p UserId>,
    namespace: &'p str,
}

impl<'p> Purchase<'p> {
    fn of_session(session: &'p PaymentSession) -> Self {
        Self {
            base_order_id: &session.base_order_id,
            lines: &session.cart_snapshot,
            customer: &session.customer,
            user_id: session.user_id.as_ref(),
            namespace: &session.cart_namespace,
        }
    }

    fn order_ids(&self) -> Vec<OrderId> {
        group_by_seller(self.lines)
            .iter()
            .map(|group| seller_order_id(self.base_order_id, group.seller))
            .collect()
    }
}

/// Drives one shopper's checkouts.
pub struct CheckoutReconciler<D, G> {
    store: D,
    gateway: G,
    phase: CheckoutPhase,
}

impl<D: DocumentStore, G: PaymentGateway> CheckoutReconciler<D, G> {
    #[must_use]
    pub const fn new(store: D, gateway: G) -> Self {
        Self {
            store,
            gateway,
            phase: CheckoutPhase::Idle,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> CheckoutPhase {
        self.phase
    }

    #[must_use]
    pub const fn store(&self) -> &D {
        &self.store
    }

    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Forget an attempt that was interrupted mid-flight.
    pub fn reset(&mut self) {
        self.phase = CheckoutPhase::Idle;
    }

    /// Place the orders for `request`.
    ///
    /// Cash on delivery completes immediately. Online methods persist a
    /// [`PaymentSession`] in the cart's storage and return the provider URL;
    /// call [`Self::resume`] with the URL the shopper comes back on. An
    /// outstanding session from an abandoned attempt is discarded.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]; each variant states what was left behind.
    #[instrument(skip(self, request, cart), fields(method = %request.method, lines = request.lines.len()))]
    pub async fn submit<S: LocalStorage>(
        &mut self,
        request: CheckoutRequest,
        cart: &mut CartStore<S>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.advance(CheckoutPhase::Validating)?;
        let result = self.run_submit(request, cart).await;
        if let Err(e) = &result {
            warn!(error = %e, phase = %self.phase, "Checkout failed");
            self.phase = CheckoutPhase::Failed;
        }
        result
    }

    /// Handle the URL the shopper returned on.
    ///
    /// Provider parameters are consumed at most once: the resume keys are
    /// cleared before any side effect, and a replayed URL resolves to
    /// [`ResumeOutcome::AlreadyHandled`]. Stripe sessions are also resolved
    /// when the URL carries nothing, by asking for the stored session's
    /// status.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Provider` when the URL belongs to another
    /// checkout or the provider cannot be asked (the session is kept), or
    /// `CheckoutError::Storage` / `CheckoutError::Cart` when local state
    /// cannot be read or written.
    #[instrument(skip(self, return_url, cart), fields(url = %return_url))]
    pub async fn resume<S: LocalStorage>(
        &mut self,
        return_url: &Url,
        cart: &mut CartStore<S>,
    ) -> Result<Resume, CheckoutError> {
        let (params, clean_url) = parse_return_url(return_url);
        let result = self.run_resume(params, cart).await;
        if let Err(e) = &result {
            warn!(error = %e, "Resume failed");
            if self.phase == CheckoutPhase::Resumed {
                self.phase = CheckoutPhase::Failed;
            }
        }
        Ok(Resume {
            outcome: result?,
            clean_url,
        })
    }

    async fn run_submit<S: LocalStorage>(
        &mut self,
        request: CheckoutRequest,
        cart: &mut CartStore<S>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        validate(&request)?;

        let sessions = SessionStore::new(cart.storage());
        if sessions.in_progress()? {
            warn!("Discarding abandoned payment session");
            sessions.clear()?;
        }

        let now = Utc::now();
        let base_order_id = format!("ORDER{}", now.timestamp_millis());
        let user_id = cart.identity().user_id().cloned();
        let namespace = cart.namespace();
        let orders = build_orders(
            &base_order_id,
            &request.lines,
            &request.customer,
            user_id.as_ref(),
            request.method,
            now,
        );

        let repo = OrderRepository::new(&self.store);
        let mut doc_ids = Vec::with_capacity(orders.len());
        for order in &orders {
            match repo.create(order).await {
                Ok(id) => doc_ids.push(id),
                Err(e) => {
                    error!(order_id = %order.order_id, written = doc_ids.len(), error = %e, "Order write failed");
                    return Err(CheckoutError::Persistence(e));
                }
            }
        }
        self.advance(CheckoutPhase::OrderPersisted)?;
        debug!(%base_order_id, orders = doc_ids.len(), "Orders written");

        self.take_stock(&request.lines, &doc_ids).await?;

        let purchase = Purchase {
            base_order_id: &base_order_id,
            lines: &request.lines,
            customer: &request.customer,
            user_id: user_id.as_ref(),
            namespace: &namespace,
        };

        if !request.method.is_online() {
            self.finalize(&purchase, cart).await?;
            self.advance(CheckoutPhase::Complete)?;
            info!(%base_order_id, orders = orders.len(), "Order placed");
            return Ok(CheckoutOutcome::Completed {
                order_ids: orders.into_iter().map(|o| o.order_id).collect(),
                base_order_id,
            });
        }

        let total = CartSummary::of(&request.lines).total_price;
        let redirect = self
            .gateway
            .create_payment(request.method, &base_order_id, whole_units(total))
            .await
            .map_err(ProviderError::from)?;
        let Some(url) = redirect.url else {
            return Err(ProviderError::NoRedirectUrl(request.method).into());
        };

        let session = PaymentSession {
            method: request.method,
            base_order_id: base_order_id.clone(),
            provider_ref: redirect.session_id,
            cart_snapshot: request.lines,
            cart_namespace: namespace,
            customer: request.customer,
            user_id,
            order_doc_ids: doc_ids,
            total,
            created_at: now,
        };
        SessionStore::new(cart.storage()).save(&session)?;
        self.advance(CheckoutPhase::AwaitingRedirect)?;
        info!(%base_order_id, "Redirecting to payment provider");

        Ok(CheckoutOutcome::Redirect { base_order_id, url })
    }

    async fn run_resume<S: LocalStorage>(
        &mut self,
        params: Option<ReturnParams>,
        cart: &mut CartStore<S>,
    ) -> Result<ResumeOutcome, CheckoutError> {
        let sessions = SessionStore::new(cart.storage());
        let session = sessions.load()?;

        match (session, params) {
            (None, None) => Ok(ResumeOutcome::NotApplicable),
            (None, Some(params)) => {
                let handled = sessions
                    .last_finalized()?
                    .is_some_and(|m| m.matches(params.order_id(), params.session_id()));
                if handled {
                    info!("Return URL already handled");
                    Ok(ResumeOutcome::AlreadyHandled)
                } else {
                    warn!("Return URL has no matching payment session");
                    Ok(ResumeOutcome::NotApplicable)
                }
            }
            (Some(session), None) => self.poll(session, cart).await,
            (Some(session), Some(params)) => {
                let paid = self.confirm(&session, &params).await?;
                self.settle(session, paid, cart).await
            }
        }
    }

    /// Ask the provider about a session when the URL carried nothing.
    async fn poll<S: LocalStorage>(
        &mut self,
        session: PaymentSession,
        cart: &mut CartStore<S>,
    ) -> Result<ResumeOutcome, CheckoutError> {
        if let (PaymentMethod::Stripe, Some(session_id)) = (session.method, session.provider_ref.as_deref()) {
            let paid = self
                .gateway
                .payment_status(session_id)
                .await
                .map_err(ProviderError::from)?;
            if paid {
                return self.settle(session, Ok(()), cart).await;
            }
        }
        debug!(base_order_id = %session.base_order_id, "Payment still outstanding");
        Ok(ResumeOutcome::AwaitingProvider {
            base_order_id: session.base_order_id,
        })
    }

    /// Check that `params` belong to `session` and read the payment result.
    async fn confirm(
        &self,
        session: &PaymentSession,
        params: &ReturnParams,
    ) -> Result<Result<(), PaymentFailure>, CheckoutError> {
        match params {
            ReturnParams::Stripe { session_id } => {
                if session.provider_ref.as_deref() != Some(session_id.as_str()) {
                    return Err(ProviderError::OrderMismatch {
                        expected: session.reference().to_owned(),
                        got: session_id.clone(),
                    }
                    .into());
                }
                let paid = self
                    .gateway
                    .payment_status(session_id)
                    .await
                    .map_err(ProviderError::from)?;
                Ok(if paid { Ok(()) } else { Err(PaymentFailure::Unpaid) })
            }
            ReturnParams::Callback {
                result_code,
                order_id,
            } => {
                if *order_id != session.base_order_id {
                    return Err(ProviderError::OrderMismatch {
                        expected: session.base_order_id.clone(),
                        got: order_id.clone(),
                    }
                    .into());
                }
                Ok(match PaymentResult::from_code(result_code) {
                    PaymentResult::Paid => Ok(()),
                    PaymentResult::Cancelled => Err(PaymentFailure::Cancelled),
                    PaymentResult::Declined(code) => Err(PaymentFailure::Declined(code)),
                })
            }
        }
    }

    /// Consume `session` and apply the payment result.
    async fn settle<S: LocalStorage>(
        &mut self,
        session: PaymentSession,
        paid: Result<(), PaymentFailure>,
        cart: &mut CartStore<S>,
    ) -> Result<ResumeOutcome, CheckoutError> {
        if self.phase.is_terminal() {
            self.phase = CheckoutPhase::Idle;
        }
        self.advance(CheckoutPhase::Resumed)?;
        SessionStore::new(cart.storage()).consume(&session)?;

        let base_order_id = session.base_order_id.clone();
        match paid {
            Ok(()) => {
                let purchase = Purchase::of_session(&session);
                self.finalize(&purchase, cart).await?;
                self.advance(CheckoutPhase::Complete)?;
                info!(%base_order_id, method = %session.method, "Payment confirmed");
                Ok(ResumeOutcome::Completed {
                    order_ids: purchase.order_ids(),
                    base_order_id,
                })
            }
            Err(reason) => {
                self.advance(CheckoutPhase::Failed)?;
                info!(%base_order_id, ?reason, "Payment not completed, orders stay pending");
                Ok(ResumeOutcome::Failed {
                    base_order_id,
                    reason,
                })
            }
        }
    }

    /// Decrement stock for every line. On a conflict, put back what this
    /// attempt took and cancel its orders.
    async fn take_stock(&self, lines: &[CartLine], doc_ids: &[DocumentId]) -> Result<(), CheckoutError> {
        let products = ProductRepository::new(&self.store);
        let mut taken: Vec<&CartLine> = Vec::with_capacity(lines.len());

        for line in lines {
            match products
                .decrement_stock(&line.product.id, &line.selected_size, line.quantity)
                .await
            {
                Ok(_) => taken.push(line),
                Err(StockError::Repository(e)) => {
                    error!(product_id = %line.product.id, error = %e, "Stock write failed");
                    return Err(CheckoutError::Persistence(e));
                }
                Err(e) => {
                    warn!(product_id = %line.product.id, error = %e, "Stock conflict, rolling back attempt");
                    self.compensate(&taken, doc_ids).await;
                    return Err(CheckoutError::StockConflict {
                        product: line.product.id.clone(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }

    async fn compensate(&self, taken: &[&CartLine], doc_ids: &[DocumentId]) {
        let products = ProductRepository::new(&self.store);
        for line in taken.iter().rev() {
            if let Err(e) = products
                .restore_stock(&line.product.id, &line.selected_size, line.quantity)
                .await
            {
                error!(product_id = %line.product.id, error = %e, "Could not restore stock");
            }
        }

        let orders = OrderRepository::new(&self.store);
        for id in doc_ids {
            if let Err(e) = orders.set_status(id, OrderStatus::Cancel).await {
                error!(doc_id = %id, error = %e, "Could not cancel order");
            }
        }
    }

    /// Request the confirmation mail and drop the purchased lines.
    async fn finalize<S: LocalStorage>(
        &self,
        purchase: &Purchase<'_>,
        cart: &mut CartStore<S>,
    ) -> Result<(), CheckoutError> {
        self.send_confirmation(purchase).await;

        let keys: Vec<LineKey> = purchase.lines.iter().map(|l| l.line_key.clone()).collect();
        if cart.namespace() == purchase.namespace {
            cart.remove_lines(&keys)?;
        } else {
            // The shopper switched identity while away; clean the cart the
            // lines came from without loading it.
            let storage = cart.storage();
            let stored: Vec<CartLine> = storage.get_json(purchase.namespace)?.unwrap_or_default();
            let remaining: Vec<CartLine> = stored
                .into_iter()
                .filter(|l| !keys.contains(&l.line_key))
                .collect();
            storage.set_json(purchase.namespace, &remaining)?;
        }
        Ok(())
    }

    /// Failures here are logged and never fail the checkout.
    async fn send_confirmation(&self, purchase: &Purchase<'_>) {
        let Some(user_id) = purchase.user_id else {
            debug!("Guest checkout, no confirmation mail");
            return;
        };

        let email = match UserRepository::new(&self.store).get_email(user_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                debug!(user_id = %user_id, "No email on profile, skipping confirmation");
                return;
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not read profile email");
                return;
            }
        };

        let confirmation = OrderConfirmation {
            email: email.into_inner(),
            customer_name: purchase.customer.name.clone(),
            order_id: purchase.base_order_id.to_owned(),
            items: purchase.lines.iter().map(OrderItem::from_line).collect(),
            total: CartSummary::of(purchase.lines).total_price,
            address: purchase.customer.address.clone(),
            phone: purchase.customer.phone.clone(),
        };
        if let Err(e) = self.gateway.send_order_email(&confirmation).await {
            warn!(order_id = %purchase.base_order_id, error = %e, "Confirmation mail failed");
        }
    }

    fn advance(&mut self, next: CheckoutPhase) -> Result<(), CheckoutError> {
        if !self.phase.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, "Checkout phase");
        self.phase = next;
        Ok(())
    }
}

fn validate(request: &CheckoutRequest) -> Result<(), ValidationError> {
    if request.lines.iter().all(|l| l.quantity == 0) {
        return Err(ValidationError::NothingSelected);
    }
    let missing = request.customer.missing_fields();
    if !missing.is_empty() {
        return Err(ValidationError::MissingCustomerFields(missing));
    }
    Ok(())
}
