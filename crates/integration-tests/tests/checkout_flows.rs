//! Checkout end to end: storefront reconciler, HTTP gateway, payment server.

use std::sync::atomic::Ordering;

use rust_decimal::Decimal;
use subasa_core::{CustomerInfo, OrderStatus, PaymentMethod};
use subasa_storefront::checkout::session::{LAST_FINALIZED_KEY, PAYMENT_IN_PROGRESS_KEY};
use subasa_storefront::checkout::{CheckoutOutcome, CheckoutPhase, CheckoutRequest, PaymentFailure, ResumeOutcome};
use subasa_storefront::db::{DocumentStore, ORDERS};
use subasa_storefront::gateway::HttpPaymentGateway;
use subasa_storefront::storage::{LocalStorage, MemoryStorage};
use subasa_storefront::{CartStore, CheckoutError, CheckoutReconciler};

use subasa_integration_tests::{
    PaymentServer, RETURN_URL, order_count, product, return_url, seller_order, stock_of, store_with, user_cart,
};

// =============================================================================
// Helpers
// =============================================================================

fn request(cart: &CartStore<MemoryStorage>, method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        lines: cart.lines().to_vec(),
        customer: CustomerInfo::new("An", "0901234567", "1 Le Loi, HCM"),
        method,
    }
}

fn gateway(server: &PaymentServer) -> HttpPaymentGateway {
    HttpPaymentGateway::new(server.url.clone()).unwrap()
}

fn flag(cart: &CartStore<MemoryStorage>, key: &str) -> Option<String> {
    cart.storage().get_item(key).unwrap()
}

// =============================================================================
// Cash on delivery
// =============================================================================

#[tokio::test]
async fn test_cod_places_one_order_per_seller() {
    let server = PaymentServer::start().await;
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let p2 = product("p2", "b@y.com", 250_000, 5);
    let store = store_with(&[&p1, &p2]).await;

    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 2).unwrap();
    cart.add_to_cart(&p2, "", "", 1).unwrap();

    let mut reconciler = CheckoutReconciler::new(store.clone(), gateway(&server));
    let outcome = reconciler.submit(request(&cart, PaymentMethod::Cod), &mut cart).await.unwrap();
    let CheckoutOutcome::Completed { base_order_id, order_ids } = outcome else {
        panic!("expected a completed checkout, got {outcome:?}");
    };
    assert_eq!(order_ids.len(), 2);
    assert_eq!(order_count(&store).await, 2);

    let a = seller_order(&store, &base_order_id, "a@x.com").await.unwrap();
    assert!(a.order_id.as_str().ends_with("-a@x.com"));
    assert_eq!(a.items.len(), 1);
    assert_eq!(a.total_price, Decimal::from(200_000));
    assert_eq!(a.status, OrderStatus::Pending);

    let b = seller_order(&store, &base_order_id, "b@y.com").await.unwrap();
    assert!(b.order_id.as_str().ends_with("-b@y.com"));
    assert_eq!(b.total_price, Decimal::from(250_000));

    assert_eq!(stock_of(&store, "p1", "").await, 3);
    assert_eq!(stock_of(&store, "p2", "").await, 4);
    assert!(cart.lines().is_empty());
    assert_eq!(reconciler.phase(), CheckoutPhase::Complete);

    let mails = server.recorder.mails();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0]["email"], "an@subasa.vn");
    assert_eq!(mails[0]["orderId"], base_order_id.as_str());
}

#[tokio::test]
async fn test_partial_selection_keeps_other_lines() {
    let server = PaymentServer::start().await;
    let p1 = product("p1", "a@x.com", 100_000, 5);
    let p2 = product("p2", "b@y.com", 250_000, 5);
    let store = store_with(&[&p1, &p2]).await;

    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 1).unwrap();
    cart.add_to_cart(&p2, "", "", 1).unwrap();

    let mut req = request(&cart, PaymentMethod::Cod);
    req.lines.retain(|l| l.product.id.as_str() == "p1");

    let mut reconciler = CheckoutReconciler::new(store.clone(), gateway(&server));
    reconciler.submit(req, &mut cart).await.unwrap();

    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].product.id.as_str(), "p2");
    assert_eq!(order_count(&store).await, 1);
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let server = PaymentServer::start().await;
    let last = product("last", "a@x.com", 100_000, 1);
    let store = store_with(&[&last]).await;

    let mut cart_a = user_cart("u1");
    let mut cart_b = user_cart("u2");
    cart_a.add_to_cart(&last, "", "", 1).unwrap();
    cart_b.add_to_cart(&last, "", "", 1).unwrap();

    let mut first = CheckoutReconciler::new(store.clone(), gateway(&server));
    let mut second = CheckoutReconciler::new(store.clone(), gateway(&server));
    let req_a = request(&cart_a, PaymentMethod::Cod);
    let req_b = request(&cart_b, PaymentMethod::Cod);

    let (a, b) = tokio::join!(first.submit(req_a, &mut cart_a), second.submit(req_b, &mut cart_b));

    let (won, lost) = match (a, b) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(matches!(won, CheckoutOutcome::Completed { .. }));
    assert!(matches!(lost, CheckoutError::StockConflict { .. }));
    assert!(lost.is_retryable());
    assert_eq!(stock_of(&store, "last", "").await, 0);

    // the losing attempt's order is cancelled, not left pending
    let cancelled = store
        .list(ORDERS)
        .await
        .unwrap()
        .into_iter()
        .filter(|doc| doc.data["status"] == "cancel")
        .count();
    assert_eq!(cancelled, 1);
}

// =============================================================================
// Redirect providers
// =============================================================================

#[tokio::test]
async fn test_momo_redirect_then_resume_once() {
    let server = PaymentServer::start().await;
    let p1 = product("p1", "a@x.com", 150_000, 5);
    let store = store_with(&[&p1]).await;

    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 2).unwrap();

    let mut reconciler = CheckoutReconciler::new(store.clone(), gateway(&server));
    let outcome = reconciler.submit(request(&cart, PaymentMethod::Momo), &mut cart).await.unwrap();
    let CheckoutOutcome::Redirect { base_order_id, url } = outcome else {
        panic!("expected a redirect, got {outcome:?}");
    };
    assert_eq!(url.as_str(), format!("https://test-payment.momo.vn/pay/{base_order_id}"));
    assert_eq!(server.recorder.momo_creates.load(Ordering::SeqCst), 1);
    assert_eq!(reconciler.phase(), CheckoutPhase::AwaitingRedirect);

    // orders and stock are committed before the shopper pays
    assert_eq!(stock_of(&store, "p1", "").await, 3);
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(flag(&cart, PAYMENT_IN_PROGRESS_KEY).as_deref(), Some("true"));
    assert!(server.recorder.mails().is_empty());

    let request_id = format!("{base_order_id}_1");
    let back = return_url(&[
        ("partnerCode", "MOMO"),
        ("orderId", base_order_id.as_str()),
        ("requestId", request_id.as_str()),
        ("amount", "300000"),
        ("resultCode", "0"),
        ("message", "Successful."),
    ]);
    let resume = reconciler.resume(&back, &mut cart).await.unwrap();
    assert!(matches!(resume.outcome, ResumeOutcome::Completed { .. }));
    assert_eq!(resume.clean_url.as_str(), RETURN_URL);

    assert!(cart.lines().is_empty());
    assert_eq!(flag(&cart, PAYMENT_IN_PROGRESS_KEY), None);
    assert!(flag(&cart, LAST_FINALIZED_KEY).is_some());
    assert_eq!(server.recorder.mails().len(), 1);

    // a refresh replays the same URL
    let replay = reconciler.resume(&back, &mut cart).await.unwrap();
    assert_eq!(replay.outcome, ResumeOutcome::AlreadyHandled);
    assert_eq!(server.recorder.mails().len(), 1);
    assert_eq!(stock_of(&store, "p1", "").await, 3);
}

#[tokio::test]
async fn test_vnpay_cancel_leaves_orders_pending() {
    let server = PaymentServer::start().await;
    let p1 = product("p1", "a@x.com", 150_000, 5);
    let store = store_with(&[&p1]).await;

    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 1).unwrap();

    let mut reconciler = CheckoutReconciler::new(store.clone(), gateway(&server));
    let outcome = reconciler.submit(request(&cart, PaymentMethod::Vnpay), &mut cart).await.unwrap();
    let CheckoutOutcome::Redirect { base_order_id, url } = outcome else {
        panic!("expected a redirect, got {outcome:?}");
    };
    assert!(url.as_str().starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));
    assert!(url.query_pairs().any(|(k, v)| k == "vnp_TxnRef" && v == base_order_id.as_str()));

    let back = return_url(&[
        ("vnp_Amount", "15000000"),
        ("vnp_ResponseCode", "24"),
        ("vnp_TxnRef", base_order_id.as_str()),
        ("vnp_SecureHash", "ff"),
    ]);
    let resume = reconciler.resume(&back, &mut cart).await.unwrap();
    assert_eq!(
        resume.outcome,
        ResumeOutcome::Failed {
            base_order_id: base_order_id.clone(),
            reason: PaymentFailure::Cancelled,
        }
    );
    assert_eq!(reconciler.phase(), CheckoutPhase::Failed);

    let order = seller_order(&store, &base_order_id, "a@x.com").await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(cart.lines().len(), 1);
    assert!(server.recorder.mails().is_empty());
    assert_eq!(flag(&cart, PAYMENT_IN_PROGRESS_KEY), None);
}

#[tokio::test]
async fn test_stripe_resume_checks_session_status() {
    let server = PaymentServer::start().await;
    let p1 = product("p1", "a@x.com", 150_000, 5);
    let store = store_with(&[&p1]).await;

    let mut cart = user_cart("u1");
    cart.add_to_cart(&p1, "", "", 1).unwrap();

    let mut reconciler = CheckoutReconciler::new(store.clone(), gateway(&server));
    let outcome = reconciler.submit(request(&cart, PaymentMethod::Stripe), &mut cart).await.unwrap();
    let CheckoutOutcome::Redirect { url, .. } = outcome else {
        panic!("expected a redirect, got {outcome:?}");
    };
    assert_eq!(url.as_str(), "https://checkout.stripe.test/cs_test_1");

    // back on the plain page before Stripe settled
    let plain = return_url(&[]);
    let pending = reconciler.resume(&plain, &mut cart).await.unwrap();
    assert!(matches!(pending.outcome, ResumeOutcome::AwaitingProvider { .. }));
    assert_eq!(flag(&cart, PAYMENT_IN_PROGRESS_KEY).as_deref(), Some("true"));

    server.recorder.stripe_paid.store(true, Ordering::SeqCst);
    let back = return_url(&[("session_id", "cs_test_1")]);
    let resume = reconciler.resume(&back, &mut cart).await.unwrap();
    assert!(matches!(resume.outcome, ResumeOutcome::Completed { .. }));
    assert!(cart.lines().is_empty());
    assert_eq!(server.recorder.mails().len(), 1);
}
