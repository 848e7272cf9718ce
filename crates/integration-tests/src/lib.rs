//! Integration tests for Subasa Sports.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p subasa-integration-tests
//! ```
//!
//! Nothing external is needed: the payment server runs in-process on an
//! ephemeral port, with MoMo and Stripe replaced by local stubs, and the
//! document store is the in-memory one.
//!
//! # Test Categories
//!
//! - `cart_flows` - stock clamping, line identity, namespaces, persistence
//! - `checkout_flows` - cash on delivery and redirect checkouts end to end
//! - `payment_server_routes` - the payment server over real HTTP

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use serde_json::{Value, json};
use url::Url;

use subasa_core::{DocumentId, Order, OrderId, Product, ProductId, UserId, seller_order_id};
use subasa_payment_server::{AppState, PaymentServerConfig, app};
use subasa_storefront::CartStore;
use subasa_storefront::db::{DocumentStore, MemoryDocumentStore, OrderRepository, ProductRepository, USERS};
use subasa_storefront::identity::Identity;
use subasa_storefront::storage::MemoryStorage;

/// Shopper address used by every checkout.
pub const RETURN_URL: &str = "http://localhost:5173/checkout";

// =============================================================================
// Catalog fixtures
// =============================================================================

/// A product without sizes.
pub fn product(id: &str, owner: &str, price: u32, stock: u32) -> Product {
    serde_json::from_value(json!({
        "id": id,
        "productName": format!("Product {id}"),
        "price": price,
        "quantity": stock,
        "ownerEmail": owner,
        "status": "approved"
    }))
    .unwrap()
}

/// A product with one size bucket.
pub fn sized(id: &str, owner: &str, price: u32, size: &str, stock: u32) -> Product {
    serde_json::from_value(json!({
        "id": id,
        "productName": format!("Product {id}"),
        "price": price,
        "hasSize": true,
        "sizes": [{ "size": size, "quantity": stock }],
        "ownerEmail": owner,
        "status": "approved"
    }))
    .unwrap()
}

/// A store holding `products` and users `u1` / `u2` with profile emails.
pub async fn store_with(products: &[&Product]) -> MemoryDocumentStore {
    let store = MemoryDocumentStore::new();
    let repo = ProductRepository::new(&store);
    for product in products {
        repo.put(product).await.unwrap();
    }
    for (id, email) in [("u1", "an@subasa.vn"), ("u2", "binh@subasa.vn")] {
        store
            .set(USERS, &DocumentId::new(id), json!({ "email": email }))
            .await
            .unwrap();
    }
    store
}

/// Stock of `size` (ignored for sizeless products) as stored.
pub async fn stock_of(store: &MemoryDocumentStore, id: &str, size: &str) -> u32 {
    ProductRepository::new(store)
        .get(&ProductId::new(id))
        .await
        .unwrap()
        .unwrap()
        .available_stock(size)
}

/// The order stored for one seller of a checkout.
pub async fn seller_order(store: &MemoryDocumentStore, base_order_id: &str, seller: &str) -> Option<Order> {
    order_by_id(store, &seller_order_id(base_order_id, seller)).await
}

pub async fn order_by_id(store: &MemoryDocumentStore, order_id: &OrderId) -> Option<Order> {
    let mut found = OrderRepository::new(store).find_by_order_id(order_id).await.unwrap();
    assert!(found.len() <= 1, "duplicate order {order_id}");
    found.pop().map(|(_, order)| order)
}

/// Number of stored orders.
pub async fn order_count(store: &MemoryDocumentStore) -> usize {
    store.list(subasa_storefront::db::ORDERS).await.unwrap().len()
}

/// An empty cart for user `id` on fresh device storage.
pub fn user_cart(id: &str) -> CartStore<MemoryStorage> {
    CartStore::open(MemoryStorage::new(), Identity::User(UserId::new(id))).unwrap()
}

// =============================================================================
// Payment server
// =============================================================================

/// Serve `router` on an ephemeral port.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// What the stubbed providers and the mail route have seen.
#[derive(Default)]
pub struct Recorder {
    pub momo_creates: AtomicUsize,
    pub stripe_creates: AtomicUsize,
    /// Stripe reports every session as paid while set.
    pub stripe_paid: AtomicBool,
    pub mails: Mutex<Vec<Value>>,
}

impl Recorder {
    pub fn mails(&self) -> Vec<Value> {
        self.mails.lock().unwrap().clone()
    }
}

/// The payment server, configured for MoMo, VNPay and Stripe against
/// local stubs.
pub struct PaymentServer {
    pub url: Url,
    pub recorder: Arc<Recorder>,
}

impl PaymentServer {
    pub async fn start() -> Self {
        let recorder = Arc::new(Recorder::default());
        let momo = serve(momo_stub(Arc::clone(&recorder))).await;
        let stripe = serve(stripe_stub(Arc::clone(&recorder))).await;

        let vars = [
            ("MOMO_SECRET_KEY", "K951B6PE1waDMi640xX08PD3vg6EkVlz".to_string()),
            ("MOMO_ACCESS_KEY", "F8BBA842ECF85".to_string()),
            ("MOMO_ENDPOINT", momo.join("v2/gateway/api/create").unwrap().to_string()),
            ("VNPAY_HASH_SECRET", "SECRETKEY123".to_string()),
            ("VNPAY_TMN_CODE", "2QXUI4J4".to_string()),
            ("STRIPE_SECRET_KEY", "sk_test_123".to_string()),
            ("STRIPE_API_BASE", stripe.to_string()),
            ("CLIENT_RETURN_URL", RETURN_URL.to_string()),
        ];
        let config = PaymentServerConfig::from_lookup(|key| {
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
        })
        .unwrap();

        let router = app(AppState::new(config).unwrap())
            .layer(middleware::from_fn_with_state(Arc::clone(&recorder), record_mail));
        Self {
            url: serve(router).await,
            recorder,
        }
    }
}

async fn record_mail(State(recorder): State<Arc<Recorder>>, request: Request, next: Next) -> Response {
    if request.uri().path() != "/api/order/send-email" {
        return next.run(request).await;
    }
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    if let Ok(value) = serde_json::from_slice(&bytes) {
        recorder.mails.lock().unwrap().push(value);
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn momo_stub(recorder: Arc<Recorder>) -> Router {
    Router::new().route(
        "/v2/gateway/api/create",
        post(move |Json(body): Json<Value>| async move {
            recorder.momo_creates.fetch_add(1, Ordering::SeqCst);
            let order_id = body["orderId"].as_str().unwrap_or_default().to_owned();
            Json(json!({
                "partnerCode": "MOMO",
                "orderId": order_id,
                "payUrl": format!("https://test-payment.momo.vn/pay/{order_id}"),
                "resultCode": 0,
                "message": "Thành công."
            }))
        }),
    )
}

fn stripe_stub(recorder: Arc<Recorder>) -> Router {
    let created = Arc::clone(&recorder);
    Router::new()
        .route(
            "/v1/checkout/sessions",
            post(move || async move {
                let n = created.stripe_creates.fetch_add(1, Ordering::SeqCst) + 1;
                let id = format!("cs_test_{n}");
                Json(json!({ "id": id, "url": format!("https://checkout.stripe.test/{id}") }))
            }),
        )
        .route(
            "/v1/checkout/sessions/{id}",
            get(move |Path(id): Path<String>| async move {
                let paid = recorder.stripe_paid.load(Ordering::SeqCst);
                Json(json!({ "id": id, "payment_status": if paid { "paid" } else { "unpaid" } }))
            }),
        )
}

/// Return URL the way a provider would build it.
pub fn return_url(query: &[(&str, &str)]) -> Url {
    let mut url = Url::parse(RETURN_URL).unwrap();
    url.query_pairs_mut().extend_pairs(query);
    url
}
