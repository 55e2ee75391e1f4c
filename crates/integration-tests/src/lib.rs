//! Integration tests for Orderdesk.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p orderdesk-integration-tests
//! ```
//!
//! The harness wires the real router, session layer and order service to the
//! in-memory store and catalog, so no database is needed. Requests go through
//! `tower::ServiceExt::oneshot`.
//!
//! # Test Categories
//!
//! - `order_api` - HTTP behavior of `/api/orders`
//! - `order_lifecycle` - Status progression across customer and fulfillment

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use axum::routing::post;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session};

use orderdesk_core::{Product, ProductId, UserId};
use orderdesk_storefront::config::OrderPolicy;
use orderdesk_storefront::db::{InMemoryCatalog, InMemoryOrderStore};
use orderdesk_storefront::middleware::{session_layer, set_current_user};
use orderdesk_storefront::models::CurrentUser;
use orderdesk_storefront::services::orders::OrderService;
use orderdesk_storefront::state::AppState;
use orderdesk_storefront::{routes, with_middleware};

/// Catalog ID of a 100.00 product with a 10% discount.
pub const SHIRT: i64 = 1;
/// Catalog ID of an undiscounted 19.99 product.
pub const TOTE: i64 = 2;

/// Router plus direct handles on its in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub service: OrderService,
    pub store: Arc<InMemoryOrderStore>,
    pub catalog: Arc<InMemoryCatalog>,
}

/// Decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(OrderPolicy::default())
    }

    /// # Panics
    ///
    /// Panics if the session layer cannot be built.
    #[must_use]
    pub fn with_policy(policy: OrderPolicy) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let catalog = Arc::new(InMemoryCatalog::with_products([
            product(SHIRT, "Linen Shirt", Decimal::new(10000, 2), Some(Decimal::TEN)),
            product(TOTE, "Canvas Tote", Decimal::new(1999, 2), None),
        ]));
        let service = OrderService::new(store.clone(), catalog.clone(), policy);

        let secret = SecretString::from("Zk3q9Vb2Lr8Tn4Wx7Yc1Hs6Jd0Pf5Ma-Qe2Ru9Iv3Ot8Ug1Ny4Bw7Ek6Cl0Dz5Gx");
        let sessions = session_layer(MemoryStore::default(), &secret, false)
            .expect("test session secret is valid");

        let router = with_middleware(
            routes::routes().route("/test/login/{user_id}", post(login)),
            AppState::from_service(service.clone()),
            sessions,
        );

        Self {
            router,
            service,
            store,
            catalog,
        }
    }

    /// Sign in as `user_id` and return the session cookie to send back.
    ///
    /// # Panics
    ///
    /// Panics if the login route does not set a cookie.
    pub async fn login(&self, user_id: i64) -> String {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::post(format!("/test/login/{user_id}"))
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("router is infallible");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("login sets a session cookie")
            .to_owned()
    }

    /// Send a request, optionally with a session cookie and a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.send_request(request).await
    }

    /// Send a prepared request.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

async fn login(session: Session, Path(user_id): Path<i64>) -> StatusCode {
    match set_current_user(&session, &CurrentUser::new(UserId::new(user_id))).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A catalog product with one image.
#[must_use]
pub fn product(id: i64, name: &str, price: Decimal, discount: Option<Decimal>) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        price,
        discount_percent: discount,
        images: vec![format!("https://cdn.example.com/{id}.jpg")],
    }
}

/// A complete shipping/billing address as JSON.
#[must_use]
pub fn address_json() -> Value {
    serde_json::json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "address1": "1 Main St",
        "city": "Springfield",
        "province": "IL",
        "zip": "62701",
        "country": "US"
    })
}

/// A create-order body for `items` of `(product_id, quantity)`.
#[must_use]
pub fn order_json(items: &[(i64, i64)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(id, qty)| serde_json::json!({ "product_id": id, "quantity": qty }))
        .collect();

    serde_json::json!({
        "cart": {
            "items": items,
            "shipping": "5.00",
            "tax": "8.40"
        },
        "shipping_address": address_json(),
        "billing_address": address_json(),
        "payment_method": "credit_card"
    })
}
