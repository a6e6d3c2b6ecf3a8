use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use storefront::api::{self, CART_SESSION_HEADER};
use storefront::config::BootstrapAdmin;
use storefront::notify::Notifier;
use storefront::seed;
use storefront::services::{CheckoutSettings, Services, SessionTokens};
use storefront::store::MemoryStore;

const ADMIN_EMAIL: &str = "root@shop.test";
const ADMIN_PASSWORD: &str = "bootstrap-secret";
const ADMIN_NEW_PASSWORD: &str = "rotated-admin-secret";

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let services = Services::new(Arc::new(MemoryStore::new()), Notifier::log_only(), CheckoutSettings::default(), 5, SessionTokens::ephemeral(chrono::Duration::hours(1)));
        seed::seed_demo_data(&services).await.unwrap();
        seed::bootstrap_admin(&services, &BootstrapAdmin { email: ADMIN_EMAIL.into(), password: ADMIN_PASSWORD.into() }).await.unwrap();
        Self { router: api::router(services) }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, cart: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        if let Some(cart) = cart {
            request = request.header(CART_SESSION_HEADER, cart);
        }
        let request = match body {
            Some(body) => request.header("content-type", "application/json").body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None, None).await
    }

    async fn register_and_login(&self, email: &str) -> String {
        let (status, _) = self.send(Method::POST, "/api/v1/auth/register", None, None, Some(json!({"name": "Shopper", "email": email, "password": "hunter22!"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        self.login(email, "hunter22!").await
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self.send(Method::POST, "/api/v1/auth/login", None, None, Some(json!({"email": email, "password": password}))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Signs in as the bootstrap admin and clears the forced password change.
    async fn admin(&self) -> String {
        let first = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let change = json!({"current_password": ADMIN_PASSWORD, "new_password": ADMIN_NEW_PASSWORD});
        let (status, body) = self.send(Method::PUT, "/api/v1/auth/password", Some(&first), None, Some(change)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn product(&self, name: &str) -> Value {
        let (_, products) = self.get(&format!("/api/v1/products?search={}", name.replace(' ', "%20")), None).await;
        products[0].clone()
    }

    /// Puts `qty` of `name` in the caller's cart and checks out to an inline address.
    async fn buy(&self, token: Option<&str>, cart: Option<&str>, name: &str, qty: u32, coupon: Option<&str>) -> (StatusCode, Value) {
        let product = self.product(name).await;
        let (status, _) = self.send(Method::POST, "/api/v1/cart/items", token, cart, Some(json!({"product_id": product["id"], "quantity": qty}))).await;
        assert_eq!(status, StatusCode::OK);
        self.send(Method::POST, "/api/v1/checkout", token, cart, Some(json!({"address": address(), "coupon": coupon}))).await
    }
}

fn address() -> Value {
    json!({
        "full_name": "Grace Hopper", "email": "grace@example.com", "phone": "+1 555 0100",
        "street": "1 Navy Yard", "city": "Arlington", "state": "VA", "postal_code": "22202", "country": "US"
    })
}

#[tokio::test]
async fn health() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn catalog_is_browsable_and_filterable() {
    let app = TestApp::new().await;
    let (status, all) = app.get("/api/v1/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 8);

    let (_, kitchen) = app.get("/api/v1/products?category=kitchen&in_stock=true", None).await;
    let names: Vec<&str> = kitchen.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Ceramic Pour-Over"]);

    let (status, _) = app.get(&format!("/api/v1/products/{}", uuid::Uuid::now_v7()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guest_checkout_with_coupon() {
    let app = TestApp::new().await;
    let cart = Some("guest-tab-1");
    let product = app.product("Canvas Tote").await;
    app.send(Method::POST, "/api/v1/cart/items", None, cart, Some(json!({"product_id": product["id"], "quantity": 2}))).await;
    let (status, view) = app.send(Method::POST, "/api/v1/cart/items", None, cart, Some(json!({"product_id": product["id"], "quantity": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["lines"].as_array().unwrap().len(), 1);
    assert_eq!(view["item_count"], 5);

    let (status, quote) = app.send(Method::POST, "/api/v1/checkout/quote", None, cart, Some(json!({"coupon": "love"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["subtotal"]["amount"], "175.00");
    assert_eq!(quote["discount"]["amount"], "17.50");
    assert_eq!(quote["total"]["amount"], "157.50");

    let (status, order) = app.send(Method::POST, "/api/v1/checkout", None, cart, Some(json!({"address": address(), "coupon": "LOVE"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["owner"], "guest");
    assert_eq!(order["coupon"], "LOVE");

    let (_, view) = app.send(Method::GET, "/api/v1/cart", None, cart, None).await;
    assert_eq!(view["item_count"], 0);
    let (_, tote) = app.get(&format!("/api/v1/products/{}", product["id"].as_str().unwrap()), None).await;
    assert_eq!(tote["stock"], 35);
}

#[tokio::test]
async fn guest_cart_needs_a_session_key() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/v1/cart", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_cart_session");
}

#[tokio::test]
async fn checkout_rejects_empty_cart_and_bad_coupon() {
    let app = TestApp::new().await;
    let cart = Some("guest-tab-2");
    let (status, _) = app.send(Method::POST, "/api/v1/checkout", None, cart, Some(json!({"address": address()}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app.buy(None, cart, "Notebook Set", 1, Some("NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "coupon_not_found");
}

#[tokio::test]
async fn overselling_is_refused() {
    let app = TestApp::new().await;
    let (status, body) = app.buy(None, Some("guest-tab-3"), "Merino Beanie", 4, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
}

#[tokio::test]
async fn registration_and_login_failures() {
    let app = TestApp::new().await;
    app.register_and_login("ada@example.com").await;

    let (status, body) = app.send(Method::POST, "/api/v1/auth/register", None, None, Some(json!({"name": "Again", "email": "ADA@example.com", "password": "whatever123"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_exists");

    let (status, body) = app.send(Method::POST, "/api/v1/auth/login", None, None, Some(json!({"email": "ada@example.com", "password": "wrong-password"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("token").is_none());
    assert!(body.get("user").is_none());

    let (status, _) = app.send(Method::POST, "/api/v1/auth/register", None, None, Some(json!({"name": "Short", "email": "s@example.com", "password": "short"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let token = app.register_and_login("bo@example.com").await;
    assert_eq!(app.get("/api/v1/account", Some(&token)).await.0, StatusCode::OK);
    assert_eq!(app.send(Method::POST, "/api/v1/auth/logout", Some(&token), None, None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/api/v1/account", Some(&token)).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn changing_the_password_signs_out_older_tokens() {
    let app = TestApp::new().await;
    let old = app.register_and_login("ev@example.com").await;
    let change = json!({"current_password": "hunter22!", "new_password": "correct-horse-9"});
    let (status, body) = app.send(Method::PUT, "/api/v1/auth/password", Some(&old), None, Some(change)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let fresh = body["token"].as_str().unwrap();
    assert!(body["expires_at"].is_string());

    assert_eq!(app.get("/api/v1/account", Some(&old)).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/api/v1/account", Some(fresh)).await.0, StatusCode::OK);
    assert_eq!(app.get("/api/v1/account", Some("not-a-token")).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bootstrap_admin_must_change_password_first() {
    let app = TestApp::new().await;
    let forced = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let coupon = json!({
        "code": "SPRING",
        "discount": {"type": "percentage", "value": "0.15"},
        "starts_at": "2024-01-01T00:00:00Z",
        "ends_at": "2099-01-01T00:00:00Z"
    });

    let (status, body) = app.send(Method::POST, "/api/v1/admin/coupons", Some(&forced), None, Some(coupon.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "password_change_required");
    let (status, body) = app.get("/api/v1/cart", Some(&forced)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "password_change_required");
    let (status, profile) = app.get("/api/v1/account", Some(&forced)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["must_change_password"], true);

    let admin = app.admin().await;
    assert_eq!(app.get("/api/v1/account", Some(&forced)).await.0, StatusCode::UNAUTHORIZED);
    let (status, body) = app.send(Method::POST, "/api/v1/admin/coupons", Some(&admin), None, Some(coupon)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["code"], "SPRING");
}

#[tokio::test]
async fn order_lifecycle_and_cancellation_rules() {
    let app = TestApp::new().await;
    let buyer = app.register_and_login("cy@example.com").await;
    let stranger = app.register_and_login("di@example.com").await;
    let admin = app.admin().await;

    let (status, order) = app.buy(Some(&buyer), None, "Beeswax Candle", 2, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = order["id"].as_str().unwrap().to_string();

    let (_, mine) = app.get("/api/v1/orders", Some(&buyer)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(app.get(&format!("/api/v1/orders/{id}"), Some(&stranger)).await.0, StatusCode::FORBIDDEN);

    let cancel = format!("/api/v1/orders/{id}/cancel");
    assert_eq!(app.send(Method::POST, &cancel, Some(&stranger), None, None).await.0, StatusCode::FORBIDDEN);

    let status_uri = format!("/api/v1/admin/orders/{id}/status");
    for next in ["confirmed", "shipped"] {
        let (status, body) = app.send(Method::PUT, &status_uri, Some(&admin), None, Some(json!({"status": next}))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], next);
    }
    let (status, body) = app.send(Method::POST, &cancel, Some(&buyer), None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    let (status, _) = app.send(Method::PUT, &status_uri, Some(&admin), None, Some(json!({"status": "pending"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn buyer_cancellation_restocks() {
    let app = TestApp::new().await;
    let buyer = app.register_and_login("ed@example.com").await;
    let (_, order) = app.buy(Some(&buyer), None, "Wool Throw", 5, None).await;
    let product = app.product("Wool Throw").await;
    assert_eq!(product["stock"], 0);
    assert_eq!(product["in_stock"], false);

    let (status, cancelled) = app.send(Method::POST, &format!("/api/v1/orders/{}/cancel", order["id"].as_str().unwrap()), Some(&buyer), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.product("Wool Throw").await["stock"], 5);
}

#[tokio::test]
async fn saved_addresses_can_be_used_at_checkout() {
    let app = TestApp::new().await;
    let buyer = app.register_and_login("fi@example.com").await;
    let (status, saved) = app.send(Method::POST, "/api/v1/addresses", Some(&buyer), None, Some(address())).await;
    assert_eq!(status, StatusCode::CREATED);
    let address_id = saved["id"].clone();

    let product = app.product("Notebook Set").await;
    app.send(Method::POST, "/api/v1/cart/items", Some(&buyer), None, Some(json!({"product_id": product["id"]}))).await;
    let (status, order) = app.send(Method::POST, "/api/v1/checkout", Some(&buyer), None, Some(json!({"address_id": address_id}))).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");

    let mut edited = address();
    edited["city"] = json!("Baltimore");
    let (status, _) = app.send(Method::PUT, &format!("/api/v1/addresses/{}", address_id.as_str().unwrap()), Some(&buyer), None, Some(edited)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, stored) = app.get(&format!("/api/v1/orders/{}", order["id"].as_str().unwrap()), Some(&buyer)).await;
    assert_eq!(stored["shipping_address"]["city"], "Arlington");
}

#[tokio::test]
async fn admin_routes_are_gated() {
    let app = TestApp::new().await;
    let customer = app.register_and_login("gu@example.com").await;
    let admin = app.admin().await;

    assert_eq!(app.get("/api/v1/admin/dashboard", None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/api/v1/admin/dashboard", Some(&customer)).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/api/v1/admin/orders", Some(&customer)).await.0, StatusCode::FORBIDDEN);

    app.buy(Some(&customer), None, "Linen Shirt", 1, None).await;
    let (status, dashboard) = app.get("/api/v1/admin/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["degraded"], false);
    assert_eq!(dashboard["order_count"], 1);
    assert_eq!(dashboard["status_counts"]["pending"], 1);
    assert_eq!(dashboard["revenue"]["amount"], "49.00");
    let low: Vec<&str> = dashboard["low_stock"].as_array().unwrap().iter().map(|a| a["name"].as_str().unwrap()).collect();
    assert_eq!(low, ["Cast Iron Skillet", "Merino Beanie", "Wool Throw"]);
}

#[tokio::test]
async fn admin_stock_update_keeps_availability_in_sync() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let beanie = app.product("Merino Beanie").await;
    let uri = format!("/api/v1/admin/products/{}/stock/remove", beanie["id"].as_str().unwrap());

    let (status, product) = app.send(Method::POST, &uri, Some(&admin), None, Some(json!({"quantity": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"], 0);
    assert_eq!(product["in_stock"], false);

    let (status, _) = app.send(Method::POST, &uri, Some(&admin), None, Some(json!({"quantity": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
