use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use opensase_marketplace::auth::{Identity, Role, TokenKeys};
use opensase_marketplace::domain::aggregates::Product;
use opensase_marketplace::http::{router, AppState};
use opensase_marketplace::notifications::LogNotifier;
use opensase_marketplace::payments::{sign, GatewayError, GatewayOrder, PaymentGateway};
use opensase_marketplace::services::{AddressService, CartService, CatalogService, OrderService, PaymentService};
use opensase_marketplace::store::MemoryStore;

const PAYMENT_SECRET: &str = "rzp_test_secret";

struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder { id: "order_G1".into(), amount, currency: currency.into(), receipt: receipt.into() })
    }
}

struct Harness {
    app: Router,
    keys: Arc<TokenKeys>,
}

impl Harness {
    async fn new() -> Self {
        let product: Product = serde_json::from_value(json!({
            "id": "P", "name": "Basmati Rice", "price": 100, "category": "Groceries", "unit": "kg",
            "sellerId": "S1", "sellerName": "Green Farm", "discount": 10, "tax": 5,
            "createdAt": "2025-01-01T00:00:00Z", "updatedAt": "2025-01-01T00:00:00Z",
        }))
        .unwrap();
        let store = Arc::new(MemoryStore::new().with_products([product]).await);
        let timeout = Duration::from_secs(1);
        let keys = Arc::new(TokenKeys::from_secret(b"integration-secret"));
        let orders = OrderService::new(store.clone(), store.clone(), Arc::new(LogNotifier), timeout, true);
        let state = AppState {
            keys: keys.clone(),
            cart: CartService::new(store.clone(), store.clone(), timeout),
            payments: PaymentService::new(Arc::new(FakeGateway), PAYMENT_SECRET, "INR", timeout, orders.clone()),
            orders,
            addresses: AddressService::new(store.clone(), timeout),
            catalog: CatalogService::new(store, timeout),
        };
        Self { app: router(state), keys }
    }

    fn token(&self, who: &Identity) -> String { self.keys.issue(who, chrono::Duration::hours(1)).unwrap() }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }
}

fn checkout(method: &str) -> Value {
    json!({
        "items": [{ "itemId": "P", "name": "Basmati Rice", "price": 94.5, "quantity": 2, "sellerId": "S1" }],
        "address": { "name": "Asha", "phone": "9876543210", "address": "12 Market Road", "city": "Pune", "state": "MH", "pincode": "411001" },
        "paymentMethod": method,
        "subtotal": 189.0, "deliveryFee": 40, "taxAmount": 0, "totalAmount": 229.0,
        "specialRequests": "Ring the bell twice",
    })
}

fn timestamp(v: &Value) -> DateTime<Utc> { v.as_str().unwrap().parse().unwrap() }

#[tokio::test]
async fn test_cart_to_cod_order() {
    let h = Harness::new().await;
    let token = h.token(&Identity::new("U1"));
    let t = Some(token.as_str());

    let (status, body) = h.call(Method::POST, "/api/cart/add", t, Some(json!({"userId": "U1", "productId": "P", "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 2);

    let (_, cart) = h.call(Method::GET, "/api/cart/U1", t, None).await;
    assert_eq!(cart["totalPrice"].as_f64(), Some(189.0));
    assert_eq!(cart["cartItems"][0]["hasVAT"], false);
    assert_eq!(cart["cartItems"][0]["lineTotal"].as_f64(), Some(189.0));

    let (status, placed) = h.call(Method::POST, "/api/orders", t, Some(checkout("cod"))).await;
    assert_eq!(status, StatusCode::CREATED, "{placed}");
    assert_eq!(placed["order"]["paymentStatus"], "pending");
    assert_eq!(placed["order"]["orderStatus"], "confirmed");
    let order_id = placed["order_id"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("ORD"));

    let cleared = async {
        while h.call(Method::GET, "/api/cart/U1/count", t, None).await.1["count"] != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(1), cleared).await.expect("cart was not cleared after checkout");

    let (status, fetched) = h.call(Method::GET, &format!("/api/orders/{order_id}"), t, None).await;
    assert_eq!(status, StatusCode::OK);
    let order = &fetched["order"];
    let window = timestamp(&order["estimatedDelivery"]) - timestamp(&order["createdAt"]);
    assert_eq!(window, chrono::Duration::days(7));
    assert_eq!(order["address"]["city"], "Pune");
}

#[tokio::test]
async fn test_access_rules() {
    let h = Harness::new().await;
    let token = h.token(&Identity::new("U1"));

    let (status, body) = h.call(Method::GET, "/api/cart/U1", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = h.call(Method::GET, "/api/cart/U1", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.call(Method::GET, "/api/cart/U2", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let (status, _) = h.call(Method::GET, "/api/admin/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rejected_checkouts() {
    let h = Harness::new().await;
    let token = h.token(&Identity::new("U1"));

    let mut bad_total = checkout("cod");
    bad_total["totalAmount"] = json!(10);
    let (status, _) = h.call(Method::POST, "/api/orders", Some(&token), Some(bad_total)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_subtotal = checkout("cod");
    bad_subtotal["subtotal"] = json!(150);
    bad_subtotal["totalAmount"] = json!(190);
    let (status, body) = h.call(Method::POST, "/api/orders", Some(&token), Some(bad_subtotal)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Subtotal does not match order items");

    let (status, body) = h.call(Method::POST, "/api/orders", Some(&token), Some(checkout("card"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Valid payment method is required");
}

#[tokio::test]
async fn test_admin_lifecycle_blocks_late_cancel() {
    let h = Harness::new().await;
    let buyer = h.token(&Identity::new("U1"));
    let admin = h.token(&Identity::admin("A1"));

    let (_, placed) = h.call(Method::POST, "/api/orders", Some(&buyer), Some(checkout("cod"))).await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();
    let status_uri = format!("/api/admin/orders/{order_id}/status");

    let (status, _) = h.call(Method::PATCH, &status_uri, Some(&admin), Some(json!({"status": "shipped"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    for next in ["processing", "shipped"] {
        let (status, _) = h.call(Method::PATCH, &status_uri, Some(&admin), Some(json!({"status": next}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = h.call(Method::PATCH, &format!("/api/orders/{order_id}/cancel"), Some(&buyer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listing) = h.call(Method::GET, "/api/admin/orders?status=shipped", Some(&admin), None).await;
    assert_eq!(listing["data"]["totalOrders"], 1);
    let (_, invoice) = h.call(Method::GET, &format!("/api/admin/orders/{order_id}/invoice"), Some(&admin), None).await;
    assert_eq!(invoice["invoice"]["number"], order_id.as_str());
}

#[tokio::test]
async fn test_online_payment_settles_order() {
    let h = Harness::new().await;
    let token = h.token(&Identity::new("U1"));

    let (status, gateway) = h.call(Method::POST, "/api/payments/order", Some(&token), Some(json!({"amount": 22900}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway["currency"], "INR");
    let gateway_order_id = gateway["id"].as_str().unwrap().to_string();

    let mut body = checkout("online");
    body["razorpayOrderId"] = json!(gateway_order_id);
    let (_, placed) = h.call(Method::POST, "/api/orders", Some(&token), Some(body)).await;
    assert_eq!(placed["order"]["paymentStatus"], "pending");
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, body) = h
        .call(Method::POST, "/api/payments/verify", Some(&token), Some(json!({
            "razorpay_order_id": gateway_order_id, "razorpay_payment_id": "pay_1", "razorpay_signature": "deadbeef",
        })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid payment signature");

    let signature = sign(&gateway_order_id, "pay_1", PAYMENT_SECRET).unwrap();
    let (status, body) = h
        .call(Method::POST, "/api/payments/verify", Some(&token), Some(json!({
            "razorpay_order_id": gateway_order_id, "razorpay_payment_id": "pay_1", "razorpay_signature": signature,
        })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settledOrderId"], order_id.as_str());

    let (_, fetched) = h.call(Method::GET, &format!("/api/orders/{order_id}"), Some(&token), None).await;
    assert_eq!(fetched["order"]["paymentStatus"], "paid");
    assert_eq!(fetched["order"]["paymentId"], "pay_1");

    let (_, cancelled) = h.call(Method::PATCH, &format!("/api/orders/{order_id}/cancel"), Some(&token), None).await;
    assert_eq!(cancelled["order"]["paymentStatus"], "refunded");
}

#[tokio::test]
async fn test_address_book_limit() {
    let h = Harness::new().await;
    let token = h.token(&Identity::new("U1"));
    let address = |title: &str| json!({
        "title": title, "name": "Asha", "phone": "9876543210", "address": "12 Market Road",
        "city": "Pune", "state": "MH", "pincode": "411001",
    });
    for title in ["Home", "Work", "Parents"] {
        let (status, _) = h.call(Method::POST, "/api/addresses", Some(&token), Some(address(title))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = h.call(Method::POST, "/api/addresses", Some(&token), Some(address("Gym"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Maximum 3 addresses allowed per user");

    let (_, listing) = h.call(Method::GET, "/api/addresses", Some(&token), None).await;
    assert_eq!(listing["addresses"][0]["isDefault"], true);
}

fn listing(name: &str) -> Value {
    json!({
        "name": name, "description": "Cold pressed", "price": 240, "category": "Oils",
        "quantity": 12, "unit": "litre", "tax": 5, "hasVAT": true,
    })
}

#[tokio::test]
async fn test_seller_item_management() {
    let h = Harness::new().await;
    let seller = h.token(&Identity { role: Role::Seller, name: Some("Oil Mill".into()), ..Identity::new("S7") });
    let rival = h.token(&Identity { role: Role::Seller, ..Identity::new("S8") });
    let buyer = h.token(&Identity::new("U1"));

    let (status, body) = h.call(Method::POST, "/api/items", Some(&buyer), Some(listing("Mustard Oil"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only approved sellers and admins can add items");

    let mut blank = listing("Mustard Oil");
    blank["unit"] = json!(" ");
    let (status, body) = h.call(Method::POST, "/api/items", Some(&seller), Some(blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All required fields must be provided");

    let (status, created) = h.call(Method::POST, "/api/items", Some(&seller), Some(listing("Mustard Oil"))).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["item"]["sellerName"], "Oil Mill");
    let id = created["item"]["id"].as_str().unwrap().to_string();

    let (_, mine) = h.call(Method::GET, "/api/items/my-items", Some(&seller), None).await;
    assert_eq!(mine["totalItems"], 1);
    assert_eq!(mine["items"][0]["id"], id.as_str());

    let (status, body) = h.call(Method::PUT, &format!("/api/items/{id}"), Some(&rival), Some(listing("Taken"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Item not found or you are not authorized to update it");
    let (status, updated) = h.call(Method::PUT, &format!("/api/items/{id}"), Some(&seller), Some(listing("Kachi Ghani Oil"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["item"]["name"], "Kachi Ghani Oil");

    let (_, categories) = h.call(Method::GET, "/api/categories", None, None).await;
    assert_eq!(categories["categories"], json!(["Groceries", "Oils"]));

    let (status, _) = h.call(Method::DELETE, &format!("/api/items/{id}"), Some(&rival), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.call(Method::DELETE, &format!("/api/items/{id}"), Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.call(Method::GET, &format!("/api/items/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_item_moderation() {
    let h = Harness::new().await;
    let admin = h.token(&Identity::admin("A1"));
    let buyer = h.token(&Identity::new("U1"));

    let (status, _) = h.call(Method::GET, "/api/admin/items", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h.call(Method::PATCH, "/api/admin/items/P/status", Some(&admin), Some(json!({"isAvailable": false}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, public) = h.call(Method::GET, "/api/items", None, None).await;
    assert_eq!(public["totalItems"], 0);
    let (_, all) = h.call(Method::GET, "/api/admin/items?category=all", Some(&admin), None).await;
    assert_eq!(all["totalItems"], 1);
    assert_eq!(all["items"][0]["isAvailable"], false);

    let (status, created) = h.call(Method::POST, "/api/admin/items", Some(&admin), Some(listing("Groundnut Oil"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Product added successfully by admin!");

    let (status, edited) = h.call(Method::PUT, "/api/admin/items/P", Some(&admin), Some(listing("Sona Masoori Rice"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["item"]["sellerId"], "S1");

    let (status, _) = h.call(Method::DELETE, "/api/admin/items/P", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = h.call(Method::DELETE, "/api/admin/items/P", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
async fn test_malformed_address_id_gets_envelope() {
    let h = Harness::new().await;
    let token = h.token(&Identity::new("U1"));
    let address = json!({
        "title": "Home", "name": "Asha", "phone": "9876543210", "address": "12 Market Road",
        "city": "Pune", "state": "MH", "pincode": "411001",
    });
    let (status, body) = h.call(Method::PUT, "/api/addresses/not-a-uuid", Some(&token), Some(address)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid address id"}));

    let (status, body) = h.call(Method::DELETE, "/api/addresses/42", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
