use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;
use uuid::Uuid;

use vendo_api::state::{AppState, AuthConfig};
use vendo_catalog::inventory::InventoryManager;
use vendo_catalog::Product;
use vendo_core::carrier::CarrierAdapter;
use vendo_core::wallet::WalletLedger;
use vendo_order::cancel::CancellationCompensator;
use vendo_order::ledger::{LedgerConfig, MockPaymentAdapter, OrderLedger};
use vendo_order::rates::RateAggregator;
use vendo_order::reconcile::WebhookReconciler;
use vendo_order::repository::OrderRepository;
use vendo_order::shipping::{MockCarrierAdapter, ShipmentOrchestrator};
use vendo_store::{
    MemoryCartStore, MemoryCouponStore, MemoryOrderRepository, MemoryWalletLedger,
};

const SECRET: &str = "test-secret";

struct TestApp {
    state: AppState,
    wallet: Arc<MemoryWalletLedger>,
    product_id: Uuid,
    vendor_id: Uuid,
}

fn test_app(environment: &str) -> TestApp {
    let product_id = Uuid::new_v4();
    let vendor_id = Uuid::new_v4();

    let mut inventory = InventoryManager::new();
    inventory.upsert(Product {
        id: product_id,
        vendor_id,
        name: "Kettle".to_string(),
        image_url: None,
        product_type: None,
        price: 5000,
        weight: Some(1.2),
        stock: 10,
        sales_count: 0,
        is_active: true,
    });

    let carrier: Arc<dyn CarrierAdapter> = Arc::new(MockCarrierAdapter::new());
    let orders: Arc<dyn OrderRepository> = Arc::new(MemoryOrderRepository::new());
    let wallet = Arc::new(MemoryWalletLedger::new());
    let inventory = Arc::new(RwLock::new(inventory));
    let rates = Arc::new(RateAggregator::new(
        Arc::clone(&carrier),
        Duration::from_secs(2),
    ));
    let shipping = Arc::new(ShipmentOrchestrator::new(
        Arc::clone(&carrier),
        Duration::from_secs(2),
    ));

    let ledger = Arc::new(OrderLedger::new(
        Arc::clone(&orders),
        wallet.clone(),
        Arc::new(MockPaymentAdapter),
        Arc::clone(&inventory),
        Arc::new(MemoryCouponStore::new()),
        Arc::new(MemoryCartStore::new()),
        Arc::clone(&rates),
        Arc::clone(&shipping),
        LedgerConfig {
            tax_bps: 0,
            currency: "NGN".to_string(),
            callback_url: "https://shop.example.com/payment/callback".to_string(),
        },
    ));
    let reconciler = Arc::new(WebhookReconciler::new(Arc::clone(&orders)));
    let compensator = Arc::new(CancellationCompensator::new(
        Arc::clone(&orders),
        Arc::clone(&carrier),
        wallet.clone(),
        inventory,
    ));

    let state = AppState {
        orders,
        ledger,
        reconciler,
        compensator,
        rates,
        carrier,
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        environment: environment.to_string(),
    };

    TestApp {
        state,
        wallet,
        product_id,
        vendor_id,
    }
}

fn token(sub: &str, role: &str) -> String {
    let claims = json!({
        "sub": sub,
        "email": format!("{}@example.com", sub),
        "role": role,
        "permissions": Vec::<String>::new(),
        "exp": (chrono::Utc::now().timestamp() + 3600) as usize,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn order_body(app: &TestApp, payment_method: &str) -> Value {
    json!({
        "lines": [{
            "product": {
                "id": app.product_id,
                "name": "Kettle",
                "image_url": null,
                "product_type": null,
                "price": 5000,
                "weight": 1.2,
            },
            "vendor": {
                "id": app.vendor_id,
                "name": "alpha",
                "email": "alpha@vendors.example.com",
                "phone": "+2348000000000",
                "address": { "line1": "1 Depot Way", "city": "Lagos", "country": "NG" },
            },
            "quantity": 2,
        }],
        "delivery_type": "standard",
        "shipping_address": {
            "name": "Buyer",
            "line1": "7 Harbour St",
            "city": "Accra",
            "country": "GH",
        },
        "payment_method": payment_method,
        "coupon": null,
    })
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let response = vendo_api::app(app.state.clone()).oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_carrier_webhook_always_acknowledged() {
    let app = test_app("development");

    // Unknown tracking id still gets a success ack
    let body = json!({
        "order_id": "TRK-UNKNOWN",
        "status": "in_transit",
    });
    let (status, response) = send(&app, post_json("/v1/webhooks/carrier", None, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], json!(true));

    // So does garbage the carrier should never have sent
    let (status, response) = send(
        &app,
        post_json("/v1/webhooks/carrier", None, &json!({"surprise": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], json!(true));
}

#[tokio::test]
async fn test_order_endpoints_require_authentication() {
    let app = test_app("development");
    let body = order_body(&app, "wallet");

    let (status, _) = send(&app, post_json("/v1/orders", None, &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Admin tokens are not customer tokens
    let admin = token("ops-1", "ADMIN");
    let (status, _) = send(&app, post_json("/v1/orders", Some(&admin), &body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_wallet_order_end_to_end() {
    let app = test_app("development");
    app.wallet.seed_balance("user-1", 50_000).await;
    let customer = token("user-1", "CUSTOMER");

    let (status, body) = send(
        &app,
        post_json("/v1/orders", Some(&customer), &order_body(&app, "wallet")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = &body["order"];
    assert!(order["order_number"].as_str().unwrap().starts_with("VND-"));
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["subtotal"], 10_000);
    assert_eq!(order["total"], 12_500);
    assert!(body["authorization_url"].is_null());

    // Shipment created via the mock carrier
    assert_eq!(order["shipments"][0]["status"], "created");

    // Owner can read it back
    let order_id = order["id"].as_str().unwrap();
    let (status, fetched) = send(
        &app,
        get(&format!("/v1/orders/{}", order_id), Some(&customer)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], order["order_number"]);

    // Another customer cannot
    let stranger = token("user-2", "CUSTOMER");
    let (status, _) = send(
        &app,
        get(&format!("/v1/orders/{}", order_id), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_gateway_order_returns_checkout_url() {
    let app = test_app("development");
    let customer = token("user-1", "CUSTOMER");

    let (status, body) = send(
        &app,
        post_json("/v1/orders", Some(&customer), &order_body(&app, "gateway")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["authorization_url"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.mock/"));
    assert_eq!(body["order"]["payment_status"], "pending");

    // The verification landing path completes the order
    let reference = body["order"]["order_number"].as_str().unwrap();
    let (status, verified) = send(
        &app,
        get(
            &format!("/v1/payments/verify/{}", reference),
            Some(&customer),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["payment_status"], "completed");
    assert_eq!(verified["status"], "confirmed");
}

#[tokio::test]
async fn test_verify_payment_checks_ownership_before_settling() {
    let app = test_app("development");
    let customer = token("user-1", "CUSTOMER");

    let (_, body) = send(
        &app,
        post_json("/v1/orders", Some(&customer), &order_body(&app, "gateway")),
    )
    .await;
    let reference = body["order"]["order_number"].as_str().unwrap();
    let order_id = body["order"]["id"].as_str().unwrap();

    // A stranger hitting the landing path must not settle the order
    let stranger = token("user-2", "CUSTOMER");
    let (status, _) = send(
        &app,
        get(
            &format!("/v1/payments/verify/{}", reference),
            Some(&stranger),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, fetched) = send(
        &app,
        get(&format!("/v1/orders/{}", order_id), Some(&customer)),
    )
    .await;
    assert_eq!(fetched["payment_status"], "pending");
    assert_eq!(fetched["status"], "pending");
}

#[tokio::test]
async fn test_rates_endpoint_lists_delivery_options() {
    let app = test_app("development");
    let customer = token("user-1", "CUSTOMER");

    let body = json!({
        "lines": order_body(&app, "wallet")["lines"],
        "destination": { "name": "Buyer", "line1": "7 Harbour St", "city": "Accra", "country": "GH" },
        "email": "buyer@example.com",
    });
    let (status, sheet) = send(&app, post_json("/v1/rates", Some(&customer), &body)).await;
    assert_eq!(status, StatusCode::OK);

    let types: Vec<&str> = sheet["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["quote_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"pickup"));
    assert!(types.contains(&"standard"));
    assert_eq!(sheet["carrier_live"], json!(true));
}

#[tokio::test]
async fn test_cancel_order_refunds_wallet() {
    let app = test_app("development");
    app.wallet.seed_balance("user-1", 50_000).await;
    let customer = token("user-1", "CUSTOMER");

    let (_, body) = send(
        &app,
        post_json("/v1/orders", Some(&customer), &order_body(&app, "wallet")),
    )
    .await;
    let order_id = body["order"]["id"].as_str().unwrap();

    let (status, cancelled) = send(
        &app,
        post_json(
            &format!("/v1/orders/{}/cancel", order_id),
            Some(&customer),
            &json!({"reason": "changed my mind"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["payment_status"], "refunded");

    // Full amount back
    assert_eq!(app.wallet.balance("user-1").await.unwrap(), 50_000);
}

#[tokio::test]
async fn test_webhook_simulation_gated_by_environment() {
    let dev = test_app("development");
    let admin = token("ops-1", "ADMIN");
    let payload = json!({
        "order_id": "TRK-NONE",
        "status": "in_transit",
    });

    let (status, body) = send(
        &dev,
        post_json("/v1/webhooks/simulate", Some(&admin), &payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "no_match");

    let prod = test_app("production");
    let (status, _) = send(
        &prod,
        post_json("/v1/webhooks/simulate", Some(&admin), &payload),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_tracking_introspection() {
    let app = test_app("development");
    app.wallet.seed_balance("user-1", 50_000).await;
    let customer = token("user-1", "CUSTOMER");
    let admin = token("ops-1", "ADMIN");

    let (_, body) = send(
        &app,
        post_json("/v1/orders", Some(&customer), &order_body(&app, "wallet")),
    )
    .await;
    let order_id = body["order"]["id"].as_str().unwrap();

    let (status, tracking) = send(
        &app,
        get(&format!("/v1/orders/{}/tracking", order_id), Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(tracking[0]["tracking_number"]
        .as_str()
        .unwrap()
        .starts_with("TRK-"));

    // Customer tokens cannot reach admin routes
    let (status, _) = send(
        &app,
        get(&format!("/v1/orders/{}/tracking", order_id), Some(&customer)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
