use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use vendo_catalog::inventory::InventoryManager;
use vendo_catalog::{Product, Vendor};
use vendo_core::carrier::CarrierAdapter;
use vendo_core::wallet::{WalletError, WalletLedger};
use vendo_order::ledger::{
    CouponApplication, CreateOrderRequest, LedgerConfig, LedgerError, MockPaymentAdapter,
    OrderLedger,
};
use vendo_order::models::{DeliveryType, OrderStatus, PaymentMethod, PaymentStatus, ShipmentStatus};
use vendo_order::rates::{RateAggregator, FALLBACK_STANDARD_PRICE};
use vendo_order::repository::OrderRepository;
use vendo_order::shipping::{MockCarrierAdapter, ShipmentOrchestrator};
use vendo_order::CartLine;
use vendo_shared::Address;
use vendo_store::{
    MemoryCartStore, MemoryCouponStore, MemoryOrderRepository, MemoryWalletLedger,
};

struct Harness {
    ledger: OrderLedger,
    orders: Arc<MemoryOrderRepository>,
    wallet: Arc<MemoryWalletLedger>,
    coupons: Arc<MemoryCouponStore>,
    carts: Arc<MemoryCartStore>,
    vendor: Vendor,
    product: Product,
}

fn harness(carrier: MockCarrierAdapter) -> Harness {
    let vendor = Vendor {
        id: Uuid::new_v4(),
        name: "alpha".to_string(),
        email: "alpha@vendors.example.com".to_string(),
        phone: "+2348000000000".to_string(),
        address: Address {
            line1: "1 Depot Way".to_string(),
            city: "Lagos".to_string(),
            country: "NG".to_string(),
            ..Default::default()
        },
    };
    let product = Product {
        id: Uuid::new_v4(),
        vendor_id: vendor.id,
        name: "Kettle".to_string(),
        image_url: None,
        product_type: None,
        price: 5000,
        weight: Some(1.2),
        stock: 10,
        sales_count: 0,
        is_active: true,
    };
    let mut inventory = InventoryManager::new();
    inventory.upsert(product.clone());

    let carrier: Arc<dyn CarrierAdapter> = Arc::new(carrier);
    let orders = Arc::new(MemoryOrderRepository::new());
    let wallet = Arc::new(MemoryWalletLedger::new());
    let coupons = Arc::new(MemoryCouponStore::new());
    let carts = Arc::new(MemoryCartStore::new());

    let ledger = OrderLedger::new(
        orders.clone(),
        wallet.clone(),
        Arc::new(MockPaymentAdapter),
        Arc::new(RwLock::new(inventory)),
        coupons.clone(),
        carts.clone(),
        Arc::new(RateAggregator::new(
            Arc::clone(&carrier),
            Duration::from_secs(2),
        )),
        Arc::new(ShipmentOrchestrator::new(carrier, Duration::from_secs(2))),
        LedgerConfig {
            tax_bps: 0,
            currency: "NGN".to_string(),
            callback_url: "https://shop.example.com/payment/callback".to_string(),
        },
    );

    Harness {
        ledger,
        orders,
        wallet,
        coupons,
        carts,
        vendor,
        product,
    }
}

impl Harness {
    fn request(
        &self,
        payment_method: PaymentMethod,
        quantity: u32,
        coupon: Option<CouponApplication>,
    ) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: "user-1".to_string(),
            email: "buyer@example.com".to_string(),
            lines: vec![CartLine {
                product: self.product.clone(),
                vendor: self.vendor.clone(),
                quantity,
            }],
            delivery_type: DeliveryType::Standard,
            shipping_address: Address {
                name: "Buyer".to_string(),
                line1: "7 Harbour St".to_string(),
                city: "Accra".to_string(),
                country: "GH".to_string(),
                ..Default::default()
            },
            payment_method,
            coupon,
        }
    }
}

#[tokio::test]
async fn test_wallet_checkout_debits_total_and_confirms() {
    // Carrier down: shipping falls back to the static standard price
    // and shipments stay pending, but payment still settles.
    let h = harness(MockCarrierAdapter::failing());
    h.wallet.seed_balance("user-1", 20_000).await;

    let outcome = h
        .ledger
        .create_order(h.request(PaymentMethod::Wallet, 2, None))
        .await
        .unwrap();
    let order = outcome.order;

    assert_eq!(order.subtotal, 10_000);
    assert_eq!(order.shipping_cost, FALLBACK_STANDARD_PRICE);
    assert_eq!(order.total, 12_500);
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert!(order.money_invariant_holds());

    assert_eq!(h.wallet.balance("user-1").await.unwrap(), 7500);
    assert_eq!(order.vendor_shipments.len(), 1);
    assert_eq!(order.vendor_shipments[0].status, ShipmentStatus::Pending);
    assert!(h.carts.was_cleared("user-1").await);
}

#[tokio::test]
async fn test_client_supplied_price_and_name_ignored() {
    let h = harness(MockCarrierAdapter::failing());
    h.wallet.seed_balance("user-1", 20_000).await;

    // A tampered cart line claims the kettle costs one unit
    let mut req = h.request(PaymentMethod::Wallet, 2, None);
    req.lines[0].product.price = 1;
    req.lines[0].product.name = "Free Kettle".to_string();

    let outcome = h.ledger.create_order(req).await.unwrap();

    // Charged at the catalog price, snapshotted under the catalog name
    assert_eq!(outcome.order.items[0].unit_price, 5000);
    assert_eq!(outcome.order.items[0].name, "Kettle");
    assert_eq!(outcome.order.subtotal, 10_000);
    assert_eq!(h.wallet.balance("user-1").await.unwrap(), 7500);
}

#[tokio::test]
async fn test_wallet_insufficient_funds_leaves_failed_order() {
    let h = harness(MockCarrierAdapter::failing());
    h.wallet.seed_balance("user-1", 100).await;

    let result = h
        .ledger
        .create_order(h.request(PaymentMethod::Wallet, 1, None))
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::Wallet(WalletError::InsufficientBalance { .. }))
    ));

    // The failed order survives for audit; it is never resurrected.
    let persisted = h.orders.list_for_user("user-1").await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].status, OrderStatus::Failed);
    assert_eq!(persisted[0].payment_status, PaymentStatus::Failed);
}

#[tokio::test]
async fn test_gateway_checkout_returns_authorization_url() {
    let h = harness(MockCarrierAdapter::new());
    let outcome = h
        .ledger
        .create_order(h.request(PaymentMethod::Gateway, 1, None))
        .await
        .unwrap();

    let url = outcome.authorization_url.unwrap();
    assert!(url.contains(&outcome.order.order_number));
    assert_eq!(outcome.order.payment_status, PaymentStatus::Pending);
    assert_eq!(outcome.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_verify_payment_confirms_and_creates_shipments() {
    let h = harness(MockCarrierAdapter::new());
    let outcome = h
        .ledger
        .create_order(h.request(PaymentMethod::Gateway, 1, None))
        .await
        .unwrap();

    let order = h
        .ledger
        .verify_payment(&outcome.order.order_number)
        .await
        .unwrap();

    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.vendor_shipments[0].status, ShipmentStatus::Created);
    assert!(order.vendor_shipments[0].tracking_number.is_some());

    // Second verification is a no-op on an already-completed order
    let again = h.ledger.verify_payment(&order.order_number).await.unwrap();
    assert_eq!(again.payment_status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_cash_on_delivery_confirms_with_pending_payment() {
    let h = harness(MockCarrierAdapter::new());
    let outcome = h
        .ledger
        .create_order(h.request(PaymentMethod::CashOnDelivery, 1, None))
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Confirmed);
    assert_eq!(outcome.order.payment_status, PaymentStatus::Pending);
    assert!(outcome.authorization_url.is_none());
}

#[tokio::test]
async fn test_empty_cart_rejected() {
    let h = harness(MockCarrierAdapter::new());
    let mut req = h.request(PaymentMethod::Wallet, 1, None);
    req.lines.clear();
    let result = h.ledger.create_order(req).await;
    assert!(matches!(result, Err(LedgerError::EmptyCart)));
    assert!(h.orders.list_for_user("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_coupon_recorded_and_discount_capped() {
    let h = harness(MockCarrierAdapter::new());
    h.wallet.seed_balance("user-1", 50_000).await;

    let coupon = CouponApplication {
        code: "WELCOME".to_string(),
        discount: 99_000,
    };
    let outcome = h
        .ledger
        .create_order(h.request(PaymentMethod::Wallet, 1, Some(coupon)))
        .await
        .unwrap();

    // Discount never exceeds the subtotal
    assert_eq!(outcome.order.discount, outcome.order.subtotal);
    assert!(outcome.order.money_invariant_holds());
    assert_eq!(h.coupons.usage_count("WELCOME").await, 1);
}

#[tokio::test]
async fn test_pickup_has_no_shipping_cost_or_shipments() {
    let h = harness(MockCarrierAdapter::new());
    h.wallet.seed_balance("user-1", 20_000).await;

    let mut req = h.request(PaymentMethod::Wallet, 1, None);
    req.delivery_type = DeliveryType::Pickup;
    let outcome = h.ledger.create_order(req).await.unwrap();

    assert_eq!(outcome.order.shipping_cost, 0);
    assert!(outcome.order.vendor_shipments.is_empty());
    assert_eq!(outcome.order.total, 5000);
}
