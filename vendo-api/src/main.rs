use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vendo_api::clients::{HttpCarrierClient, HttpPaymentClient};
use vendo_api::state::{AppState, AuthConfig};
use vendo_api::app;
use vendo_catalog::inventory::InventoryManager;
use vendo_core::carrier::CarrierAdapter;
use vendo_core::payment::PaymentAdapter;
use vendo_core::resiliency::{CircuitBreaker, GuardedCarrier};
use vendo_order::cancel::CancellationCompensator;
use vendo_order::ledger::{LedgerConfig, MockPaymentAdapter, OrderLedger};
use vendo_order::rates::RateAggregator;
use vendo_order::reconcile::WebhookReconciler;
use vendo_order::repository::OrderRepository;
use vendo_order::shipping::{MockCarrierAdapter, ShipmentOrchestrator};
use vendo_store::{
    MemoryCartStore, MemoryCouponStore, MemoryWalletLedger, PgOrderRepository,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vendo_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = vendo_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Vendo API on port {}", config.server.port);

    let pg = PgOrderRepository::connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    pg.migrate().await.expect("Failed to run migrations");
    let orders: Arc<dyn OrderRepository> = Arc::new(pg);

    // "mock" base URLs select the in-process adapters, for local development
    // without carrier/gateway credentials.
    let raw_carrier: Arc<dyn CarrierAdapter> = if config.carrier.base_url == "mock" {
        tracing::warn!("Using mock carrier adapter");
        Arc::new(MockCarrierAdapter::new())
    } else {
        Arc::new(HttpCarrierClient::new(
            &config.carrier.base_url,
            &config.carrier.api_key,
        ))
    };
    let carrier: Arc<dyn CarrierAdapter> = Arc::new(GuardedCarrier::new(
        raw_carrier,
        CircuitBreaker::new(
            "carrier",
            config.carrier.circuit_failure_threshold,
            Duration::from_secs(config.carrier.circuit_reset_seconds),
        ),
    ));

    let gateway: Arc<dyn PaymentAdapter> = if config.payment.base_url == "mock" {
        tracing::warn!("Using mock payment adapter");
        Arc::new(MockPaymentAdapter)
    } else {
        Arc::new(HttpPaymentClient::new(
            &config.payment.base_url,
            &config.payment.secret_key,
        ))
    };

    let call_timeout = Duration::from_secs(config.carrier.timeout_seconds);
    let inventory = match &config.catalog.seed_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).expect("Failed to read catalog seed file");
            let manager =
                InventoryManager::from_seed(&raw).expect("Invalid catalog seed file");
            tracing::info!("Loaded {} products from {}", manager.len(), path);
            Arc::new(RwLock::new(manager))
        }
        None => {
            tracing::warn!("No catalog seed configured; inventory starts empty");
            Arc::new(RwLock::new(InventoryManager::new()))
        }
    };
    let wallet = Arc::new(MemoryWalletLedger::new());
    let coupons = Arc::new(MemoryCouponStore::new());
    let carts = Arc::new(MemoryCartStore::new());

    let rates = Arc::new(RateAggregator::new(Arc::clone(&carrier), call_timeout));
    let shipping = Arc::new(ShipmentOrchestrator::new(
        Arc::clone(&carrier),
        call_timeout,
    ));

    let ledger = Arc::new(OrderLedger::new(
        Arc::clone(&orders),
        wallet.clone(),
        gateway,
        Arc::clone(&inventory),
        coupons,
        carts,
        Arc::clone(&rates),
        Arc::clone(&shipping),
        LedgerConfig {
            tax_bps: config.business_rules.tax_bps,
            currency: config.business_rules.currency.clone(),
            callback_url: config.payment.callback_url.clone(),
        },
    ));
    let reconciler = Arc::new(WebhookReconciler::new(Arc::clone(&orders)));
    let compensator = Arc::new(CancellationCompensator::new(
        Arc::clone(&orders),
        Arc::clone(&carrier),
        wallet,
        inventory,
    ));

    let app_state = AppState {
        orders,
        ledger,
        reconciler,
        compensator,
        rates,
        carrier,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        environment: config.environment.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
