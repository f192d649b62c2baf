use std::sync::Arc;
use vendo_core::carrier::CarrierAdapter;
use vendo_order::cancel::CancellationCompensator;
use vendo_order::ledger::OrderLedger;
use vendo_order::rates::RateAggregator;
use vendo_order::reconcile::WebhookReconciler;
use vendo_order::repository::OrderRepository;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub ledger: Arc<OrderLedger>,
    pub reconciler: Arc<WebhookReconciler>,
    pub compensator: Arc<CancellationCompensator>,
    pub rates: Arc<RateAggregator>,
    pub carrier: Arc<dyn CarrierAdapter>,
    pub auth: AuthConfig,
    /// "development" | "staging" | "production"; gates the webhook simulator.
    pub environment: String,
}
