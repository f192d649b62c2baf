use crate::carrier::{
    CarrierAdapter, RateItem, RateParty, RateQuoteResponse, ShipmentReceipt, TrackingReport,
    ValidatedAddress,
};
use crate::BoxError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CircuitState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

/// Failure-rate tracker guarding an external dependency. Replaces the bare
/// try/catch-per-call-site fallback pattern: once `failure_threshold`
/// consecutive failures are seen the circuit opens and calls fail fast until
/// `reset_timeout` elapses, after which a single probe is let through.
pub struct CircuitBreaker {
    name: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicUsize,
    failure_threshold: usize,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(name: &str, failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold,
            reset_timeout,
        }
    }

    /// Whether a call may proceed right now.
    pub async fn check(&self) -> bool {
        let current = *self.state.read().await;
        match current {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open { since } => {
                if since.elapsed() > self.reset_timeout {
                    let mut state = self.state.write().await;
                    *state = CircuitState::HalfOpen;
                    tracing::info!("Circuit [{}] moving to half-open", self.name);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state != CircuitState::Closed {
            tracing::info!("Circuit [{}] recovered to closed", self.name);
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;
        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open {
                since: Instant::now(),
            };
            tracing::error!("Circuit [{}] tripped open after {} failures", self.name, count);
        }
    }
}

/// CarrierAdapter wrapper that routes every call through a circuit breaker.
/// An open circuit surfaces as an ordinary adapter error, which callers
/// already resolve with fallback pricing or skip-and-log behavior.
pub struct GuardedCarrier {
    inner: Arc<dyn CarrierAdapter>,
    breaker: CircuitBreaker,
}

impl GuardedCarrier {
    pub fn new(inner: Arc<dyn CarrierAdapter>, breaker: CircuitBreaker) -> Self {
        Self { inner, breaker }
    }

    async fn guard<T>(
        &self,
        result: Result<T, BoxError>,
    ) -> Result<T, BoxError> {
        match result {
            Ok(value) => {
                self.breaker.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.breaker.record_failure().await;
                Err(err)
            }
        }
    }

    async fn admit(&self) -> Result<(), BoxError> {
        if self.breaker.check().await {
            Ok(())
        } else {
            Err(format!("circuit [{}] is open", self.breaker.name).into())
        }
    }
}

#[async_trait]
impl CarrierAdapter for GuardedCarrier {
    async fn validate_address(&self, party: &RateParty) -> Result<ValidatedAddress, BoxError> {
        self.admit().await?;
        self.guard(self.inner.validate_address(party).await).await
    }

    async fn get_delivery_rates(
        &self,
        sender: &RateParty,
        receiver: &RateParty,
        items: &[RateItem],
    ) -> Result<RateQuoteResponse, BoxError> {
        self.admit().await?;
        self.guard(self.inner.get_delivery_rates(sender, receiver, items).await)
            .await
    }

    async fn create_shipment(
        &self,
        request_token: &str,
        courier_id: &str,
        insured: bool,
    ) -> Result<ShipmentReceipt, BoxError> {
        self.admit().await?;
        self.guard(
            self.inner
                .create_shipment(request_token, courier_id, insured)
                .await,
        )
        .await
    }

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingReport, BoxError> {
        self.admit().await?;
        self.guard(self.inner.track_shipment(tracking_number).await)
            .await
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> Result<(), BoxError> {
        self.admit().await?;
        self.guard(self.inner.cancel_shipment(tracking_number).await)
            .await
    }
}
