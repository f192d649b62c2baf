use crate::models::{OrderStatus, ShipmentStatus};
use crate::repository::{OrderRepoError, OrderRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vendo_shared::TrackingEvent;

/// Inbound carrier webhook payload. Arrives unordered and possibly
/// duplicated; the external network retries anything we fail to ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierWebhook {
    /// Carrier-side shipment identifier.
    pub order_id: Option<String>,
    pub status: String,
    pub courier: Option<CourierInfo>,
    #[serde(default)]
    pub package_status: Vec<serde_json::Value>,
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierInfo {
    pub name: Option<String>,
    pub tracking_code: Option<String>,
}

impl CarrierWebhook {
    fn tracking_key(&self) -> Option<&str> {
        self.courier
            .as_ref()
            .and_then(|c| c.tracking_code.as_deref())
            .or(self.order_id.as_deref())
    }

    fn event_time(&self) -> DateTime<Utc> {
        self.events
            .iter()
            .map(|e| e.occurred_at)
            .max()
            .unwrap_or_else(Utc::now)
    }
}

/// Carrier vocabulary to overall order status. Fixed and total: anything
/// unrecognized means "no change".
pub fn map_order_status(raw: &str) -> Option<OrderStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Some(OrderStatus::Confirmed),
        "confirmed" => Some(OrderStatus::Processing),
        "picked_up" => Some(OrderStatus::Shipped),
        "in_transit" => Some(OrderStatus::Shipped),
        "completed" => Some(OrderStatus::Delivered),
        "cancelled" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

/// Same vocabulary mapped to the shipment-level status, which is tracked
/// separately from the order's own status.
pub fn map_shipment_status(raw: &str) -> Option<ShipmentStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Some(ShipmentStatus::Pending),
        "confirmed" => Some(ShipmentStatus::Created),
        "picked_up" => Some(ShipmentStatus::Shipped),
        "in_transit" => Some(ShipmentStatus::Shipped),
        "completed" => Some(ShipmentStatus::Delivered),
        "cancelled" => Some(ShipmentStatus::Cancelled),
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event matched an order; `order_transitioned` is false when the
    /// mapped status equaled the current one (replay no-op).
    Applied { order_transitioned: bool },
    /// No order carries this tracking id. Not an error: the shipment may
    /// belong to a different environment.
    NoMatch,
    /// The event is older than the shipment's last recorded event.
    Stale,
    /// Internal failure; logged, never surfaced to the carrier.
    Failed,
}

/// Applies external delivery-status events to the order ledger,
/// idempotently. Never returns an error: the webhook endpoint must always
/// acknowledge, or the carrier will retry indefinitely and amplify load.
pub struct WebhookReconciler {
    orders: Arc<dyn OrderRepository>,
}

const SAVE_ATTEMPTS: usize = 3;

impl WebhookReconciler {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    pub async fn process(&self, payload: &CarrierWebhook) -> ReconcileOutcome {
        let Some(key) = payload.tracking_key() else {
            tracing::warn!("Webhook without tracking identifier ignored");
            return ReconcileOutcome::NoMatch;
        };

        // Compare-and-swap loop: a concurrent webhook or manual refresh may
        // bump the order version between our read and write.
        for attempt in 0..SAVE_ATTEMPTS {
            match self.try_apply(key, payload).await {
                Ok(outcome) => return outcome,
                Err(OrderRepoError::VersionConflict { .. }) => {
                    tracing::debug!(
                        "Version conflict reconciling {}, attempt {}",
                        key,
                        attempt + 1
                    );
                }
                Err(err) => {
                    tracing::error!("Webhook reconciliation failed for {}: {}", key, err);
                    return ReconcileOutcome::Failed;
                }
            }
        }
        tracing::error!("Gave up reconciling {} after {} attempts", key, SAVE_ATTEMPTS);
        ReconcileOutcome::Failed
    }

    async fn try_apply(
        &self,
        key: &str,
        payload: &CarrierWebhook,
    ) -> Result<ReconcileOutcome, OrderRepoError> {
        let Some(mut order) = self.orders.find_by_tracking(key).await? else {
            tracing::info!("Webhook for unknown tracking id {}, acknowledging", key);
            return Ok(ReconcileOutcome::NoMatch);
        };

        let event_time = payload.event_time();
        let mapped_order = map_order_status(&payload.status);
        let mapped_shipment = map_shipment_status(&payload.status);
        let courier_name = payload.courier.as_ref().and_then(|c| c.name.clone());

        let will_transition_order = mapped_order.map_or(false, |s| s != order.status);

        let mut shipment_changed = false;
        let mut stale = false;
        if let Some(shipment) = order.shipment_for_tracking_mut(key) {
            if let Some(last) = shipment.last_event_at {
                if event_time <= last {
                    stale = true;
                }
            }

            if !stale {
                if let Some(status) = mapped_shipment {
                    if shipment.status != status {
                        shipment.status = status;
                        shipment_changed = true;
                    }
                }
                if shipment_changed || will_transition_order {
                    // Only record when something transitions; replays of
                    // the same status must leave the order untouched.
                    if payload.events.is_empty() {
                        shipment
                            .events
                            .push(TrackingEvent::new(payload.status.clone(), event_time));
                    } else {
                        shipment.events.extend(payload.events.iter().cloned());
                    }
                    shipment.last_event_at = Some(event_time);
                    if let Some(url) = &payload.tracking_url {
                        shipment.tracking_url = Some(url.clone());
                    }
                    if let Some(name) = courier_name {
                        shipment.courier = Some(name);
                    }
                }
            }
        }
        if stale {
            tracing::info!("Stale event for {} at {}, ignoring", key, event_time);
            return Ok(ReconcileOutcome::Stale);
        }

        let order_transitioned = match mapped_order {
            Some(status) => order.set_status(status),
            None => {
                tracing::info!(
                    "Unrecognized carrier status '{}' for {}, no change",
                    payload.status,
                    key
                );
                false
            }
        };

        if order_transitioned || shipment_changed {
            let version = self.orders.save(&order).await?;
            order.version = version;
            tracing::info!(
                "Reconciled {} to order status {:?} (transitioned: {})",
                key,
                order.status,
                order_transitioned
            );
        }

        Ok(ReconcileOutcome::Applied { order_transitioned })
    }
}
