use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use vendo_order::models::Order;
use vendo_order::reconcile::{CarrierWebhook, ReconcileOutcome};
use vendo_shared::TrackingEvent;

/// POST /v1/webhooks/carrier
/// Public inbound delivery-status webhook.
///
/// Always acknowledged with 200: the carrier retries anything else
/// indefinitely, and a malformed or unknown event is their bug, not our
/// outage.
pub async fn carrier_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    match serde_json::from_value::<CarrierWebhook>(payload) {
        Ok(webhook) => {
            let outcome = state.reconciler.process(&webhook).await;
            tracing::debug!("Carrier webhook processed: {:?}", outcome);
        }
        Err(err) => {
            tracing::warn!("Unparseable carrier webhook acknowledged: {}", err);
        }
    }
    Json(json!({ "success": true }))
}

#[derive(Debug, Serialize)]
pub struct ShipmentTrackingResponse {
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub tracking_number: Option<String>,
    pub shipment_id: Option<String>,
    pub courier: Option<String>,
    pub tracking_url: Option<String>,
    pub status: vendo_order::models::ShipmentStatus,
}

#[derive(Debug, Serialize)]
pub struct ShipmentEventsResponse {
    pub vendor_id: Uuid,
    pub tracking_number: Option<String>,
    pub events: Vec<TrackingEvent>,
}

/// POST /v1/orders/:id/refresh (admin)
/// Pull tracking state from the carrier for every tracked shipment and run
/// it through the same reconciliation path as inbound webhooks.
pub async fn refresh_tracking(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let order = load(&state, order_id).await?;

    let mut refreshed = 0usize;
    for shipment in &order.vendor_shipments {
        let Some(tracking) = shipment.tracking_number.as_deref() else {
            continue;
        };
        match state.carrier.track_shipment(tracking).await {
            Ok(report) => {
                let webhook = CarrierWebhook {
                    order_id: Some(report.tracking_number.clone()),
                    status: report.status,
                    courier: None,
                    package_status: Vec::new(),
                    events: report.events,
                    tracking_url: None,
                };
                let outcome = state.reconciler.process(&webhook).await;
                if matches!(outcome, ReconcileOutcome::Applied { .. }) {
                    refreshed += 1;
                }
            }
            Err(err) => {
                tracing::warn!("Tracking refresh failed for {}: {}", tracking, err);
            }
        }
    }

    let order = load(&state, order_id).await?;
    Ok(Json(json!({
        "order_number": order.order_number,
        "status": order.status,
        "refreshed_shipments": refreshed,
    })))
}

/// GET /v1/orders/:id/events (admin)
/// Per-shipment webhook event history.
pub async fn order_events(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<ShipmentEventsResponse>>, AppError> {
    let order = load(&state, order_id).await?;
    let events = order
        .vendor_shipments
        .into_iter()
        .map(|s| ShipmentEventsResponse {
            vendor_id: s.vendor_id,
            tracking_number: s.tracking_number,
            events: s.events,
        })
        .collect();
    Ok(Json(events))
}

/// GET /v1/orders/:id/tracking (admin)
/// Shipment identifiers for support tooling.
pub async fn order_tracking(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<ShipmentTrackingResponse>>, AppError> {
    let order = load(&state, order_id).await?;
    let shipments = order
        .vendor_shipments
        .into_iter()
        .map(|s| ShipmentTrackingResponse {
            vendor_id: s.vendor_id,
            vendor_name: s.vendor_name,
            tracking_number: s.tracking_number,
            shipment_id: s.shipment_id,
            courier: s.courier,
            tracking_url: s.tracking_url,
            status: s.status,
        })
        .collect();
    Ok(Json(shipments))
}

/// POST /v1/webhooks/simulate (admin, non-production)
/// Inject a synthetic carrier event through the real reconciliation path.
pub async fn simulate_webhook(
    State(state): State<AppState>,
    Json(payload): Json<CarrierWebhook>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.environment == "production" {
        return Err(AppError::AuthorizationError(
            "Webhook simulation is disabled in production".to_string(),
        ));
    }

    let outcome = state.reconciler.process(&payload).await;
    let outcome_label = match outcome {
        ReconcileOutcome::Applied { order_transitioned } => {
            if order_transitioned {
                "applied"
            } else {
                "applied_no_transition"
            }
        }
        ReconcileOutcome::NoMatch => "no_match",
        ReconcileOutcome::Stale => "stale",
        ReconcileOutcome::Failed => "failed",
    };
    Ok(Json(json!({ "outcome": outcome_label })))
}

async fn load(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get(order_id)
        .await
        .map_err(|err| AppError::InternalServerError(err.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(order_id.to_string()))
}
