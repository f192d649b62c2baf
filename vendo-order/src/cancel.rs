use crate::models::{Order, OrderStatus, PaymentStatus, RefundRecord, ShipmentStatus};
use crate::repository::{OrderRepoError, OrderRepository};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vendo_catalog::inventory::InventoryManager;
use vendo_core::carrier::CarrierAdapter;
use vendo_core::wallet::{WalletError, WalletLedger};

#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order in state {0:?} cannot be cancelled")]
    NotCancellable(OrderStatus),

    #[error("Order storage error: {0}")]
    Storage(String),
}

impl From<OrderRepoError> for CancelError {
    fn from(err: OrderRepoError) -> Self {
        CancelError::Storage(err.to_string())
    }
}

/// Reverses a cancellable order: external shipment cancellation, stock
/// restoration and wallet refund. Each compensation step is independently
/// best-effort; one failure never blocks the others.
pub struct CancellationCompensator {
    orders: Arc<dyn OrderRepository>,
    carrier: Arc<dyn CarrierAdapter>,
    wallet: Arc<dyn WalletLedger>,
    inventory: Arc<RwLock<InventoryManager>>,
}

impl CancellationCompensator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        carrier: Arc<dyn CarrierAdapter>,
        wallet: Arc<dyn WalletLedger>,
        inventory: Arc<RwLock<InventoryManager>>,
    ) -> Self {
        Self {
            orders,
            carrier,
            wallet,
            inventory,
        }
    }

    pub async fn cancel(&self, order_id: Uuid, reason: &str) -> Result<Order, CancelError> {
        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CancelError::NotFound(order_id))?;

        if !order.is_cancellable() {
            return Err(CancelError::NotCancellable(order.status));
        }

        order.set_status(OrderStatus::Cancelled);

        self.cancel_shipments(&mut order).await;
        self.restore_stock(&order).await;
        self.refund_if_paid(&mut order, reason).await;

        match self.orders.save(&order).await {
            Ok(version) => {
                order.version = version;
            }
            Err(OrderRepoError::VersionConflict { .. }) => {
                // A webhook raced us. Reload and re-apply the terminal
                // state; the external compensations above already ran and
                // are idempotent.
                let mut fresh = self
                    .orders
                    .get(order_id)
                    .await?
                    .ok_or(CancelError::NotFound(order_id))?;
                fresh.set_status(OrderStatus::Cancelled);
                fresh.payment_status = order.payment_status;
                fresh.refund = order.refund.clone();
                for shipment in &mut fresh.vendor_shipments {
                    let cancelled = order
                        .vendor_shipments
                        .iter()
                        .find(|s| s.vendor_id == shipment.vendor_id)
                        .map_or(false, |s| s.status == ShipmentStatus::Cancelled);
                    if cancelled {
                        shipment.status = ShipmentStatus::Cancelled;
                    }
                }
                fresh.version = self.orders.save(&fresh).await?;
                order = fresh;
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!("Order {} cancelled: {}", order.order_number, reason);
        Ok(order)
    }

    async fn cancel_shipments(&self, order: &mut Order) {
        for shipment in &mut order.vendor_shipments {
            let Some(tracking) = shipment.tracking_number.clone() else {
                continue;
            };
            match self.carrier.cancel_shipment(&tracking).await {
                Ok(()) => {
                    shipment.status = ShipmentStatus::Cancelled;
                }
                Err(err) => {
                    // Left unchanged; support can retry with the carrier.
                    tracing::warn!("Carrier cancellation failed for {}: {}", tracking, err);
                }
            }
        }
    }

    async fn restore_stock(&self, order: &Order) {
        let mut inventory = self.inventory.write().await;
        for item in &order.items {
            if let Err(err) = inventory.restock(&item.product_id, item.quantity) {
                tracing::warn!("Stock restore failed for {}: {}", item.product_id, err);
            }
        }
    }

    async fn refund_if_paid(&self, order: &mut Order, reason: &str) {
        if order.payment_status != PaymentStatus::Completed {
            return;
        }

        let reference = format!("REF-{}", order.order_number);
        let credited = self
            .wallet
            .credit(
                &order.user_id,
                order.total,
                "Order refund",
                &reference,
                Some(&order.order_number),
            )
            .await;

        match credited {
            Ok(_) | Err(WalletError::DuplicateReference(_)) => {
                // A duplicate reference means an earlier cancellation
                // attempt already landed the credit.
                order.payment_status = PaymentStatus::Refunded;
                order.refund = Some(RefundRecord {
                    amount: order.total,
                    reason: reason.to_string(),
                    refunded_at: Utc::now(),
                });
            }
            Err(err) => {
                tracing::error!(
                    "Refund failed for order {}: {}",
                    order.order_number,
                    err
                );
            }
        }
    }
}

