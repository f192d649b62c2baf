use crate::grouper::{group_by_vendor, CartLine, VendorGroup};
use crate::models::{
    DeliveryType, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShipmentStatus,
    VendorShipment,
};
use crate::rates::{
    QuoteType, RateAggregator, FALLBACK_EXPRESS_PRICE, FALLBACK_STANDARD_PRICE,
};
use crate::repository::{CartStore, CouponStore, OrderRepoError, OrderRepository};
use crate::shipping::ShipmentOrchestrator;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vendo_catalog::inventory::{InventoryError, InventoryManager};
use vendo_core::carrier::RateParty;
use vendo_core::payment::{GatewayStatus, GatewaySession, InitializePaymentRequest, PaymentAdapter};
use vendo_core::wallet::{WalletError, WalletLedger};
use vendo_shared::Address;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Tax in basis points of the subtotal (e.g. 750 = 7.5%).
    pub tax_bps: i64,
    pub currency: String,
    /// Where the payment gateway redirects after hosted checkout.
    pub callback_url: String,
}

/// A coupon already validated upstream; the ledger only applies the discount
/// and records one usage.
#[derive(Debug, Clone)]
pub struct CouponApplication {
    pub code: String,
    pub discount: i64,
}

#[derive(Debug)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub email: String,
    pub lines: Vec<CartLine>,
    pub delivery_type: DeliveryType,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub coupon: Option<CouponApplication>,
}

#[derive(Debug)]
pub struct CreateOrderOutcome {
    pub order: Order,
    /// Hosted checkout URL, present on the gateway settlement path.
    pub authorization_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Concurrent update conflict on order")]
    Conflict,

    #[error("Order storage error: {0}")]
    Storage(String),
}

impl From<OrderRepoError> for LedgerError {
    fn from(err: OrderRepoError) -> Self {
        match err {
            OrderRepoError::NotFound(id) => LedgerError::NotFound(id),
            OrderRepoError::VersionConflict { .. } => LedgerError::Conflict,
            OrderRepoError::Storage(msg) => LedgerError::Storage(msg),
        }
    }
}

/// Owns the order aggregate: creation, totals, payment-method-specific
/// settlement and the append-only status history.
pub struct OrderLedger {
    orders: Arc<dyn OrderRepository>,
    wallet: Arc<dyn WalletLedger>,
    gateway: Arc<dyn PaymentAdapter>,
    inventory: Arc<RwLock<InventoryManager>>,
    coupons: Arc<dyn CouponStore>,
    carts: Arc<dyn CartStore>,
    rates: Arc<RateAggregator>,
    shipping: Arc<ShipmentOrchestrator>,
    config: LedgerConfig,
}

impl OrderLedger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        wallet: Arc<dyn WalletLedger>,
        gateway: Arc<dyn PaymentAdapter>,
        inventory: Arc<RwLock<InventoryManager>>,
        coupons: Arc<dyn CouponStore>,
        carts: Arc<dyn CartStore>,
        rates: Arc<RateAggregator>,
        shipping: Arc<ShipmentOrchestrator>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            orders,
            wallet,
            gateway,
            inventory,
            coupons,
            carts,
            rates,
            shipping,
            config,
        }
    }

    /// Create an order from a populated cart and settle it according to the
    /// chosen payment method. Validation failures leave no side effects;
    /// settlement failures leave a `failed` order behind (orders are not
    /// resurrected, the user retries with a new one).
    pub async fn create_order(
        &self,
        req: CreateOrderRequest,
    ) -> Result<CreateOrderOutcome, LedgerError> {
        if req.lines.is_empty() {
            return Err(LedgerError::EmptyCart);
        }

        // Availability check then commit, under one write lock so two
        // concurrent checkouts cannot both pass on the last unit. Product
        // fields are resnapshotted from the catalog record here; the request
        // only chooses product ids and quantities, never prices.
        let lines: Vec<CartLine> = {
            let mut inventory = self.inventory.write().await;
            let mut lines = Vec::with_capacity(req.lines.len());
            for line in &req.lines {
                let product = inventory
                    .get(&line.product.id)
                    .ok_or_else(|| InventoryError::NotFound(line.product.id.to_string()))?;
                if !product.is_active || product.stock < line.quantity as i64 {
                    return Err(InventoryError::InsufficientStock {
                        product: product.name.clone(),
                        requested: line.quantity as i64,
                        available: product.stock,
                    }
                    .into());
                }
                lines.push(CartLine {
                    product: product.clone(),
                    vendor: line.vendor.clone(),
                    quantity: line.quantity,
                });
            }
            for line in &lines {
                inventory.commit_sale(&line.product.id, line.quantity)?;
            }
            lines
        };

        let groups = group_by_vendor(&lines);

        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                product_id: line.product.id,
                name: line.product.name.clone(),
                image_url: line.product.image_url.clone(),
                quantity: line.quantity,
                unit_price: line.product.price,
                weight: line.product.unit_weight(),
                physical: line.product.is_physical(),
                vendor_id: line.vendor.id,
                vendor_name: line.vendor.name.clone(),
            })
            .collect();

        let mut order = Order::new(
            req.user_id.clone(),
            req.email.clone(),
            items,
            req.delivery_type,
            req.shipping_address.clone(),
            req.payment_method,
        );

        order.subtotal = order.items.iter().map(|i| i.line_total()).sum();
        if let Some(coupon) = &req.coupon {
            order.discount = coupon.discount.min(order.subtotal);
            order.coupon_code = Some(coupon.code.clone());
        }
        order.tax = order.subtotal * self.config.tax_bps / 10_000;

        let (shipping_cost, breakdown) = self
            .price_delivery(&groups, &req.shipping_address, &req.email, req.delivery_type)
            .await;
        order.shipping_cost = shipping_cost;
        order.vendor_shipments =
            seed_vendor_shipments(&groups, shipping_cost, &breakdown, req.delivery_type);
        order.recompute_total();
        debug_assert!(order.money_invariant_holds());

        self.orders.create(&order).await?;
        tracing::info!(
            "Order {} created for user {} (total {})",
            order.order_number,
            order.user_id,
            order.total
        );

        // Post-creation housekeeping is best-effort: the order exists now.
        // Coupon usage is recorded here, independent of payment outcome.
        if let Err(err) = self.carts.clear(&req.user_id).await {
            tracing::warn!("Failed to clear cart for {}: {}", req.user_id, err);
        }
        if let Some(coupon) = &req.coupon {
            if let Err(err) = self.coupons.record_usage(&coupon.code).await {
                tracing::warn!("Failed to record coupon usage {}: {}", coupon.code, err);
            }
        }

        let authorization_url = match req.payment_method {
            PaymentMethod::Wallet => {
                self.settle_with_wallet(&mut order).await?;
                None
            }
            PaymentMethod::Gateway => Some(self.open_gateway_session(&mut order).await?),
            PaymentMethod::CashOnDelivery => {
                // Settled physically at delivery; payment stays pending.
                order.set_status(OrderStatus::Confirmed);
                self.persist(&mut order).await?;
                None
            }
        };

        Ok(CreateOrderOutcome {
            order,
            authorization_url,
        })
    }

    async fn settle_with_wallet(&self, order: &mut Order) -> Result<(), LedgerError> {
        let debit = self
            .wallet
            .debit(
                &order.user_id,
                order.total,
                "Order payment",
                &order.order_number,
                Some(&order.order_number),
            )
            .await;

        match debit {
            Ok(tx) => {
                order.payment_status = PaymentStatus::Completed;
                order.payment_reference = Some(tx.reference);
                order.set_status(OrderStatus::Confirmed);
                self.persist(order).await?;

                // Shipment creation is best-effort; a carrier outage must
                // not roll back a completed payment.
                let created = self.shipping.create_shipments(order).await;
                if created > 0 {
                    self.persist(order).await?;
                }
                Ok(())
            }
            Err(err) => {
                order.payment_status = PaymentStatus::Failed;
                order.set_status(OrderStatus::Failed);
                self.persist(order).await?;
                Err(err.into())
            }
        }
    }

    async fn open_gateway_session(&self, order: &mut Order) -> Result<String, LedgerError> {
        let init = InitializePaymentRequest {
            email: order.customer_email.inner().clone(),
            amount: order.total,
            reference: order.order_number.clone(),
            callback_url: self.config.callback_url.clone(),
            metadata: serde_json::json!({
                "order_id": order.id,
                "currency": self.config.currency,
            }),
        };

        match self.gateway.initialize(&init).await {
            Ok(GatewaySession {
                authorization_url,
                reference,
                ..
            }) => {
                order.payment_reference = Some(reference);
                self.persist(order).await?;
                Ok(authorization_url)
            }
            Err(err) => {
                order.payment_status = PaymentStatus::Failed;
                order.set_status(OrderStatus::Failed);
                self.persist(order).await?;
                Err(LedgerError::PaymentFailed(err.to_string()))
            }
        }
    }

    /// Gateway verification callback path: confirm or fail a pending
    /// gateway-paid order. Idempotent for already-completed orders.
    pub async fn verify_payment(&self, reference: &str) -> Result<Order, LedgerError> {
        let mut order = self
            .orders
            .find_by_order_number(reference)
            .await?
            .ok_or_else(|| LedgerError::NotFound(reference.to_string()))?;

        if order.payment_status == PaymentStatus::Completed {
            return Ok(order);
        }

        let verification = self
            .gateway
            .verify(reference)
            .await
            .map_err(|err| LedgerError::PaymentFailed(err.to_string()))?;

        match verification.status {
            GatewayStatus::Success => {
                order.payment_status = PaymentStatus::Completed;
                order.set_status(OrderStatus::Confirmed);
                self.persist(&mut order).await?;

                let created = self.shipping.create_shipments(&mut order).await;
                if created > 0 {
                    self.persist(&mut order).await?;
                }
            }
            GatewayStatus::Pending => {
                order.payment_status = PaymentStatus::Processing;
                self.persist(&mut order).await?;
            }
            GatewayStatus::Failed | GatewayStatus::Abandoned => {
                order.payment_status = PaymentStatus::Failed;
                order.set_status(OrderStatus::Failed);
                self.persist(&mut order).await?;
            }
        }
        Ok(order)
    }

    async fn price_delivery(
        &self,
        groups: &[VendorGroup],
        shipping_address: &Address,
        email: &str,
        delivery_type: DeliveryType,
    ) -> (i64, Vec<(Uuid, i64)>) {
        if delivery_type == DeliveryType::Pickup || groups.iter().all(|g| !g.has_physical_items())
        {
            return (0, Vec::new());
        }

        let destination = RateParty {
            name: shipping_address.name.clone(),
            email: email.to_string(),
            phone: shipping_address.phone.clone(),
            address: shipping_address.summary(),
        };
        let sheet = self.rates.aggregate(groups, &destination).await;

        match sheet.option_for(delivery_type) {
            Some(option) => {
                let breakdown = option
                    .breakdown
                    .iter()
                    .map(|rate| (rate.vendor_id, rate.amount))
                    .collect();
                (option.price, breakdown)
            }
            None => {
                // The chosen type vanished between display and checkout;
                // fall back to the static price for it.
                let price = match QuoteType::for_delivery(delivery_type) {
                    QuoteType::Express | QuoteType::SameDay => FALLBACK_EXPRESS_PRICE,
                    _ => FALLBACK_STANDARD_PRICE,
                };
                (price, Vec::new())
            }
        }
    }

    async fn persist(&self, order: &mut Order) -> Result<(), LedgerError> {
        let version = self.orders.save(order).await?;
        order.version = version;
        Ok(())
    }
}

/// One shipment per vendor that contributed at least one physical item;
/// none at all for all-digital or pickup orders.
fn seed_vendor_shipments(
    groups: &[VendorGroup],
    total_shipping: i64,
    breakdown: &[(Uuid, i64)],
    delivery_type: DeliveryType,
) -> Vec<VendorShipment> {
    if delivery_type == DeliveryType::Pickup {
        return Vec::new();
    }

    let physical: Vec<&VendorGroup> = groups.iter().filter(|g| g.has_physical_items()).collect();
    if physical.is_empty() {
        return Vec::new();
    }

    // Vendors the rate breakdown quoted keep their quoted amounts; the
    // residual is split evenly across the vendors it missed so that the
    // per-vendor shares always sum to the order's shipping cost.
    let shares: HashMap<Uuid, i64> = breakdown.iter().copied().collect();
    let quoted: i64 = physical
        .iter()
        .filter_map(|g| shares.get(&g.vendor_id))
        .sum();
    let unquoted = physical
        .iter()
        .filter(|g| !shares.contains_key(&g.vendor_id))
        .count() as i64;
    let residual = (total_shipping - quoted).max(0);
    let (even_share, remainder) = if unquoted == 0 {
        (0, 0)
    } else {
        (residual / unquoted, residual % unquoted)
    };

    let mut first_unquoted = true;
    physical
        .iter()
        .map(|group| {
            let shipping_cost = match shares.get(&group.vendor_id) {
                Some(amount) => *amount,
                None => {
                    let extra = if first_unquoted { remainder } else { 0 };
                    first_unquoted = false;
                    even_share + extra
                }
            };
            VendorShipment {
                vendor_id: group.vendor_id,
                vendor_name: group.vendor_name.clone(),
                product_ids: group.physical_items().map(|i| i.product_id).collect(),
                origin: group.origin.clone(),
                shipping_cost,
                tracking_number: None,
                shipment_id: None,
                courier: None,
                tracking_url: None,
                status: ShipmentStatus::Pending,
                events: Vec::new(),
                last_event_at: None,
            }
        })
        .collect()
}

/// Mock payment gateway for development wiring and tests.
pub struct MockPaymentAdapter;

#[async_trait::async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn initialize(
        &self,
        req: &InitializePaymentRequest,
    ) -> Result<GatewaySession, vendo_core::BoxError> {
        Ok(GatewaySession {
            authorization_url: format!("https://checkout.mock/{}", req.reference),
            access_code: format!("mock_access_{}", Uuid::new_v4().simple()),
            reference: req.reference.clone(),
        })
    }

    async fn verify(
        &self,
        reference: &str,
    ) -> Result<vendo_core::payment::GatewayVerification, vendo_core::BoxError> {
        // References containing "fail" simulate a declined charge.
        let status = if reference.contains("fail") {
            GatewayStatus::Failed
        } else {
            GatewayStatus::Success
        };
        Ok(vendo_core::payment::GatewayVerification {
            status,
            raw: serde_json::json!({ "reference": reference }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouper::GroupItem;

    fn physical_group(vendor_id: Uuid) -> VendorGroup {
        VendorGroup {
            vendor_id,
            vendor_name: "vendor".to_string(),
            vendor_email: "vendor@vendors.example.com".to_string(),
            vendor_phone: "+2348000000000".to_string(),
            origin: Address::default(),
            items: vec![GroupItem {
                product_id: Uuid::new_v4(),
                name: "Item".to_string(),
                quantity: 1,
                weight: 1.0,
                is_physical: true,
                unit_price: 5000,
            }],
            total_weight: 1.0,
        }
    }

    #[test]
    fn test_quoted_vendors_keep_amounts_and_shares_sum_to_total() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let groups = vec![physical_group(a), physical_group(b)];

        // Vendor b had no quote of the chosen type; it absorbs the residual
        let shipments = seed_vendor_shipments(&groups, 4300, &[(a, 1800)], DeliveryType::Standard);
        assert_eq!(shipments[0].shipping_cost, 1800);
        assert_eq!(shipments[1].shipping_cost, 2500);
        assert_eq!(
            shipments.iter().map(|s| s.shipping_cost).sum::<i64>(),
            4300
        );
    }

    #[test]
    fn test_empty_breakdown_splits_evenly_with_remainder_up_front() {
        let groups = vec![
            physical_group(Uuid::new_v4()),
            physical_group(Uuid::new_v4()),
        ];
        let shipments = seed_vendor_shipments(&groups, 2505, &[], DeliveryType::Standard);
        assert_eq!(shipments[0].shipping_cost, 1253);
        assert_eq!(shipments[1].shipping_cost, 1252);
    }

    #[test]
    fn test_pickup_seeds_no_shipments() {
        let groups = vec![physical_group(Uuid::new_v4())];
        assert!(seed_vendor_shipments(&groups, 0, &[], DeliveryType::Pickup).is_empty());
    }
}
