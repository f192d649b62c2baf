use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vendo_shared::{Address, Masked, TrackingEvent};

/// Overall order status through the delivery lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    InTransit,
    Delivered,
    Cancelled,
    Refunded,
    Failed,
}

/// Payment settlement status, tracked independently from delivery status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

/// Per-vendor shipment status, independent from the parent order's status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Created,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Standard,
    Express,
    SameDay,
    Pickup,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gateway,
    Wallet,
    CashOnDelivery,
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

/// An individual product line within an order. Name, image, price and weight
/// are snapshotted at order-creation time and never re-read from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    /// Minor currency units.
    pub unit_price: i64,
    /// Kilograms per unit, defaulted to 1.0 when the product declared none.
    pub weight: f64,
    pub physical: bool,
    pub vendor_id: Uuid,
    pub vendor_name: String,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

/// Per-vendor shipment record, lifetime bound to its order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorShipment {
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub product_ids: Vec<Uuid>,
    pub origin: Address,
    /// This vendor's share of the order's shipping cost.
    pub shipping_cost: i64,
    pub tracking_number: Option<String>,
    pub shipment_id: Option<String>,
    pub courier: Option<String>,
    pub tracking_url: Option<String>,
    pub status: ShipmentStatus,
    pub events: Vec<TrackingEvent>,
    /// Timestamp of the newest carrier event applied; older events are
    /// ignored by reconciliation.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl VendorShipment {
    pub fn matches_tracking(&self, key: &str) -> bool {
        self.tracking_number.as_deref() == Some(key) || self.shipment_id.as_deref() == Some(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRecord {
    pub amount: i64,
    pub reason: String,
    pub refunded_at: DateTime<Utc>,
}

/// The order aggregate. Owned exclusively by the ledger; all writes go
/// through OrderRepository::save which enforces compare-and-swap on
/// `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: String,
    pub customer_email: Masked<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub status_history: Vec<StatusEntry>,
    pub vendor_shipments: Vec<VendorShipment>,
    pub delivery_type: DeliveryType,
    pub shipping_address: Address,
    pub coupon_code: Option<String>,
    /// Legacy single-shipment tracking field; reconciliation still searches
    /// it alongside vendor_shipments.
    pub tracking_number: Option<String>,
    pub refund: Option<RefundRecord>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: String,
        customer_email: String,
        items: Vec<OrderItem>,
        delivery_type: DeliveryType,
        shipping_address: Address,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            user_id,
            customer_email: customer_email.into(),
            items,
            subtotal: 0,
            discount: 0,
            shipping_cost: 0,
            tax: 0,
            total: 0,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method,
            payment_reference: None,
            status_history: vec![StatusEntry {
                status: OrderStatus::Pending,
                timestamp: now,
            }],
            vendor_shipments: Vec::new(),
            delivery_type,
            shipping_address,
            coupon_code: None,
            tracking_number: None,
            refund: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, appending one history entry. A no-op when
    /// the status is unchanged, which is what makes webhook replay
    /// idempotent.
    pub fn set_status(&mut self, status: OrderStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.status_history.push(StatusEntry {
            status,
            timestamp: Utc::now(),
        });
        self.updated_at = Utc::now();
        true
    }

    /// Recompute the total from its parts. Must be called after any money
    /// field changes; `money_invariant_holds` checks the result.
    pub fn recompute_total(&mut self) {
        self.total = self.subtotal - self.discount + self.shipping_cost + self.tax;
        self.updated_at = Utc::now();
    }

    pub fn money_invariant_holds(&self) -> bool {
        self.total == self.subtotal - self.discount + self.shipping_cost + self.tax
            && self.subtotal >= 0
            && self.discount >= 0
            && self.shipping_cost >= 0
            && self.tax >= 0
            && self.total >= 0
    }

    /// Cancellable only before fulfillment starts.
    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Search both the legacy tracking field and the vendor shipments for a
    /// tracking number or shipment id.
    pub fn matches_tracking(&self, key: &str) -> bool {
        self.tracking_number.as_deref() == Some(key)
            || self.vendor_shipments.iter().any(|s| s.matches_tracking(key))
    }

    pub fn shipment_for_tracking_mut(&mut self, key: &str) -> Option<&mut VendorShipment> {
        self.vendor_shipments
            .iter_mut()
            .find(|s| s.matches_tracking(key))
    }

    pub fn shipment_for_vendor_mut(&mut self, vendor_id: Uuid) -> Option<&mut VendorShipment> {
        self.vendor_shipments
            .iter_mut()
            .find(|s| s.vendor_id == vendor_id)
    }
}

/// Human-readable, time + random derived. Uniqueness is enforced by the
/// store; the random suffix keeps collisions within one second unlikely.
pub fn generate_order_number() -> String {
    let ts = Utc::now().timestamp();
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("VND-{}-{}", ts, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_order() -> Order {
        Order::new(
            "user-1".to_string(),
            "buyer@example.com".to_string(),
            vec![],
            DeliveryType::Standard,
            Address::default(),
            PaymentMethod::Wallet,
        )
    }

    #[test]
    fn test_status_history_appends_on_change_only() {
        let mut order = blank_order();
        assert_eq!(order.status_history.len(), 1);

        assert!(order.set_status(OrderStatus::Confirmed));
        assert_eq!(order.status_history.len(), 2);

        // Same status again is a no-op
        assert!(!order.set_status(OrderStatus::Confirmed));
        assert_eq!(order.status_history.len(), 2);

        assert_eq!(
            order.status_history.last().unwrap().status,
            order.status
        );
    }

    #[test]
    fn test_money_invariant() {
        let mut order = blank_order();
        order.subtotal = 10000;
        order.discount = 500;
        order.shipping_cost = 2500;
        order.tax = 750;
        order.recompute_total();
        assert_eq!(order.total, 12750);
        assert!(order.money_invariant_holds());
    }

    #[test]
    fn test_cancellable_states() {
        let mut order = blank_order();
        assert!(order.is_cancellable());
        order.set_status(OrderStatus::Confirmed);
        assert!(order.is_cancellable());
        order.set_status(OrderStatus::Shipped);
        assert!(!order.is_cancellable());
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("VND-"));
        assert_eq!(number.split('-').count(), 3);
    }
}
