use crate::models::Order;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OrderRepoError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Version conflict on order {order_id}: expected {expected}")]
    VersionConflict { order_id: Uuid, expected: u64 },

    #[error("Order storage error: {0}")]
    Storage(String),
}

/// Persistence contract for the order aggregate. `save` enforces
/// compare-and-swap on `Order::version`: the write only lands when the
/// stored version equals the one the caller read, otherwise
/// `VersionConflict` is returned and the caller reloads and re-applies.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), OrderRepoError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderRepoError>;

    async fn find_by_order_number(&self, order_number: &str)
        -> Result<Option<Order>, OrderRepoError>;

    /// Locate an order by tracking number or shipment id, searched across
    /// the legacy single-tracking field and the vendor shipment list.
    async fn find_by_tracking(&self, key: &str) -> Result<Option<Order>, OrderRepoError>;

    /// Compare-and-swap write; returns the new stored version on success.
    async fn save(&self, order: &Order) -> Result<u64, OrderRepoError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderRepoError>;
}

/// Coupon usage recording. Usage counters are incremented once the order is
/// durably created, independent of payment outcome.
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn record_usage(&self, code: &str) -> Result<(), vendo_core::BoxError>;
}

/// Cart clearing after durable order creation.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn clear(&self, user_id: &str) -> Result<(), vendo_core::BoxError>;
}
